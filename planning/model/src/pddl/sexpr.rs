use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::Res;
use crate::Sym;
use crate::errors::*;
use crate::pddl::input::Input;
use crate::utils::disp_iter;

/// An atom of an s-expression. Its canonical view is lower cased (PDDL is case insensitive) while its
/// span preserves the original text.
pub type SAtom = Sym;

#[derive(Clone, Debug)]
pub struct SList {
    list: Vec<SExpr>,
    span: Span,
}

impl SList {
    pub fn iter(&self) -> ListIter<'_> {
        ListIter {
            elems: self.list.as_slice(),
            span: &self.span,
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl Spanned for SList {
    fn span(&self) -> Option<&Span> {
        Some(&self.span)
    }
}

impl Display for SList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        disp_iter(f, self.list.iter(), " ")?;
        write!(f, ")")
    }
}

#[derive(Clone, Debug)]
pub enum SExpr {
    Atom(SAtom),
    List(SList),
}

impl SExpr {
    pub fn is_atom(&self, expected_atom: &str) -> bool {
        self.as_atom().map(|a| a.canonical_str() == expected_atom).unwrap_or(false)
    }

    pub fn as_atom(&self) -> Option<&SAtom> {
        match self {
            SExpr::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&SList> {
        match self {
            SExpr::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_iter(&self) -> Option<ListIter<'_>> {
        self.as_list().map(|l| l.iter())
    }

    /// If this expression is a list whose first element is the atom `head`, returns the remaining elements.
    pub fn as_application(&self, head: &str) -> Option<&[SExpr]> {
        match self {
            SExpr::List(l) => match l.list.first() {
                Some(SExpr::Atom(first)) if first.canonical_str() == head => Some(&l.list[1..]),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Spanned for SExpr {
    fn span(&self) -> Option<&Span> {
        match self {
            SExpr::Atom(a) => a.span.as_ref(),
            SExpr::List(l) => Some(&l.span),
        }
    }
}

impl Display for SExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Atom(a) => write!(f, "{a}"),
            SExpr::List(l) => write!(f, "{l}"),
        }
    }
}

/// Cursor over the elements of a list, with helpers to consume them one by one.
pub struct ListIter<'a> {
    elems: &'a [SExpr],
    span: &'a Span,
}

impl<'a> ListIter<'a> {
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn peek(&self) -> Option<&'a SExpr> {
        self.elems.first()
    }

    pub fn loc(&self) -> Span {
        self.span.clone()
    }

    pub fn pop(&mut self) -> Res<&'a SExpr> {
        match self.elems.split_first() {
            Some((first, rest)) => {
                self.elems = rest;
                Ok(first)
            }
            None => Err(self.span.clone().end().invalid("Unexpected end of list")),
        }
    }

    pub fn pop_atom(&mut self) -> Res<&'a SAtom> {
        match self.elems.split_first() {
            Some((SExpr::Atom(a), rest)) => {
                self.elems = rest;
                Ok(a)
            }
            Some((SExpr::List(l), _)) => Err(l.invalid("Expected an atom")),
            None => Err(self.span.clone().end().invalid("Expected an atom but got end of list")),
        }
    }

    pub fn pop_known_atom(&mut self, expected: &str) -> Res<()> {
        match self.elems.split_first() {
            Some((SExpr::Atom(a), rest)) if a.canonical_str() == expected => {
                self.elems = rest;
                Ok(())
            }
            Some((e, _)) => Err(e.invalid(format!("Expected the atom `{expected}`"))),
            None => Err(self
                .span
                .clone()
                .end()
                .invalid(format!("Expected the atom `{expected}` but got end of list"))),
        }
    }

    pub fn pop_list(&mut self) -> Res<&'a SList> {
        match self.elems.split_first() {
            Some((SExpr::List(l), rest)) => {
                self.elems = rest;
                Ok(l)
            }
            Some((SExpr::Atom(a), _)) => Err(a.invalid("Expected a list")),
            None => Err(self.span.clone().end().invalid("Expected a list but got end of list")),
        }
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a SExpr;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop().ok()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Sym { start: usize, end: usize },
    LParen(usize),
    RParen(usize),
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cur_start: Option<usize> = None;
    let mut chars = source.char_indices().peekable();
    while let Some((index, n)) = chars.next() {
        let separator = n.is_whitespace() || n == '(' || n == ')' || n == ';';
        if separator {
            if let Some(start) = cur_start.take() {
                tokens.push(Token::Sym { start, end: index - 1 });
            }
        } else if cur_start.is_none() {
            cur_start = Some(index);
        }
        match n {
            '(' => tokens.push(Token::LParen(index)),
            ')' => tokens.push(Token::RParen(index)),
            ';' => {
                // comment until the end of the line
                while chars.next_if(|(_, c)| *c != '\n').is_some() {}
            }
            _ => {}
        }
    }
    if let Some(start) = cur_start {
        tokens.push(Token::Sym {
            start,
            end: source.len() - 1,
        });
    }
    tokens
}

fn read(tokens: &mut std::iter::Peekable<std::slice::Iter<Token>>, src: &Arc<Input>) -> Res<SExpr> {
    match tokens.next() {
        Some(Token::Sym { start, end }) => {
            let span = Span::new(src.clone(), *start, *end);
            let canonical = span.str().to_ascii_lowercase();
            Ok(SExpr::Atom(Sym::with_source(canonical, span)))
        }
        Some(Token::LParen(start)) => {
            let mut es = Vec::new();
            loop {
                match tokens.peek() {
                    Some(Token::RParen(end)) => {
                        let span = Span::new(src.clone(), *start, *end);
                        tokens.next();
                        return Ok(SExpr::List(SList { list: es, span }));
                    }
                    Some(_) => es.push(read(tokens, src)?),
                    None => {
                        return Err(Span::new(src.clone(), *start, *start).invalid("Unclosed parenthesis"));
                    }
                }
            }
        }
        Some(Token::RParen(index)) => Err(Span::new(src.clone(), *index, *index).invalid("Unexpected closing parenthesis")),
        None => Err(Message::error("Unexpected end of input")),
    }
}

/// Parses a single s-expression, failing if the input contains anything else.
pub fn parse(src: Arc<Input>) -> Res<SExpr> {
    let mut exprs = parse_many(src.clone())?;
    match exprs.len() {
        1 => Ok(exprs.remove(0)),
        0 => Err(Message::error("Empty input")),
        _ => Err(exprs[1].invalid("Unexpected expression after the end of the first one")),
    }
}

/// Parses a sequence of s-expressions.
pub fn parse_many(src: Arc<Input>) -> Res<Vec<SExpr>> {
    let tokens = tokenize(&src.text);
    let mut tokens = tokens.iter().peekable();
    let mut exprs = Vec::new();
    while tokens.peek().is_some() {
        exprs.push(read(&mut tokens, &src)?);
    }
    Ok(exprs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(s: &str) -> Res<SExpr> {
        parse(Arc::new(Input::from_string(s)))
    }

    #[test]
    fn lower_cases_atoms_but_displays_source() -> Res<()> {
        let e = parse_str("(Move ?From B2) ; comment")?;
        let mut l = e.as_list_iter().unwrap();
        let head = l.pop_atom()?;
        assert_eq!(head.canonical_str(), "move");
        assert_eq!(head.to_string(), "Move");
        assert_eq!(l.pop_atom()?.canonical_str(), "?from");
        assert_eq!(l.pop_atom()?.canonical_str(), "b2");
        assert!(l.is_empty());
        Ok(())
    }

    #[test]
    fn nested_lists() -> Res<()> {
        let e = parse_str("(and (p a)\n ; (q b)\n (not (q c)))")?;
        let conjuncts = e.as_application("and").unwrap();
        assert_eq!(conjuncts.len(), 2);
        assert!(conjuncts[1].as_application("not").is_some());
        assert_eq!(e.to_string(), "(and (p a) (not (q c)))");
        Ok(())
    }

    #[test]
    fn unbalanced() {
        assert!(parse_str("(and (p a)").is_err());
        assert!(parse_str("(p a))").is_err());
        assert!(parse_str("").is_err());
    }

    #[test]
    fn many() -> Res<()> {
        let exprs = parse_many(Arc::new(Input::from_string("(a b)\n(c)\n; cost = 2")))?;
        assert_eq!(exprs.len(), 2);
        Ok(())
    }
}
