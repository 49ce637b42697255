use crate::errors::{Span, Spanned};
use std::{
    borrow::Cow,
    fmt::{Debug, Display},
};

/// Name of an item of the model (type, object, fluent, action, parameter), possibly annotated with
/// the place it was read from.
///
/// Equality, ordering and hashing only consider the canonical view of the symbol.
#[derive(Clone)]
pub struct Sym {
    /// Canonical view of the symbol (lower cased when read from PDDL)
    symbol: compact_str::CompactString,
    /// Origin of the symbol. If present, it is used for display (preserving the capitalization of the source).
    pub span: Option<Span>,
}

impl Sym {
    pub fn new<'a>(s: impl Into<Cow<'a, str>>) -> Sym {
        Sym {
            symbol: s.into().into(),
            span: None,
        }
    }

    pub fn with_source<'a>(s: impl Into<Cow<'a, str>>, source: Span) -> Sym {
        Sym {
            symbol: s.into().into(),
            span: Some(source),
        }
    }

    pub fn canonical_str(&self) -> &str {
        self.symbol.as_str()
    }

    /// Returns the same symbol, stripped of any origin information.
    pub fn detached(&self) -> Sym {
        Sym {
            symbol: self.symbol.clone(),
            span: None,
        }
    }
}

impl AsRef<str> for Sym {
    fn as_ref(&self) -> &str {
        &self.symbol
    }
}

impl std::borrow::Borrow<str> for Sym {
    fn borrow(&self) -> &str {
        &self.symbol
    }
}

impl From<&str> for Sym {
    fn from(value: &str) -> Self {
        Sym::new(value)
    }
}

impl From<String> for Sym {
    fn from(value: String) -> Self {
        Sym::new(value)
    }
}

impl From<&String> for Sym {
    fn from(value: &String) -> Self {
        Sym::new(value.as_str())
    }
}

impl From<&Sym> for Sym {
    fn from(value: &Sym) -> Self {
        value.clone()
    }
}

impl Spanned for Sym {
    fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }
}

impl Debug for Sym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
impl Display for Sym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let view = if let Some(span) = self.span.as_ref() {
            span.str()
        } else {
            self.symbol.as_str()
        };
        write!(f, "{view}")
    }
}

impl PartialEq for Sym {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl PartialEq<str> for Sym {
    fn eq(&self, other: &str) -> bool {
        self.canonical_str() == other
    }
}
impl PartialEq<&str> for Sym {
    fn eq(&self, other: &&str) -> bool {
        self.canonical_str() == *other
    }
}
impl PartialEq<Sym> for str {
    fn eq(&self, other: &Sym) -> bool {
        self == other.canonical_str()
    }
}

impl Eq for Sym {}

impl PartialOrd for Sym {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Sym {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.symbol.cmp(&other.symbol)
    }
}

impl std::hash::Hash for Sym {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.symbol.hash(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pddl::input::Input;
    use std::sync::Arc;

    #[test]
    fn source_only_affects_display() {
        let input = Arc::new(Input::from_string("(Move ?R)"));
        let located = Sym::with_source("move", Span::new(input, 1, 4));
        let plain = Sym::from("move");
        assert_eq!(located, plain);
        assert_eq!(located.to_string(), "Move");
        assert_eq!(plain.to_string(), "move");
        assert_eq!(located.detached().to_string(), "move");
        assert!(located == "move");
    }
}
