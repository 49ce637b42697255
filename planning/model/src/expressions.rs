use errors::Spanned;
use smallvec::SmallVec;

use crate::{
    env::{Env, Environment},
    utils::disp_iter,
    *,
};

pub type IntValue = i64;
pub type RealValue = num_rational::Rational64;

#[derive(Debug, PartialEq, PartialOrd, Ord, Eq, Hash, Clone, Copy)]
pub struct ExprId(pub(crate) u32);

pub type SeqExprId = SmallVec<[ExprId; 3]>;

#[derive(Clone)]
pub(crate) struct ExprNode {
    pub(crate) expr: Expr,
    pub(crate) tpe: Type,
    pub(crate) span: Option<Span>,
}

impl ExprNode {
    pub fn new(expr: Expr, tpe: Type, span: Option<Span>) -> Self {
        Self { expr, tpe, span }
    }
}

pub type TExpr<'env> = Env<'env, ExprId>;

impl<'a> TExpr<'a> {
    fn get(&self) -> &'a ExprNode {
        self.env.get(self.elem)
    }
    pub fn bool(&self) -> Result<bool, Message> {
        if let Expr::Bool(value) = &self.get().expr {
            Ok(*value)
        } else {
            Err(Message::error("expected boolean value").snippet(self.error("not a boolean")))
        }
    }
    pub fn object(&self) -> Result<&'a Object, Message> {
        if let Expr::Object(o) = &self.get().expr {
            Ok(o)
        } else {
            Err(Message::error("expected an object").snippet(self.error("not an object")))
        }
    }
    pub fn state_variable(&self) -> Result<(FluentId, &'a [ExprId]), Message> {
        if let Expr::StateVariable(fun, args) = &self.get().expr {
            Ok((*fun, args.as_slice()))
        } else {
            Err(Message::error("expected state variable value").snippet(self.error("not a state variable")))
        }
    }

    /// Numeric value of the expression, if it is a numeric constant.
    pub fn numeric_constant(&self) -> Option<RealValue> {
        match &self.get().expr {
            Expr::Int(i) => Some(RealValue::from_integer(*i)),
            Expr::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.get().expr,
            Expr::Int(_) | Expr::Real(_) | Expr::Bool(_) | Expr::Object(_)
        )
    }

    pub fn tpe(&self) -> &'a Type {
        &self.get().tpe
    }
    pub fn expr(&self) -> &'a Expr {
        &self.get().expr
    }
}

impl<'a> Debug for TExpr<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl<'a> Spanned for TExpr<'a> {
    fn span(&self) -> Option<&Span> {
        self.get().span.as_ref()
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Int(IntValue),
    Real(RealValue),
    Bool(bool),
    Object(Object),
    Param(Param),
    App(Fun, SeqExprId),
    StateVariable(FluentId, SeqExprId),
    Exists(Vec<Param>, ExprId),
    Forall(Vec<Param>, ExprId),
}

impl<'a> Display for TExpr<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.expr() {
            Expr::Int(i) => write!(f, "{i}"),
            Expr::Real(r) => write!(f, "{r}"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Object(o) => write!(f, "{o}"),
            Expr::Param(p) => write!(f, "{p}"),
            Expr::App(function, args) => {
                write!(f, "{function}(")?;
                disp_iter(f, args.iter().map(|&e| self.env / e), ", ")?;
                write!(f, ")")
            }
            Expr::StateVariable(fluent, args) => {
                write!(f, "{}", self.env / *fluent)?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    disp_iter(f, args.iter().map(|&e| self.env / e), ", ")?;
                    write!(f, ")")?;
                }
                Ok(())
            }
            Expr::Exists(vars, body) | Expr::Forall(vars, body) => {
                let quantifier = if matches!(self.expr(), Expr::Exists(_, _)) {
                    "exists"
                } else {
                    "forall"
                };
                write!(f, "{quantifier}(")?;
                disp_iter(f, vars.iter().map(|v| format!("{v:?}")), ", ")?;
                write!(f, "). {}", self.env / *body)
            }
        }
    }
}

impl Expr {
    pub fn tpe(&self, env: &Environment) -> Result<Type, TypeError> {
        match self {
            Expr::Int(_) => Ok(Type::Int),
            Expr::Real(_) => Ok(Type::Real),
            Expr::Bool(_) => Ok(Type::Bool),
            Expr::App(fun, args) => fun.return_type(args.as_slice(), env),
            Expr::StateVariable(fluent, args) => env.fluents.get(*fluent).return_type(args.as_slice(), env),
            Expr::Object(o) => Ok(o.tpe().into()),
            Expr::Param(p) => Ok(p.tpe().clone()),
            Expr::Exists(_, body) | Expr::Forall(_, body) => {
                Type::Bool.accepts(*body, env)?;
                Ok(Type::Bool)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fun {
    Plus,
    Minus,
    Times,
    Div,
    And,
    Or,
    Not,
    Implies,
    Iff,
    Eq,
    Lt,
    Leq,
}

impl Fun {
    pub fn return_type(&self, args_types: &[ExprId], env: &Environment) -> Result<Type, TypeError> {
        use Fun::*;
        match self {
            Plus | Times | Minus => {
                if *self == Minus {
                    arity(args_types, 1, 2)?;
                }
                let mut all_int = true;
                for a in args_types {
                    Type::Real.accepts(*a, env)?;
                    all_int &= matches!(env.node(*a).tpe(), Type::Int);
                }
                Ok(if all_int { Type::Int } else { Type::Real })
            }
            Div => {
                arity(args_types, 2, 2)?;
                for a in args_types {
                    Type::Real.accepts(*a, env)?;
                }
                Ok(Type::Real)
            }
            And | Or => {
                for a in args_types {
                    Type::Bool.accepts(*a, env)?;
                }
                Ok(Type::Bool)
            }
            Not => {
                arity(args_types, 1, 1)?;
                Type::Bool.accepts(args_types[0], env)?;
                Ok(Type::Bool)
            }
            Implies | Iff => {
                arity(args_types, 2, 2)?;
                for a in args_types {
                    Type::Bool.accepts(*a, env)?;
                }
                Ok(Type::Bool)
            }
            Eq => {
                arity(args_types, 2, 2)?;
                let left = env.node(args_types[0]).tpe();
                let right = env.node(args_types[1]).tpe();
                let comparable = left.overlaps(right) || (left.is_numeric() && right.is_numeric());
                if comparable {
                    Ok(Type::Bool)
                } else {
                    Err(TypeError::IncompatibleType(args_types[1], left.clone()))
                }
            }
            Lt | Leq => {
                arity(args_types, 2, 2)?;
                for a in args_types {
                    Type::Real.accepts(*a, env)?;
                }
                Ok(Type::Bool)
            }
        }
    }
}

fn arity(args: &[ExprId], min: usize, max: usize) -> Result<(), TypeError> {
    if args.len() < min {
        Err(TypeError::MissingParameter(Param::new(
            format!("<argument-{}>", args.len()),
            Type::Bool,
        )))
    } else if args.len() > max {
        Err(TypeError::UnexpectedArgument(args[max]))
    } else {
        Ok(())
    }
}

impl Display for Fun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Fun::Plus => "+",
                Fun::Minus => "-",
                Fun::Times => "*",
                Fun::Div => "/",
                Fun::And => "and",
                Fun::Or => "or",
                Fun::Not => "not",
                Fun::Implies => "implies",
                Fun::Iff => "iff",
                Fun::Eq => "=",
                Fun::Lt => "<",
                Fun::Leq => "<=",
            }
        )
    }
}
