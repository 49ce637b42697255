use std::fmt::Debug;

use derive_more::derive::Display;

use crate::{Sym, types::Type};

/// A typed variable: parameter of an action or fluent, or variable of a quantifier.
#[derive(Clone, Display)]
#[display("{name}")]
pub struct Param {
    pub name: Sym,
    pub tpe: Type,
}

impl Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.tpe)
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Param {
    pub fn new(name: impl Into<Sym>, tpe: impl Into<Type>) -> Self {
        Self {
            name: name.into(),
            tpe: tpe.into(),
        }
    }

    pub fn name(&self) -> &Sym {
        &self.name
    }
    pub fn tpe(&self) -> &Type {
        &self.tpe
    }
}
