use derive_more::derive::Display;
use itertools::Itertools;
use thiserror::Error;

use crate::{env::Environment, *};

#[derive(Error, Debug)]
pub enum FluentError {
    #[error("Duplicate fluent: {0}")]
    DuplicateFluent(Sym),
    #[error("Unknown fluent: {0}")]
    UnknownFluent(Sym),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FluentId(u32);

#[derive(Clone, Debug, Default)]
pub struct Fluents {
    fluents: Vec<Fluent>,
}

impl Display for Fluents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fluents:\n  ")?;
        utils::disp_slice(f, &self.fluents, "\n  ")
    }
}

impl Fluents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FluentId) -> &Fluent {
        &self.fluents[id.0 as usize]
    }

    pub fn get_by_name(&self, name: impl AsRef<str>) -> Option<FluentId> {
        let name = name.as_ref();
        self.fluents
            .iter()
            .position(|f| f.name.canonical_str() == name)
            .map(|i| FluentId(i as u32))
    }

    pub fn find(&self, name: impl AsRef<str>) -> Result<FluentId, FluentError> {
        self.get_by_name(name.as_ref())
            .ok_or_else(|| FluentError::UnknownFluent(Sym::from(name.as_ref())))
    }

    pub fn add_fluent(
        &mut self,
        name: impl Into<Sym>,
        parameters: Vec<Param>,
        return_type: Type,
    ) -> Result<FluentId, FluentError> {
        let name = name.into();
        if self.get_by_name(&name).is_some() {
            return Err(FluentError::DuplicateFluent(name));
        }
        let id = FluentId(self.fluents.len() as u32);
        self.fluents.push(Fluent {
            name,
            parameters,
            return_type,
        });
        Ok(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FluentId, &Fluent)> + '_ {
        self.fluents.iter().enumerate().map(|(i, f)| (FluentId(i as u32), f))
    }

    pub fn len(&self) -> usize {
        self.fluents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fluents.is_empty()
    }
}

#[derive(Clone, Debug, Display)]
#[display("{}({}) -> {}", name, parameters.iter().map(|p| format!("{p:?}")).join(", "), return_type)]
pub struct Fluent {
    pub name: Sym,
    pub parameters: Vec<Param>,
    pub return_type: Type,
}

impl Fluent {
    pub fn name(&self) -> &Sym {
        &self.name
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.return_type, Type::Bool)
    }

    pub fn return_type(&self, args: &[ExprId], env: &Environment) -> Result<Type, TypeError> {
        if args.len() < self.parameters.len() {
            return Err(TypeError::MissingParameter(self.parameters[args.len()].clone()));
        } else if args.len() > self.parameters.len() {
            return Err(TypeError::UnexpectedArgument(args[self.parameters.len()]));
        }
        for (i, arg) in args.iter().enumerate() {
            self.parameters[i].tpe.accepts(*arg, env)?;
        }
        Ok(self.return_type.clone())
    }
}

impl<'env> Display for Env<'env, FluentId> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.env.fluents.get(self.elem).name)
    }
}
