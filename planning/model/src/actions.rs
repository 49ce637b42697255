use itertools::Itertools;

use thiserror::Error;

use crate::*;

#[derive(Error, Debug)]
pub enum ActionsError {
    #[error("Duplicate action: {0}")]
    DuplicateAction(Sym),
    #[error("Unknown action: {0}")]
    UnknownAction(Sym),
}

/// Actions of a problem, in insertion order.
#[derive(Default, Clone)]
pub struct Actions {
    actions: Vec<Action>,
}

impl Actions {
    pub fn add(&mut self, action: Action) -> Result<(), ActionsError> {
        if self.contains(&action.name) {
            return Err(ActionsError::DuplicateAction(action.name));
        }
        self.actions.push(action);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Action> {
        self.actions.iter_mut()
    }

    pub fn get(&self, name: impl AsRef<str>) -> Result<&Action, ActionsError> {
        let name = name.as_ref();
        self.actions
            .iter()
            .find(|a| a.name.canonical_str() == name)
            .ok_or_else(|| ActionsError::UnknownAction(Sym::from(name)))
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        self.actions.iter().any(|a| a.name.canonical_str() == name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear()
    }
}

/// An instantaneous action schema. The precondition is the conjunction of `preconditions`.
#[derive(Debug, Clone)]
pub struct Action {
    pub name: Sym,
    pub parameters: Vec<Param>,
    pub preconditions: Vec<ExprId>,
    pub effects: Vec<Effect>,
}

impl Action {
    pub fn new(name: impl Into<Sym>, parameters: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            parameters,
            preconditions: Default::default(),
            effects: Default::default(),
        }
    }

    pub fn is_ground(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl<'env> Display for Env<'env, &Action> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let a = self.elem;
        write!(
            f,
            "{}({})",
            a.name,
            a.parameters
                .iter()
                .map(|p| format!("{}: {}", p.name(), p.tpe()))
                .format(", ")
        )?;
        write!(f, "\n    preconditions:")?;
        for c in &a.preconditions {
            write!(f, "\n      {}", self.env / *c)?;
        }
        write!(f, "\n    effects:")?;
        for eff in &a.effects {
            write!(f, "\n      {}", self.env / eff)?;
        }
        Ok(())
    }
}
