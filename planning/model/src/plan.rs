use itertools::Itertools;

use crate::*;

/// An action applied to some objects, e.g. `move(r1, l1, l2)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionInstance {
    pub action: Sym,
    pub arguments: Vec<Object>,
}

impl ActionInstance {
    pub fn new(action: impl Into<Sym>, arguments: Vec<Object>) -> Self {
        Self {
            action: action.into(),
            arguments,
        }
    }
}

impl Display for ActionInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.action, self.arguments.iter().format(", "))
    }
}

/// A totally ordered sequence of action instances.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequentialPlan {
    pub actions: Vec<ActionInstance>,
}

impl SequentialPlan {
    pub fn new(actions: Vec<ActionInstance>) -> Self {
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Display for SequentialPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, a) in self.actions.iter().enumerate() {
            writeln!(f, "{i:>4}: {a}")?;
        }
        Ok(())
    }
}
