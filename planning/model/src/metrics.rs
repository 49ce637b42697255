use itertools::Itertools;

use crate::{env::Env, *};

/// Cost of each action, as an expression over the action's parameters.
#[derive(Clone, Debug, Default)]
pub struct ActionCosts {
    costs: Vec<(Sym, ExprId)>,
    /// Cost of actions with no explicit entry. If absent, such actions have no cost.
    pub default: Option<ExprId>,
}

impl ActionCosts {
    pub fn new(default: Option<ExprId>) -> Self {
        Self {
            costs: Vec::new(),
            default,
        }
    }

    pub fn set(&mut self, action: impl Into<Sym>, cost: ExprId) {
        let action = action.into();
        match self.costs.iter_mut().find(|(a, _)| a == &action) {
            Some(entry) => entry.1 = cost,
            None => self.costs.push((action, cost)),
        }
    }

    /// Cost of the action, falling back on the default cost.
    pub fn get(&self, action: impl AsRef<str>) -> Option<ExprId> {
        let action = action.as_ref();
        self.costs
            .iter()
            .find(|(a, _)| a.canonical_str() == action)
            .map(|(_, c)| *c)
            .or(self.default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Sym, ExprId)> + '_ {
        self.costs.iter().map(|(a, c)| (a, *c))
    }
}

/// Objective of the planning problem.
#[derive(Clone, Debug)]
pub enum Metric {
    /// Minimize the sum of the costs of the actions in the plan
    MinimizeActionCosts(ActionCosts),
    /// Minimize the number of actions in the plan
    MinimizeSequentialPlanLength,
    Minimize(ExprId),
    Maximize(ExprId),
}

impl<'env> Display for Env<'env, &Metric> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.elem {
            Metric::MinimizeActionCosts(costs) => {
                write!(
                    f,
                    "minimize action-costs {{{}}}",
                    costs.iter().map(|(a, c)| format!("{a}: {}", self.env / c)).format(", ")
                )?;
                if let Some(default) = costs.default {
                    write!(f, " default: {}", self.env / default)?;
                }
                Ok(())
            }
            Metric::MinimizeSequentialPlanLength => write!(f, "minimize plan-length"),
            Metric::Minimize(e) => write!(f, "minimize {}", self.env / *e),
            Metric::Maximize(e) => write!(f, "maximize {}", self.env / *e),
        }
    }
}
