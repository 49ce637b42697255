//! Mapping of the ground actions of a compiled problem back to the actions of the input problem.

use downward_model::*;
use hashbrown::HashMap;

use crate::errors::{GroundingError, Result};
use crate::materialize::GroundOrigin;

/// Origin of a ground action.
#[derive(Clone, Debug)]
pub struct TraceEntry {
    /// Lifted action of the grounded problem (after goal rewriting) the ground action instantiates.
    pub action: Sym,
    pub arguments: Vec<Object>,
    /// Corresponding action of the input problem, `None` for actions introduced by the compilation.
    pub original: Option<Sym>,
}

impl TraceEntry {
    /// Instance of the original action, if any.
    pub fn original_instance(&self) -> Option<ActionInstance> {
        self.original
            .as_ref()
            .map(|a| ActionInstance::new(a.clone(), self.arguments.clone()))
    }
}

/// Entry for every ground action of a compiled problem.
#[derive(Clone, Debug, Default)]
pub struct TraceBackMap {
    entries: HashMap<Sym, TraceEntry>,
}

impl TraceBackMap {
    /// Builds the map from the origins of the ground actions. `original_action` gives the action of the
    /// input problem corresponding to a lifted action of the grounded problem.
    pub fn build(origins: Vec<GroundOrigin>, original_action: impl Fn(&Sym) -> Option<Sym>) -> Self {
        let entries = origins
            .into_iter()
            .map(|o| {
                let original = original_action(&o.action);
                let entry = TraceEntry {
                    action: o.action,
                    arguments: o.arguments,
                    original,
                };
                (o.ground_action, entry)
            })
            .collect();
        TraceBackMap { entries }
    }

    pub fn get(&self, ground_action: &Sym) -> Option<&TraceEntry> {
        self.entries.get(ground_action)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Sym, &TraceEntry)> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lifts steps of a plan for the compiled problem into steps of the input problem.
#[derive(Clone, Debug)]
pub struct PlanLifter {
    map: TraceBackMap,
}

impl PlanLifter {
    pub fn new(map: TraceBackMap) -> Self {
        PlanLifter { map }
    }

    pub fn trace_back_map(&self) -> &TraceBackMap {
        &self.map
    }

    /// Instance of the input problem corresponding to a ground action instance, or `None` if the action
    /// was introduced by the compilation.
    pub fn lift(&self, step: &ActionInstance) -> Result<Option<ActionInstance>> {
        let entry = self
            .map
            .get(&step.action)
            .ok_or_else(|| GroundingError::NameResolution(step.action.to_string()))?;
        if !step.arguments.is_empty() {
            return Err(GroundingError::Model(Message::error(format!(
                "ground action {} applied to arguments",
                step.action
            ))));
        }
        Ok(entry.original_instance())
    }

    /// Lifts every step of the plan, leaving out the steps of actions introduced by the compilation.
    pub fn lift_plan(&self, plan: &SequentialPlan) -> Result<SequentialPlan> {
        let mut actions = Vec::with_capacity(plan.len());
        for step in &plan.actions {
            if let Some(lifted) = self.lift(step)? {
                actions.push(lifted);
            }
        }
        Ok(SequentialPlan::new(actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(ground_action: &str, action: &str, arguments: &[&str]) -> GroundOrigin {
        let object = Types::new(UserTypes::new()).top_user_type();
        GroundOrigin {
            ground_action: ground_action.into(),
            action: action.into(),
            arguments: arguments.iter().map(|a| Object::new(*a, object.clone())).collect(),
        }
    }

    fn lifter() -> PlanLifter {
        let origins = vec![
            origin("open_b1", "open", &["b1"]),
            origin("open_b2", "open", &["b2"]),
            origin("reach_goal0", "reach_goal0", &[]),
        ];
        let map = TraceBackMap::build(origins, |a| (a != "reach_goal0").then(|| a.clone()));
        PlanLifter::new(map)
    }

    #[test]
    fn lifting() -> Result<()> {
        let lifter = lifter();
        assert_eq!(lifter.trace_back_map().len(), 3);

        let lifted = lifter.lift(&ActionInstance::new("open_b2", vec![]))?.unwrap();
        assert_eq!(lifted.action, "open");
        assert_eq!(lifted.arguments.len(), 1);
        assert_eq!(lifted.arguments[0].name(), "b2");
        assert!(lifter.lift(&ActionInstance::new("reach_goal0", vec![]))?.is_none());

        let plan = SequentialPlan::new(vec![
            ActionInstance::new("open_b1", vec![]),
            ActionInstance::new("open_b2", vec![]),
            ActionInstance::new("reach_goal0", vec![]),
        ]);
        let lifted = lifter.lift_plan(&plan)?;
        assert_eq!(lifted.len(), 2);
        assert_eq!(lifted.actions[0].arguments[0].name(), "b1");
        Ok(())
    }

    #[test]
    fn unknown_steps() {
        let lifter = lifter();
        assert!(matches!(
            lifter.lift(&ActionInstance::new("close_b1", vec![])),
            Err(GroundingError::NameResolution(_))
        ));
        let object = Types::new(UserTypes::new()).top_user_type();
        let step = ActionInstance::new("open_b1", vec![Object::new("b1", object)]);
        assert!(matches!(lifter.lift(&step), Err(GroundingError::Model(_))));
    }
}
