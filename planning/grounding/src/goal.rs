//! Rewriting of goals that are not a conjunction of literals into a single goal fluent, made true by a
//! dedicated action whose precondition is the original goal.

use downward_model::*;

/// Result of [`transform`].
#[derive(Clone)]
pub struct GoalTransformation {
    pub problem: Problem,
    /// Name of the action reaching the goal fluent, if the goal was rewritten.
    pub goal_action: Option<Sym>,
    /// For each action of the rewritten problem (except the goal action), the action of the input problem
    /// it was copied from. `None` if the goal was left unchanged.
    pub original_actions: Option<hashbrown::HashMap<Sym, Sym>>,
}

impl GoalTransformation {
    /// Action of the input problem that `action` stems from, or `None` for the synthetic goal action.
    pub fn original_action<'a>(&'a self, action: &'a Sym) -> Option<&'a Sym> {
        match &self.original_actions {
            Some(map) => map.get(action),
            None => Some(action),
        }
    }
}

/// Returns true if the expression is neither a literal nor a conjunction of literals.
pub fn is_complicated(env: &Environment, e: ExprId) -> bool {
    match (env / e).expr() {
        Expr::Exists(_, _) | Expr::Forall(_, _) => true,
        Expr::App(Fun::Or | Fun::Implies | Fun::Iff, _) => true,
        Expr::App(Fun::Not, args) => !matches!((env / args[0]).expr(), Expr::StateVariable(_, _)),
        Expr::App(Fun::And, args) => args.iter().any(|&a| is_complicated(env, a)),
        _ => false,
    }
}

pub fn has_complicated_goal(problem: &Problem) -> bool {
    problem.goals.iter().any(|&g| is_complicated(&problem.env, g))
}

/// Introduces a goal action if the goals of the problem are complicated, otherwise returns the problem
/// unchanged.
pub fn transform(problem: &Problem, propagate_destruction: bool) -> Res<GoalTransformation> {
    if has_complicated_goal(problem) {
        introduce_goal_action(problem, propagate_destruction)
    } else {
        Ok(GoalTransformation {
            problem: problem.clone(),
            goal_action: None,
            original_actions: None,
        })
    }
}

/// Replaces the goals of the problem by a fresh boolean fluent that can only be made true by a new action
/// whose preconditions are the original goals.
///
/// With `propagate_destruction`, every other action makes the goal fluent false so that the goal fluent
/// holds in a state only if the original goals hold in it.
pub fn introduce_goal_action(problem: &Problem, propagate_destruction: bool) -> Res<GoalTransformation> {
    let mut pb = problem.clone();
    let fluent_name = pb.fresh_name("goal");
    let goal_fluent = pb
        .env
        .fluents
        .add_fluent(fluent_name, vec![], Type::Bool)
        .map_err(Message::error)?;
    let goal = StateVariable::new(goal_fluent, []);

    if propagate_destruction {
        let f = pb.env.bool(false);
        for a in pb.actions.iter_mut() {
            a.effects.push(Effect::assignement(goal.clone(), f));
        }
    }
    let original_actions = pb.actions.iter().map(|a| (a.name.clone(), a.name.clone())).collect();

    let action_name = pb.fresh_name("reach_goal");
    let mut action = Action::new(action_name.clone(), vec![]);
    action.preconditions = std::mem::take(&mut pb.goals);
    let t = pb.env.bool(true);
    action.effects.push(Effect::assignement(goal.clone(), t));
    pb.add_action(action)?;
    pb.goals = vec![pb.env.state_variable(goal_fluent, [])?];

    if let Some(Metric::MinimizeActionCosts(_)) = pb.metrics.first() {
        let one = pb.env.int(1);
        if let Some(Metric::MinimizeActionCosts(costs)) = pb.metrics.first_mut() {
            costs.set(action_name.clone(), one);
        }
    }
    tracing::debug!(goal_action = %action_name, "introduced goal action");

    Ok(GoalTransformation {
        problem: pb,
        goal_action: Some(action_name),
        original_actions: Some(original_actions),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use downward_model::pddl::{input::Input, read_problem};

    const DOMAIN: &str = "
(define (domain boxes)
  (:requirements :typing :existential-preconditions :negative-preconditions :action-costs)
  (:types box)
  (:predicates (open ?b - box) (broken ?b - box) (goal0))
  (:functions (total-cost) - number)
  (:action open
    :parameters (?b - box)
    :precondition (not (open ?b))
    :effect (and (open ?b) (increase (total-cost) 2))))";

    fn problem(goal: &str) -> Res<Problem> {
        let pb = format!(
            "(define (problem p) (:domain boxes) (:objects b1 b2 - box) (:init (broken b2))
               (:goal {goal}) (:metric minimize (total-cost)))"
        );
        read_problem(Input::from_string(DOMAIN), Input::from_string(pb))
    }

    #[test]
    fn simple_goals_are_unchanged() -> Res<()> {
        let pb = problem("(and (open b1) (not (broken b1)))")?;
        assert!(!has_complicated_goal(&pb));
        let res = transform(&pb, true)?;
        assert!(res.goal_action.is_none());
        assert!(res.original_actions.is_none());
        assert_eq!(res.problem.goals, pb.goals);
        assert_eq!(res.problem.actions.len(), pb.actions.len());
        assert_eq!(res.problem.env.fluents.len(), pb.env.fluents.len());
        Ok(())
    }

    #[test]
    fn complicated_goals() -> Res<()> {
        for goal in [
            "(exists (?b - box) (and (open ?b) (not (broken ?b))))",
            "(forall (?b - box) (open ?b))",
            "(or (open b1) (open b2))",
            "(imply (open b1) (open b2))",
            "(not (and (open b1) (open b2)))",
        ] {
            let pb = problem(goal)?;
            assert!(has_complicated_goal(&pb), "{goal}");
        }
        Ok(())
    }

    #[test]
    fn goal_action() -> Res<()> {
        let pb = problem("(exists (?b - box) (and (open ?b) (not (broken ?b))))")?;
        let res = transform(&pb, true)?;
        let new = &res.problem;
        assert_eq!(new.env.fluents.len(), pb.env.fluents.len() + 1);
        assert_eq!(new.actions.len(), pb.actions.len() + 1);
        // `goal0` is already taken by the domain
        assert!(new.env.fluents.get_by_name("goal1").is_some());
        let goal_action = res.goal_action.clone().unwrap();
        assert_eq!(goal_action, "reach_goal0");
        let reach = new.action(&goal_action)?;
        assert!(reach.parameters.is_empty());
        assert_eq!(reach.preconditions, pb.goals);
        assert_eq!(reach.effects.len(), 1);

        // destruction: the original action now also falsifies the goal fluent
        assert_eq!(new.action("open")?.effects.len(), 2);
        assert_eq!(res.original_action(&Sym::from("open")), Some(&Sym::from("open")));
        assert_eq!(res.original_action(&goal_action), None);

        let costs = new.action_costs().unwrap();
        assert_eq!((&new.env / costs.get(&goal_action).unwrap()).numeric_constant(), Some(RealValue::from_integer(1)));
        assert_eq!((&new.env / costs.get("open").unwrap()).numeric_constant(), Some(RealValue::from_integer(2)));

        // the rewritten goal is simple
        let again = transform(new, true)?;
        assert!(again.goal_action.is_none());
        assert_eq!(again.problem.actions.len(), new.actions.len());
        Ok(())
    }

    #[test]
    fn without_destruction() -> Res<()> {
        let pb = problem("(or (open b1) (open b2))")?;
        let res = transform(&pb, false)?;
        assert_eq!(res.problem.action("open")?.effects.len(), 1);
        Ok(())
    }
}
