//! Re-grounding of quality metrics over the actions of a ground problem.

use downward_model::*;

use crate::errors::Result;
use crate::trace::TraceBackMap;

/// Rewrites the metrics of `lifted` for the ground actions of `ground`.
///
/// The cost of a ground action is the cost of its lifted action with the parameters replaced by the
/// arguments, simplified. Other metrics are kept as is. `ground` must share the environment of `lifted`.
pub fn reground(lifted: &Problem, trace: &TraceBackMap, ground: &mut Problem) -> Result<()> {
    let simplifier = Simplifier::new(lifted);
    let mut metrics = Vec::with_capacity(lifted.metrics.len());
    for metric in &lifted.metrics {
        match metric {
            Metric::MinimizeActionCosts(costs) => {
                let mut ground_costs = ActionCosts::new(costs.default);
                for (ground_action, entry) in trace.iter() {
                    let Some(cost) = costs.get(&entry.action) else {
                        continue;
                    };
                    let schema = lifted.action(&entry.action)?;
                    let env = &mut ground.env;
                    let subst: Substitution = schema
                        .parameters
                        .iter()
                        .zip(&entry.arguments)
                        .map(|(p, o)| (p.name.clone(), env.object(o)))
                        .collect();
                    let cost = env.substitute(cost, &subst)?;
                    let cost = simplifier.simplify(env, cost)?;
                    ground_costs.set(ground_action.clone(), cost);
                }
                tracing::debug!(num_costs = ground_costs.iter().count(), "regrounded action costs");
                metrics.push(Metric::MinimizeActionCosts(ground_costs));
            }
            other => metrics.push(other.clone()),
        }
    }
    ground.metrics = metrics;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::GroundOrigin;
    use downward_model::pddl::{input::Input, read_problem};

    const DOMAIN: &str = "
(define (domain shop)
  (:requirements :typing :action-costs)
  (:types article)
  (:predicates (bought ?a - article))
  (:functions (price ?a - article) - number (total-cost) - number)
  (:action buy
    :parameters (?a - article)
    :precondition (and)
    :effect (and (bought ?a) (increase (total-cost) (price ?a)))))";

    const PROBLEM: &str = "
(define (problem shop-2) (:domain shop)
  (:objects bread milk - article)
  (:init (= (price bread) 3) (= (price milk) 5) (= (total-cost) 0))
  (:goal (and (bought bread) (bought milk)))
  (:metric minimize (total-cost)))";

    #[test]
    fn ground_costs() -> Result<()> {
        let pb = read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?;
        let origins = ["bread", "milk"]
            .into_iter()
            .map(|o| -> Result<GroundOrigin> {
                Ok(GroundOrigin {
                    ground_action: format!("buy_{o}").into(),
                    action: "buy".into(),
                    arguments: vec![pb.object(o)?.clone()],
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let trace = TraceBackMap::build(origins, |a| Some(a.clone()));

        let mut ground = pb.clone();
        ground.metrics = vec![Metric::MinimizeSequentialPlanLength];
        reground(&pb, &trace, &mut ground)?;
        assert_eq!(ground.metrics.len(), 1);
        let Metric::MinimizeActionCosts(costs) = &ground.metrics[0] else {
            panic!("action costs expected");
        };
        let cost = |a: &str| (&ground.env / costs.get(a).unwrap()).numeric_constant();
        assert_eq!(cost("buy_bread"), Some(RealValue::from_integer(3)));
        assert_eq!(cost("buy_milk"), Some(RealValue::from_integer(5)));
        assert_eq!(costs.iter().count(), 2);
        Ok(())
    }

    #[test]
    fn other_metrics_are_kept() -> Result<()> {
        let mut pb = read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?;
        pb.metrics = vec![Metric::MinimizeSequentialPlanLength];
        let mut ground = pb.clone();
        ground.metrics.clear();
        reground(&pb, &TraceBackMap::default(), &mut ground)?;
        assert!(matches!(ground.metrics[..], [Metric::MinimizeSequentialPlanLength]));
        Ok(())
    }
}
