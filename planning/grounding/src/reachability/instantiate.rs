//! Instantiation of the actions and axioms of a normalized task for all parameter values found reachable
//! in the minimal model of its delete relaxation.

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use crate::errors::{GroundingError, Result};
use crate::reachability::datalog::{GroundAtom, Predicate};
use crate::reachability::task::*;

/// Effect of a propositional action: the atom is changed if all literals of the condition hold.
pub type CondEffect = (Vec<Literal>, Atom);

#[derive(Clone, Debug)]
pub struct PropositionalAction {
    /// Name of the form `(action a b ...)` with the arguments of the declared parameters.
    pub name: String,
    pub precondition: Vec<Literal>,
    pub add_effects: Vec<CondEffect>,
    pub del_effects: Vec<CondEffect>,
    pub cost: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PropositionalAxiom {
    pub name: String,
    pub condition: Vec<Literal>,
    pub effect: Atom,
}

/// Result of the reachability analysis.
#[derive(Clone, Debug)]
pub struct Explored {
    /// Whether the goal is reachable in the delete relaxation.
    pub relaxed_reachable: bool,
    /// Reachable atoms that may change value.
    pub atoms: Vec<Atom>,
    pub actions: Vec<PropositionalAction>,
    pub goals: Vec<Literal>,
    pub axioms: Vec<PropositionalAxiom>,
}

/// Raised when a literal can never hold.
struct Impossible;

struct Instantiator<'a> {
    init: HashSet<&'a Atom>,
    fluent_facts: HashSet<Atom>,
    objects_by_type: HashMap<Name, Vec<Name>>,
    task: &'a Task,
}

type Mapping = HashMap<Name, Name>;

impl Instantiator<'_> {
    /// Appends the literals of the condition that may change value. Literals that always hold are dropped.
    fn condition(&self, c: &Condition, mapping: &Mapping, out: &mut Vec<Literal>) -> std::result::Result<(), Impossible> {
        match c {
            Condition::Truth => Ok(()),
            Condition::Falsity => Err(Impossible),
            Condition::Literal(l) => self.literal(l, mapping, out),
            Condition::And(parts) => parts.iter().try_for_each(|p| self.condition(p, mapping, out)),
            // normalized conditions are conjunctions of literals
            _ => unreachable!("non-normalized condition: {c}"),
        }
    }

    fn literal(&self, l: &Literal, mapping: &Mapping, out: &mut Vec<Literal>) -> std::result::Result<(), Impossible> {
        let atom = l.atom.rename(mapping);
        if self.fluent_facts.contains(&atom) {
            out.push(Literal {
                atom,
                negated: l.negated,
            });
            Ok(())
        } else if self.init.contains(&atom) != l.negated {
            Ok(())
        } else {
            Err(Impossible)
        }
    }

    fn action(&self, action: &Action, args: &[Name]) -> Result<Option<PropositionalAction>> {
        let mapping: Mapping = action.parameters.iter().map(|p| p.name.clone()).zip(args.iter().cloned()).collect();
        let mut precondition = Vec::new();
        if self.condition(&action.precondition, &mapping, &mut precondition).is_err() {
            return Ok(None);
        }
        let mut effects: Vec<(Vec<Literal>, Literal)> = Vec::new();
        for eff in &action.effects {
            if eff.parameters.is_empty() {
                self.effect(eff, &mapping, &mut effects);
                continue;
            }
            let domains: Vec<&[Name]> = eff
                .parameters
                .iter()
                .map(|p| self.objects_by_type.get(&p.tpe).map(|v| v.as_slice()).unwrap_or(&[]))
                .collect();
            if domains.iter().any(|d| d.is_empty()) {
                continue;
            }
            for values in domains.iter().map(|d| d.iter()).multi_cartesian_product() {
                let mut mapping = mapping.clone();
                for (p, v) in eff.parameters.iter().zip(values) {
                    mapping.insert(p.name.clone(), v.clone());
                }
                self.effect(eff, &mapping, &mut effects);
            }
        }
        if effects.is_empty() {
            return Ok(None);
        }

        let mut add_effects = Vec::new();
        for (cond, lit) in &effects {
            if !lit.negated {
                add_effects.push((cond.clone(), lit.atom.clone()));
            }
        }
        let mut del_effects = Vec::new();
        for (cond, lit) in effects {
            if lit.negated {
                let eff = (cond, lit.atom);
                if !add_effects.contains(&eff) {
                    del_effects.push(eff);
                }
            }
        }

        let cost = if self.task.use_min_cost_metric {
            match &action.cost {
                None => 0,
                Some(Cost::Constant(c)) => *c,
                Some(Cost::Fluent(f)) => {
                    let f = f.rename(&mapping);
                    *self
                        .task
                        .init_assignments
                        .get(&f)
                        .ok_or_else(|| GroundingError::UnsupportedTask(format!("no initial value for the cost {f}")))?
                }
            }
        } else {
            1
        };

        let external = &args[..action.num_external_parameters];
        let name = if external.is_empty() {
            format!("({})", action.name)
        } else {
            format!("({} {})", action.name, external.iter().join(" "))
        };
        Ok(Some(PropositionalAction {
            name,
            precondition,
            add_effects,
            del_effects,
            cost,
        }))
    }

    fn effect(&self, eff: &Effect, mapping: &Mapping, out: &mut Vec<(Vec<Literal>, Literal)>) {
        let mut condition = Vec::new();
        if self.condition(&eff.condition, mapping, &mut condition).is_err() {
            return;
        }
        let atom = eff.literal.atom.rename(mapping);
        if self.fluent_facts.contains(&atom) {
            out.push((
                condition,
                Literal {
                    atom,
                    negated: eff.literal.negated,
                },
            ));
        }
    }

    fn axiom(&self, axiom: &Axiom, args: &[Name]) -> Option<PropositionalAxiom> {
        let mapping: Mapping = axiom.parameters.iter().map(|p| p.name.clone()).zip(args.iter().cloned()).collect();
        let mut condition = Vec::new();
        self.condition(&axiom.condition, &mapping, &mut condition).ok()?;
        Some(PropositionalAxiom {
            name: format!("({} {})", axiom.name, args.iter().join(" ")),
            condition,
            effect: Atom::new(axiom.name.clone(), args[..axiom.num_external_parameters].to_vec()),
        })
    }
}

/// Instantiates the task for all bindings of the model.
pub fn instantiate(task: &Task, model: &[GroundAtom]) -> Result<Explored> {
    let fluent_predicates = task.fluent_predicates();
    let mut atoms = Vec::new();
    for a in model {
        if let Predicate::Named(p) = &a.predicate {
            if fluent_predicates.contains(p) {
                atoms.push(Atom::new(p.clone(), a.args.clone()));
            }
        }
    }
    let inst = Instantiator {
        init: task.init.iter().collect(),
        fluent_facts: atoms.iter().cloned().collect(),
        objects_by_type: task.objects_by_type(),
        task,
    };

    let mut relaxed_reachable = false;
    let mut actions = Vec::new();
    let mut axioms = Vec::new();
    for a in model {
        match &a.predicate {
            Predicate::Action(i) => {
                if let Some(action) = inst.action(&task.actions[*i], &a.args)? {
                    actions.push(action);
                }
            }
            Predicate::Axiom(j) => {
                if let Some(axiom) = inst.axiom(&task.axioms[*j], &a.args) {
                    axioms.push(axiom);
                }
            }
            Predicate::GoalReachable => relaxed_reachable = true,
            Predicate::Named(_) => {}
        }
    }
    axioms.sort();

    let mut goals = Vec::new();
    if let Some(literals) = task.goal.literals() {
        goals.extend(literals.into_iter().cloned());
    }
    tracing::debug!(
        relaxed_reachable,
        num_atoms = atoms.len(),
        num_actions = actions.len(),
        num_axioms = axioms.len(),
        "instantiated task"
    );
    Ok(Explored {
        relaxed_reachable,
        atoms,
        actions,
        goals,
        axioms,
    })
}

#[cfg(test)]
mod tests {
    use crate::reachability::explore;

    const DOMAIN: &str = "
(define (domain lights)
  (:requirements :typing :negative-preconditions :conditional-effects :action-costs)
  (:types room)
  (:predicates (lit ?r - room) (adjacent ?a ?b - room) (in ?r - room))
  (:functions (distance ?a ?b - room) (total-cost))
  (:action go
    :parameters (?from ?to - room)
    :precondition (and (in ?from) (adjacent ?from ?to))
    :effect (and (not (in ?from)) (in ?to) (increase (total-cost) (distance ?from ?to))))
  (:action switch
    :parameters (?r - room)
    :precondition (in ?r)
    :effect (and (when (not (lit ?r)) (lit ?r)) (when (lit ?r) (not (lit ?r))))))";

    const PROBLEM: &str = "
(define (problem p) (:domain lights)
  (:objects kitchen hall cellar - room)
  (:init (in hall) (adjacent hall kitchen) (adjacent kitchen hall) (lit cellar)
         (= (distance hall kitchen) 3) (= (distance kitchen hall) 4) (= (total-cost) 0))
  (:goal (and (lit kitchen) (in hall)))
  (:metric minimize (total-cost)))";

    #[test]
    fn ground_actions() {
        let explored = explore(DOMAIN, PROBLEM).unwrap();
        assert!(explored.relaxed_reachable);
        let mut names: Vec<_> = explored.actions.iter().map(|a| a.name.as_str()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["(go hall kitchen)", "(go kitchen hall)", "(switch hall)", "(switch kitchen)"]
        );
        let go = explored.actions.iter().find(|a| a.name == "(go hall kitchen)").unwrap();
        assert_eq!(go.cost, 3);
        // the static `adjacent` precondition is dropped
        assert_eq!(go.precondition.len(), 1);
        assert_eq!(go.precondition[0].to_string(), "in(hall)");
        assert_eq!(go.add_effects.len(), 1);
        assert_eq!(go.del_effects.len(), 1);

        let switch = explored.actions.iter().find(|a| a.name == "(switch kitchen)").unwrap();
        assert_eq!(switch.add_effects.len(), 1);
        assert_eq!(switch.add_effects[0].0[0].to_string(), "not lit(kitchen)");
        assert_eq!(switch.del_effects.len(), 1);

        assert!(explored.axioms.is_empty());
        assert_eq!(explored.goals.len(), 2);
    }

    #[test]
    fn unit_costs_without_metric() {
        let problem = PROBLEM.replace("(:metric minimize (total-cost))", "");
        let explored = explore(DOMAIN, &problem).unwrap();
        assert!(explored.actions.iter().all(|a| a.cost == 1));
    }
}
