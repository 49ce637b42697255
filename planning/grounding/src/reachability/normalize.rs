//! Normalization of a task so that every condition is a conjunction of literals.
//!
//! - universal conditions are replaced by the negation of a derived predicate
//! - a goal that is not a conjunction of literals is replaced by a derived predicate
//! - conditions are put in disjunctive normal form and actions, effects and axioms are split per disjunct
//! - existential variables become additional parameters

use downward_model::TOP_TYPE;

use crate::reachability::task::*;

pub fn normalize(task: &mut Task) {
    remove_universal_quantifiers(task);
    substitute_complicated_goal(task);
    split_disjunctions(task);
    eliminate_existential_quantifiers(task);
    tracing::debug!(
        num_actions = task.actions.len(),
        num_axioms = task.axioms.len(),
        "normalized task"
    );
}

fn remove_universal_quantifiers(task: &mut Task) {
    fn recurse(c: Condition, axioms: &mut Vec<Axiom>) -> Condition {
        match c {
            Condition::Forall(vars, body) => {
                let condition = Condition::Exists(vars, Box::new(body.negate()));
                let mut free = condition.free_variables();
                free.sort();
                let name = Name::from(format!("new-axiom@{}", axioms.len()));
                axioms.push(Axiom {
                    name: name.clone(),
                    parameters: free.iter().map(|v| TypedVar::new(v.clone(), TOP_TYPE)).collect(),
                    num_external_parameters: free.len(),
                    condition,
                });
                Condition::Literal(Literal::neg(Atom::new(name, free)))
            }
            Condition::And(parts) => Condition::And(parts.into_iter().map(|p| recurse(p, axioms)).collect()),
            Condition::Or(parts) => Condition::Or(parts.into_iter().map(|p| recurse(p, axioms)).collect()),
            Condition::Exists(vars, body) => Condition::Exists(vars, Box::new(recurse(*body, axioms))),
            other => other,
        }
    }
    let mut axioms = std::mem::take(&mut task.axioms);
    for a in &mut task.actions {
        a.precondition = recurse(std::mem::replace(&mut a.precondition, Condition::Truth), &mut axioms);
        for e in &mut a.effects {
            e.condition = recurse(std::mem::replace(&mut e.condition, Condition::Truth), &mut axioms);
        }
    }
    task.goal = recurse(std::mem::replace(&mut task.goal, Condition::Truth), &mut axioms);
    // axioms introduced here may themselves contain universal conditions
    let mut i = 0;
    while i < axioms.len() {
        let c = std::mem::replace(&mut axioms[i].condition, Condition::Truth);
        axioms[i].condition = recurse(c, &mut axioms);
        i += 1;
    }
    task.axioms = axioms;
}

fn substitute_complicated_goal(task: &mut Task) {
    if task.goal.literals().is_some() {
        return;
    }
    let goal = std::mem::replace(&mut task.goal, Condition::Truth);
    let name = task.add_axiom(Vec::new(), goal);
    task.goal = Condition::Literal(Literal::pos(Atom::new(name, Vec::new())));
}

/// Disjunctive normal form of a condition without universal quantifiers. Existential quantifiers are
/// moved inside the disjuncts.
pub fn dnf(c: Condition) -> Condition {
    match c {
        Condition::And(parts) => {
            let mut combos: Vec<Vec<Condition>> = vec![Vec::new()];
            for p in parts {
                match dnf(p) {
                    Condition::Or(alternatives) => {
                        let mut next = Vec::with_capacity(combos.len() * alternatives.len());
                        for prefix in &combos {
                            for alt in &alternatives {
                                let mut combo = prefix.clone();
                                combo.push(alt.clone());
                                next.push(combo);
                            }
                        }
                        combos = next;
                    }
                    other => combos.iter_mut().for_each(|combo| combo.push(other.clone())),
                }
            }
            Condition::Or(combos.into_iter().map(Condition::And).collect()).simplified()
        }
        Condition::Or(parts) => Condition::Or(parts.into_iter().map(dnf).collect()).simplified(),
        Condition::Exists(vars, body) => {
            let distributed = match dnf(*body) {
                Condition::Or(alternatives) => Condition::Or(
                    alternatives
                        .into_iter()
                        .map(|alt| Condition::Exists(vars.clone(), Box::new(alt)))
                        .collect(),
                ),
                body => Condition::Exists(vars, Box::new(body)),
            };
            distributed.simplified()
        }
        other => other.simplified(),
    }
}

/// Disjuncts of the DNF of the condition. Empty if the condition is unsatisfiable.
fn disjuncts(c: Condition) -> Vec<Condition> {
    match dnf(c) {
        Condition::Or(parts) => parts,
        Condition::Falsity => Vec::new(),
        other => vec![other],
    }
}

fn split_disjunctions(task: &mut Task) {
    let mut actions = Vec::with_capacity(task.actions.len());
    for a in std::mem::take(&mut task.actions) {
        let mut effects = Vec::with_capacity(a.effects.len());
        for e in a.effects {
            for condition in disjuncts(e.condition) {
                effects.push(Effect {
                    parameters: e.parameters.clone(),
                    condition,
                    literal: e.literal.clone(),
                });
            }
        }
        for precondition in disjuncts(a.precondition) {
            actions.push(Action {
                name: a.name.clone(),
                parameters: a.parameters.clone(),
                num_external_parameters: a.num_external_parameters,
                precondition,
                effects: effects.clone(),
                cost: a.cost.clone(),
            });
        }
    }
    task.actions = actions;

    let mut axioms = Vec::with_capacity(task.axioms.len());
    for ax in std::mem::take(&mut task.axioms) {
        for condition in disjuncts(ax.condition) {
            axioms.push(Axiom {
                name: ax.name.clone(),
                parameters: ax.parameters.clone(),
                num_external_parameters: ax.num_external_parameters,
                condition,
            });
        }
    }
    task.axioms = axioms;
}

/// Moves all existential quantifiers of a conjunction to the top: returns the quantified variables and the
/// remaining quantifier-free condition.
fn pull_existentials(c: Condition) -> (Vec<TypedVar>, Condition) {
    match c {
        Condition::Exists(mut vars, body) => {
            let (inner, body) = pull_existentials(*body);
            vars.extend(inner);
            (vars, body)
        }
        Condition::And(parts) => {
            let mut vars = Vec::new();
            let mut bodies = Vec::with_capacity(parts.len());
            for p in parts {
                let (v, b) = pull_existentials(p);
                vars.extend(v);
                bodies.push(b);
            }
            (vars, Condition::And(bodies).simplified())
        }
        other => (Vec::new(), other),
    }
}

fn eliminate_existential_quantifiers(task: &mut Task) {
    for a in &mut task.actions {
        let (vars, pre) = pull_existentials(std::mem::replace(&mut a.precondition, Condition::Truth));
        a.parameters.extend(vars);
        a.precondition = pre;
        for e in &mut a.effects {
            let (vars, cond) = pull_existentials(std::mem::replace(&mut e.condition, Condition::Truth));
            e.parameters.extend(vars);
            e.condition = cond;
        }
    }
    for ax in &mut task.axioms {
        let (vars, cond) = pull_existentials(std::mem::replace(&mut ax.condition, Condition::Truth));
        ax.parameters.extend(vars);
        ax.condition = cond;
    }
}
