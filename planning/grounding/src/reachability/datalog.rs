//! Encoding of the delete relaxation of a normalized task as a Datalog program, and computation of its
//! minimal model by semi-naive bottom-up evaluation.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

use downward_model::TOP_TYPE;
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use crate::reachability::task::*;

/// Predicate of the program. Actions and axioms are identified by their index in the task since
/// normalization may produce several of them with the same name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Predicate {
    Named(Name),
    Action(usize),
    Axiom(usize),
    GoalReachable,
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Named(n) => write!(f, "{n}"),
            Predicate::Action(i) => write!(f, "@action-{i}"),
            Predicate::Axiom(i) => write!(f, "@axiom-{i}"),
            Predicate::GoalReachable => write!(f, "@goal-reachable"),
        }
    }
}

type ObjId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Term {
    Var(usize),
    Const(ObjId),
}

#[derive(Clone, Debug)]
struct RuleAtom {
    predicate: Predicate,
    args: Vec<Term>,
}

#[derive(Clone, Debug)]
struct Rule {
    head: RuleAtom,
    body: Vec<RuleAtom>,
    num_vars: usize,
}

/// A ground atom of the minimal model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroundAtom {
    pub predicate: Predicate,
    pub args: Vec<Name>,
}

impl Display for GroundAtom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.predicate, self.args.iter().format(", "))
    }
}

#[derive(Default)]
pub struct Program {
    objects: Vec<Name>,
    object_ids: HashMap<Name, ObjId>,
    facts: Vec<(Predicate, Vec<ObjId>)>,
    rules: Vec<Rule>,
}

/// Body of the rule encoding a condition, with type atoms for the given variables.
/// Returns `None` if the condition can never hold. Negative literals are ignored.
fn condition_to_rule_body(parameters: &[TypedVar], condition: &Condition) -> Option<Vec<Atom>> {
    let mut body: Vec<Atom> = parameters.iter().map(TypedVar::type_atom).collect();
    match condition {
        Condition::Falsity => return None,
        Condition::Truth => {}
        Condition::Literal(l) => {
            if !l.negated {
                body.push(l.atom.clone())
            }
        }
        Condition::And(parts) => {
            for p in parts {
                match p {
                    Condition::Falsity => return None,
                    Condition::Literal(l) if !l.negated => body.push(l.atom.clone()),
                    _ => {}
                }
            }
        }
        _ => {}
    }
    Some(body)
}

fn action_atom(index: usize, action: &Action) -> (Predicate, Vec<Name>) {
    (
        Predicate::Action(index),
        action.parameters.iter().map(|p| p.name.clone()).collect(),
    )
}

fn named(atoms: Vec<Atom>) -> Vec<(Predicate, Vec<Name>)> {
    atoms.into_iter().map(|a| (Predicate::Named(a.predicate), a.args)).collect()
}

impl Program {
    pub fn translate(task: &Task) -> Program {
        let mut prog = Program::default();
        for fact in &task.init {
            let args = fact.args.iter().map(|a| prog.object_id(a)).collect();
            prog.facts.push((Predicate::Named(fact.predicate.clone()), args));
        }
        for (i, action) in task.actions.iter().enumerate() {
            let Some(body) = condition_to_rule_body(&action.parameters, &action.precondition) else {
                continue;
            };
            let head = action_atom(i, action);
            prog.add_rule(named(body), head.clone());
            for eff in &action.effects {
                if eff.literal.negated {
                    continue;
                }
                let Some(cond) = condition_to_rule_body(&eff.parameters, &eff.condition) else {
                    continue;
                };
                let mut body = vec![head.clone()];
                body.extend(named(cond));
                let atom = &eff.literal.atom;
                prog.add_rule(body, (Predicate::Named(atom.predicate.clone()), atom.args.clone()));
            }
        }
        for (j, axiom) in task.axioms.iter().enumerate() {
            let Some(body) = condition_to_rule_body(&axiom.parameters, &axiom.condition) else {
                continue;
            };
            let params: Vec<Name> = axiom.parameters.iter().map(|p| p.name.clone()).collect();
            let app = (Predicate::Axiom(j), params.clone());
            prog.add_rule(named(body), app.clone());
            let external = params[..axiom.num_external_parameters].to_vec();
            prog.add_rule(vec![app], (Predicate::Named(axiom.name.clone()), external));
        }
        if let Some(body) = condition_to_rule_body(&[], &task.goal) {
            prog.add_rule(named(body), (Predicate::GoalReachable, Vec::new()));
        }
        tracing::debug!(num_facts = prog.facts.len(), num_rules = prog.rules.len(), "datalog program");
        prog
    }

    fn object_id(&mut self, name: &Name) -> ObjId {
        if let Some(&id) = self.object_ids.get(name) {
            return id;
        }
        let id = self.objects.len() as ObjId;
        self.objects.push(name.clone());
        self.object_ids.insert(name.clone(), id);
        id
    }

    fn term(&mut self, name: &Name, vars: &mut Vec<Name>) -> Term {
        if is_variable(name) {
            let index = match vars.iter().position(|v| v == name) {
                Some(i) => i,
                None => {
                    vars.push(name.clone());
                    vars.len() - 1
                }
            };
            Term::Var(index)
        } else {
            Term::Const(self.object_id(name))
        }
    }

    fn add_rule(&mut self, body: Vec<(Predicate, Vec<Name>)>, head: (Predicate, Vec<Name>)) {
        let mut vars: Vec<Name> = Vec::new();
        let mut rule_body = Vec::with_capacity(body.len());
        for (predicate, args) in body {
            let args = args.iter().map(|a| self.term(a, &mut vars)).collect();
            rule_body.push(RuleAtom { predicate, args });
        }
        let num_body_vars = vars.len();
        let head_args: Vec<Term> = head.1.iter().map(|a| self.term(a, &mut vars)).collect();
        // variables of the head that do not appear in the body range over all objects
        let object_type = Name::from(TOP_TYPE);
        for v in num_body_vars..vars.len() {
            rule_body.push(RuleAtom {
                predicate: Predicate::Named(type_predicate(&object_type)),
                args: vec![Term::Var(v)],
            });
        }
        self.rules.push(Rule {
            head: RuleAtom {
                predicate: head.0,
                args: head_args,
            },
            body: rule_body,
            num_vars: vars.len(),
        });
    }

    /// Computes the minimal model of the program. Atoms are returned in the order in which they were derived.
    pub fn compute_model(&self) -> Vec<GroundAtom> {
        let _span = tracing::span!(tracing::Level::TRACE, "fixpoint").entered();
        let mut triggers: HashMap<&Predicate, Vec<(usize, usize)>> = HashMap::new();
        for (r, rule) in self.rules.iter().enumerate() {
            for (pos, atom) in rule.body.iter().enumerate() {
                triggers.entry(&atom.predicate).or_default().push((r, pos));
            }
        }
        let mut known: HashSet<(Predicate, Vec<ObjId>)> = HashSet::new();
        let mut queue: VecDeque<(Predicate, Vec<ObjId>)> = VecDeque::new();
        let mut derived_order = Vec::new();
        let mut enqueue = |atom: (Predicate, Vec<ObjId>), queue: &mut VecDeque<_>| {
            if known.insert(atom.clone()) {
                derived_order.push(atom.clone());
                queue.push_back(atom);
            }
        };

        for fact in &self.facts {
            enqueue(fact.clone(), &mut queue);
        }
        for rule in self.rules.iter().filter(|r| r.body.is_empty()) {
            let mut heads = Vec::new();
            rule.join(usize::MAX, 0, &mut vec![None; rule.num_vars], &HashMap::new(), &mut heads);
            for args in heads {
                enqueue((rule.head.predicate.clone(), args), &mut queue);
            }
        }

        let mut processed: HashMap<Predicate, Vec<Vec<ObjId>>> = HashMap::new();
        while let Some((predicate, args)) = queue.pop_front() {
            processed.entry(predicate.clone()).or_default().push(args.clone());
            let Some(rules) = triggers.get(&predicate) else {
                continue;
            };
            let mut heads = Vec::new();
            for &(r, pos) in rules {
                let rule = &self.rules[r];
                let mut binding = vec![None; rule.num_vars];
                let mut trail = Vec::new();
                if unify(&rule.body[pos].args, &args, &mut binding, &mut trail) {
                    rule.join(pos, 0, &mut binding, &processed, &mut heads);
                    for args in heads.drain(..) {
                        enqueue((rule.head.predicate.clone(), args), &mut queue);
                    }
                }
            }
        }
        tracing::debug!(num_atoms = derived_order.len(), "minimal model");

        derived_order
            .into_iter()
            .map(|(predicate, args)| GroundAtom {
                predicate,
                args: args.into_iter().map(|o| self.objects[o as usize].clone()).collect(),
            })
            .collect()
    }
}

/// Binds the variables of `terms` so that they match `values`. Newly bound variables are recorded in `trail`.
fn unify(terms: &[Term], values: &[ObjId], binding: &mut [Option<ObjId>], trail: &mut Vec<usize>) -> bool {
    if terms.len() != values.len() {
        return false;
    }
    for (t, &v) in terms.iter().zip(values) {
        match *t {
            Term::Const(c) => {
                if c != v {
                    return false;
                }
            }
            Term::Var(i) => match binding[i] {
                Some(b) if b != v => return false,
                Some(_) => {}
                None => {
                    binding[i] = Some(v);
                    trail.push(i);
                }
            },
        }
    }
    true
}

impl Rule {
    /// Extends the binding with atoms already processed for every body atom from `i` onwards (except
    /// `skip`), collecting the arguments of the corresponding heads.
    fn join(
        &self,
        skip: usize,
        i: usize,
        binding: &mut [Option<ObjId>],
        processed: &HashMap<Predicate, Vec<Vec<ObjId>>>,
        heads: &mut Vec<Vec<ObjId>>,
    ) {
        if i == self.body.len() {
            let args: Option<Vec<ObjId>> = self
                .head
                .args
                .iter()
                .map(|t| match *t {
                    Term::Const(c) => Some(c),
                    Term::Var(v) => binding[v],
                })
                .collect();
            if let Some(args) = args {
                heads.push(args);
            }
            return;
        }
        if i == skip {
            return self.join(skip, i + 1, binding, processed, heads);
        }
        let Some(candidates) = processed.get(&self.body[i].predicate) else {
            return;
        };
        let mut trail = Vec::new();
        for values in candidates {
            if unify(&self.body[i].args, values, binding, &mut trail) {
                self.join(skip, i + 1, binding, processed, heads);
            }
            for v in trail.drain(..) {
                binding[v] = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reachability::{normalize::normalize, parse::parse_task};

    const DOMAIN: &str = "
(define (domain graph)
  (:requirements :typing)
  (:types node)
  (:predicates (edge ?a ?b - node) (at ?n - node) (visited ?n - node))
  (:action move
    :parameters (?from ?to - node)
    :precondition (and (at ?from) (edge ?from ?to))
    :effect (and (not (at ?from)) (at ?to) (visited ?to))))";

    const PROBLEM: &str = "
(define (problem line) (:domain graph)
  (:objects n1 n2 n3 n4 - node)
  (:init (at n1) (edge n1 n2) (edge n2 n3) (edge n4 n1))
  (:goal (and (visited n3))))";

    fn model(problem: &str) -> Vec<GroundAtom> {
        let mut task = parse_task(DOMAIN, problem).unwrap();
        normalize(&mut task);
        Program::translate(&task).compute_model()
    }

    fn has(model: &[GroundAtom], predicate: &str, args: &[&str]) -> bool {
        model.iter().any(|a| {
            a.predicate == Predicate::Named(Name::from(predicate))
                && a.args.iter().map(|a| a.canonical_str()).eq(args.iter().copied())
        })
    }

    #[test]
    fn reachable_atoms() {
        let m = model(PROBLEM);
        assert!(has(&m, "at", &["n2"]));
        assert!(has(&m, "at", &["n3"]));
        assert!(has(&m, "visited", &["n3"]));
        assert!(!has(&m, "at", &["n4"]));
        assert!(m.iter().any(|a| a.predicate == Predicate::GoalReachable));
        let moves: Vec<_> = m.iter().filter(|a| matches!(a.predicate, Predicate::Action(_))).collect();
        assert_eq!(moves.len(), 2);
        // the model has no duplicates
        assert_eq!(m.iter().unique().count(), m.len());
    }

    #[test]
    fn unreachable_goal() {
        let m = model(&PROBLEM.replace("(visited n3)", "(visited n4)"));
        assert!(!m.iter().any(|a| a.predicate == Predicate::GoalReachable));
    }
}
