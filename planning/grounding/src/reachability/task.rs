//! Internal representation of a planning task, as read from PDDL, on which the reachability analysis works.
//!
//! Arguments of atoms are plain names: variables are distinguished by their leading `?`.

use std::fmt::{Display, Formatter};

use downward_model::Sym;
use itertools::Itertools;

pub type Name = Sym;

pub fn is_variable(name: &Name) -> bool {
    name.canonical_str().starts_with('?')
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom {
    pub predicate: Name,
    pub args: Vec<Name>,
}

impl Atom {
    pub fn new(predicate: impl Into<Name>, args: Vec<Name>) -> Self {
        Atom {
            predicate: predicate.into(),
            args,
        }
    }

    /// Replaces the variables bound in `mapping`.
    pub fn rename(&self, mapping: &hashbrown::HashMap<Name, Name>) -> Atom {
        Atom {
            predicate: self.predicate.clone(),
            args: self
                .args
                .iter()
                .map(|a| mapping.get(a).cloned().unwrap_or_else(|| a.clone()))
                .collect(),
        }
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.predicate, self.args.iter().format(", "))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    pub atom: Atom,
    pub negated: bool,
}

impl Literal {
    pub fn pos(atom: Atom) -> Self {
        Literal { atom, negated: false }
    }
    pub fn neg(atom: Atom) -> Self {
        Literal { atom, negated: true }
    }
    pub fn negate(&self) -> Self {
        Literal {
            atom: self.atom.clone(),
            negated: !self.negated,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "not {}", self.atom)
        } else {
            write!(f, "{}", self.atom)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedVar {
    pub name: Name,
    pub tpe: Name,
}

impl TypedVar {
    pub fn new(name: impl Into<Name>, tpe: impl Into<Name>) -> Self {
        TypedVar {
            name: name.into(),
            tpe: tpe.into(),
        }
    }

    /// Atom stating that the variable is of its declared type.
    pub fn type_atom(&self) -> Atom {
        Atom::new(type_predicate(&self.tpe), vec![self.name.clone()])
    }
}

/// Name of the predicate holding for all objects of a type.
pub fn type_predicate(tpe: &Name) -> Name {
    Name::from(format!("type@{}", tpe.canonical_str()))
}

/// A first-order condition in negation normal form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Truth,
    Falsity,
    Literal(Literal),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Exists(Vec<TypedVar>, Box<Condition>),
    Forall(Vec<TypedVar>, Box<Condition>),
}

impl Condition {
    pub fn negate(&self) -> Condition {
        match self {
            Condition::Truth => Condition::Falsity,
            Condition::Falsity => Condition::Truth,
            Condition::Literal(l) => Condition::Literal(l.negate()),
            Condition::And(parts) => Condition::Or(parts.iter().map(Condition::negate).collect()),
            Condition::Or(parts) => Condition::And(parts.iter().map(Condition::negate).collect()),
            Condition::Exists(vars, body) => Condition::Forall(vars.clone(), Box::new(body.negate())),
            Condition::Forall(vars, body) => Condition::Exists(vars.clone(), Box::new(body.negate())),
        }
    }

    /// Flattens nested conjunctions and disjunctions and removes their neutral elements.
    pub fn simplified(self) -> Condition {
        match self {
            Condition::And(parts) => {
                let mut res = Vec::with_capacity(parts.len());
                for p in parts {
                    match p.simplified() {
                        Condition::Truth => {}
                        Condition::Falsity => return Condition::Falsity,
                        Condition::And(inner) => res.extend(inner),
                        other => res.push(other),
                    }
                }
                match res.len() {
                    0 => Condition::Truth,
                    1 => res.remove(0),
                    _ => Condition::And(res),
                }
            }
            Condition::Or(parts) => {
                let mut res = Vec::with_capacity(parts.len());
                for p in parts {
                    match p.simplified() {
                        Condition::Falsity => {}
                        Condition::Truth => return Condition::Truth,
                        Condition::Or(inner) => res.extend(inner),
                        other => res.push(other),
                    }
                }
                match res.len() {
                    0 => Condition::Falsity,
                    1 => res.remove(0),
                    _ => Condition::Or(res),
                }
            }
            Condition::Exists(vars, body) => match body.simplified() {
                body if vars.is_empty() => body,
                body => Condition::Exists(vars, Box::new(body)),
            },
            Condition::Forall(vars, body) => match body.simplified() {
                body if vars.is_empty() => body,
                body => Condition::Forall(vars, Box::new(body)),
            },
            c => c,
        }
    }

    /// Variables appearing free in the condition, in order of first appearance.
    pub fn free_variables(&self) -> Vec<Name> {
        let mut out = Vec::new();
        self.collect_free(&mut Vec::new(), &mut out);
        out
    }

    fn collect_free(&self, bound: &mut Vec<Name>, out: &mut Vec<Name>) {
        match self {
            Condition::Truth | Condition::Falsity => {}
            Condition::Literal(l) => {
                for a in &l.atom.args {
                    if is_variable(a) && !bound.contains(a) && !out.contains(a) {
                        out.push(a.clone())
                    }
                }
            }
            Condition::And(parts) | Condition::Or(parts) => {
                for p in parts {
                    p.collect_free(bound, out)
                }
            }
            Condition::Exists(vars, body) | Condition::Forall(vars, body) => {
                let len = bound.len();
                bound.extend(vars.iter().map(|v| v.name.clone()));
                body.collect_free(bound, out);
                bound.truncate(len);
            }
        }
    }

    /// Literals of a condition that is a literal or a conjunction of literals.
    pub fn literals(&self) -> Option<Vec<&Literal>> {
        match self {
            Condition::Truth => Some(Vec::new()),
            Condition::Literal(l) => Some(vec![l]),
            Condition::And(parts) => parts
                .iter()
                .map(|p| match p {
                    Condition::Literal(l) => Some(l),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Truth => write!(f, "true"),
            Condition::Falsity => write!(f, "false"),
            Condition::Literal(l) => write!(f, "{l}"),
            Condition::And(parts) => write!(f, "and({})", parts.iter().format(", ")),
            Condition::Or(parts) => write!(f, "or({})", parts.iter().format(", ")),
            Condition::Exists(vars, body) => {
                write!(f, "exists({}). {body}", vars.iter().map(|v| &v.name).format(", "))
            }
            Condition::Forall(vars, body) => {
                write!(f, "forall({}). {body}", vars.iter().map(|v| &v.name).format(", "))
            }
        }
    }
}

/// A simple effect: for all values of `parameters` such that `condition` holds, the literal is made true.
#[derive(Clone, Debug)]
pub struct Effect {
    pub parameters: Vec<TypedVar>,
    pub condition: Condition,
    pub literal: Literal,
}

/// Increase of the total cost by an action.
#[derive(Clone, Debug)]
pub enum Cost {
    Constant(i64),
    /// A numeric fluent whose initial value gives the cost.
    Fluent(Atom),
}

#[derive(Clone, Debug)]
pub struct Action {
    pub name: Name,
    /// Parameters of the action, followed by the variables introduced by the normalization.
    pub parameters: Vec<TypedVar>,
    /// Number of parameters that come from the action declaration.
    pub num_external_parameters: usize,
    pub precondition: Condition,
    pub effects: Vec<Effect>,
    pub cost: Option<Cost>,
}

/// A derived predicate, introduced by the normalization.
#[derive(Clone, Debug)]
pub struct Axiom {
    pub name: Name,
    pub parameters: Vec<TypedVar>,
    pub num_external_parameters: usize,
    pub condition: Condition,
}

#[derive(Clone, Debug)]
pub struct Task {
    pub domain_name: Name,
    pub problem_name: Name,
    /// For each type, the type itself followed by all its ancestors.
    pub supertypes: hashbrown::HashMap<Name, Vec<Name>>,
    pub objects: Vec<TypedVar>,
    pub predicates: Vec<Name>,
    pub init: Vec<Atom>,
    pub init_assignments: hashbrown::HashMap<Atom, i64>,
    pub goal: Condition,
    pub actions: Vec<Action>,
    pub axioms: Vec<Axiom>,
    pub use_min_cost_metric: bool,
}

impl Task {
    /// Declares a new derived predicate with the given parameters and definition. Returns its name.
    pub fn add_axiom(&mut self, parameters: Vec<TypedVar>, condition: Condition) -> Name {
        let name = Name::from(format!("new-axiom@{}", self.axioms.len()));
        self.axioms.push(Axiom {
            name: name.clone(),
            num_external_parameters: parameters.len(),
            parameters,
            condition,
        });
        name
    }

    /// Objects of each type, including the objects of its subtypes.
    pub fn objects_by_type(&self) -> hashbrown::HashMap<Name, Vec<Name>> {
        let mut res: hashbrown::HashMap<Name, Vec<Name>> = hashbrown::HashMap::new();
        for o in &self.objects {
            for tpe in self.supertypes_of(&o.tpe) {
                res.entry(tpe.clone()).or_default().push(o.name.clone());
            }
        }
        res
    }

    pub fn supertypes_of<'a>(&'a self, tpe: &'a Name) -> &'a [Name] {
        self.supertypes
            .get(tpe)
            .map(|v| v.as_slice())
            .unwrap_or(std::slice::from_ref(tpe))
    }

    /// Predicates whose atoms may change: those appearing in some effect and the derived ones.
    pub fn fluent_predicates(&self) -> hashbrown::HashSet<Name> {
        let mut res: hashbrown::HashSet<Name> = self
            .actions
            .iter()
            .flat_map(|a| a.effects.iter().map(|e| e.literal.atom.predicate.clone()))
            .collect();
        res.extend(self.axioms.iter().map(|ax| ax.name.clone()));
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(p: &str, args: &[&str]) -> Condition {
        Condition::Literal(Literal::pos(Atom::new(p, args.iter().map(|&a| Name::from(a)).collect())))
    }

    #[test]
    fn negation_normal_form() {
        let c = Condition::Forall(
            vec![TypedVar::new("?x", "object")],
            Box::new(Condition::And(vec![lit("p", &["?x"]), lit("q", &["?x", "?y"])])),
        );
        let n = c.negate();
        assert_eq!(n.to_string(), "exists(?x). or(not p(?x), not q(?x, ?y))");
        assert_eq!(n.free_variables(), vec![Name::from("?y")]);
    }

    #[test]
    fn simplification() {
        let c = Condition::And(vec![
            Condition::Truth,
            Condition::And(vec![lit("p", &[]), lit("q", &[])]),
            Condition::Or(vec![Condition::Falsity, lit("r", &[])]),
        ]);
        assert_eq!(c.simplified().to_string(), "and(p(), q(), r())");
        let c = Condition::Or(vec![lit("p", &[]), Condition::Truth]);
        assert_eq!(c.simplified(), Condition::Truth);
        assert_eq!(Condition::And(vec![]).simplified(), Condition::Truth);
    }
}
