//! Construction, in the model, of the ground actions and goals found by the reachability analysis.
//!
//! Names of the analysis refer to the written PDDL and are resolved back to model items through the
//! [`NameTable`] of the writer.

use downward_model::pddl::{Item, NameTable};
use downward_model::*;
use hashbrown::HashSet;

use crate::errors::{GroundingError, Result};
use crate::reachability::task::{Atom, Literal};
use crate::reachability::PropositionalAction;

/// The lifted action and arguments from which a ground action was built.
#[derive(Clone, Debug)]
pub struct GroundOrigin {
    pub ground_action: Sym,
    pub action: Sym,
    pub arguments: Vec<Object>,
}

pub struct Materializer<'a> {
    names: &'a NameTable,
    used_names: HashSet<String>,
}

/// Returns `name`, or `name_i` for the smallest `i` that makes it unused, and records it as used.
pub(crate) fn unique_name(used: &mut HashSet<String>, name: String) -> String {
    let mut candidate = name.clone();
    let mut i = 0;
    while used.contains(&candidate) {
        candidate = format!("{name}_{i}");
        i += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Splits a name of the form `(action a b ...)`.
fn split_name(name: &str) -> Result<(&str, Vec<&str>)> {
    let inner = name.trim().trim_start_matches('(').trim_end_matches(')');
    let mut parts = inner.split_whitespace();
    let head = parts
        .next()
        .ok_or_else(|| GroundingError::NameResolution(name.to_string()))?;
    Ok((head, parts.collect()))
}

impl<'a> Materializer<'a> {
    pub fn new(names: &'a NameTable) -> Self {
        Materializer {
            names,
            used_names: HashSet::new(),
        }
    }

    pub fn object(&self, name: &str) -> Result<&'a Object> {
        match self.names.get_item_named(name)? {
            Item::Object(o) => Ok(o),
            _ => Err(GroundingError::NameResolution(name.to_string())),
        }
    }

    pub fn action(&self, name: &str) -> Result<&'a Sym> {
        match self.names.get_item_named(name)? {
            Item::Action(a) => Ok(a),
            _ => Err(GroundingError::NameResolution(name.to_string())),
        }
    }

    fn fluent(&self, name: &str) -> Result<FluentId> {
        match self.names.get_item_named(name)? {
            Item::Fluent(f) => Ok(*f),
            _ => Err(GroundingError::NameResolution(name.to_string())),
        }
    }

    fn atom(&self, env: &mut Environment, atom: &Atom) -> Result<ExprId> {
        let fluent = self.fluent(atom.predicate.canonical_str())?;
        let mut args = Vec::with_capacity(atom.args.len());
        for a in &atom.args {
            args.push(env.object(self.object(a.canonical_str())?));
        }
        Ok(env.state_variable(fluent, args)?)
    }

    fn state_variable(&self, env: &mut Environment, atom: &Atom) -> Result<StateVariable> {
        let fluent = self.fluent(atom.predicate.canonical_str())?;
        let mut args = Vec::with_capacity(atom.args.len());
        for a in &atom.args {
            args.push(env.object(self.object(a.canonical_str())?));
        }
        Ok(StateVariable::new(fluent, args))
    }

    /// Expression of a ground literal. Equalities between objects are evaluated.
    pub fn literal(&self, env: &mut Environment, lit: &Literal) -> Result<ExprId> {
        if lit.atom.predicate == "=" {
            if let [a, b] = lit.atom.args.as_slice() {
                let equal = self.object(a.canonical_str())?.name() == self.object(b.canonical_str())?.name();
                return Ok(env.bool(equal != lit.negated));
            }
        }
        let e = self.atom(env, &lit.atom)?;
        if lit.negated { Ok(env.not(e)?) } else { Ok(e) }
    }

    fn condition(&self, env: &mut Environment, literals: &[Literal]) -> Result<Option<ExprId>> {
        if literals.is_empty() {
            return Ok(None);
        }
        let mut conjuncts = Vec::with_capacity(literals.len());
        for l in literals {
            conjuncts.push(self.literal(env, l)?);
        }
        Ok(Some(env.and(conjuncts)?))
    }

    /// Builds the model action corresponding to a propositional action and adds it to `problem`.
    ///
    /// The action is named after the lifted action and the names of its arguments in the model, joined
    /// by underscores.
    pub fn add_action(&mut self, problem: &mut Problem, fd_action: &PropositionalAction) -> Result<GroundOrigin> {
        let (schema, args) = split_name(&fd_action.name)?;
        let action = self.action(schema)?.clone();
        let arguments = args
            .iter()
            .map(|a| self.object(a).cloned())
            .collect::<Result<Vec<_>>>()?;

        let mut full_name = vec![action.canonical_str()];
        full_name.extend(arguments.iter().map(|o| o.name().canonical_str()));
        let name = Sym::from(unique_name(&mut self.used_names, full_name.join("_")));

        let env = &mut problem.env;
        let mut ground = Action::new(name.clone(), Vec::new());
        for lit in &fd_action.precondition {
            ground.preconditions.push(self.literal(env, lit)?);
        }
        for (effects, value) in [(&fd_action.add_effects, true), (&fd_action.del_effects, false)] {
            for (cond, atom) in effects {
                let sv = self.state_variable(env, atom)?;
                let value = env.bool(value);
                let mut eff = Effect::assignement(sv, value);
                if let Some(c) = self.condition(env, cond)? {
                    eff = eff.with_condition(c);
                }
                ground.effects.push(eff);
            }
        }
        problem.add_action(ground)?;
        Ok(GroundOrigin {
            ground_action: name,
            action,
            arguments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(split_name("(move a b)").unwrap(), ("move", vec!["a", "b"]));
        assert_eq!(split_name("(reach_goal)").unwrap(), ("reach_goal", vec![]));
        assert!(split_name("()").is_err());

        let mut used = HashSet::new();
        assert_eq!(unique_name(&mut used, "a_b".to_string()), "a_b");
        assert_eq!(unique_name(&mut used, "a_b".to_string()), "a_b_0");
        assert_eq!(unique_name(&mut used, "a_b".to_string()), "a_b_1");
        assert_eq!(unique_name(&mut used, "a_b_0".to_string()), "a_b_0_0");
    }
}
