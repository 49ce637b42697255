//! Instantiation of lifted actions for explicit bindings of their parameters, directly in the model.

use downward_model::*;
use hashbrown::HashSet;
use itertools::Itertools;

use crate::errors::{GroundingError, Result};
use crate::materialize::{GroundOrigin, unique_name};

/// Grounds the actions of a lifted problem into a target problem sharing its environment (typically a
/// clone of the lifted problem without actions).
pub struct BindingGrounder<'a> {
    lifted: &'a Problem,
    simplifier: Simplifier,
    used_names: HashSet<String>,
}

impl<'a> BindingGrounder<'a> {
    pub fn new(lifted: &'a Problem) -> Self {
        BindingGrounder {
            lifted,
            simplifier: Simplifier::new(lifted),
            used_names: HashSet::new(),
        }
    }

    fn simplify(&self, env: &mut Environment, e: ExprId, subst: &Substitution) -> Result<ExprId> {
        let e = env.substitute(e, subst)?;
        Ok(self.simplifier.simplify(env, e)?)
    }

    /// Adds to `target` the instance of `action` for the given arguments.
    /// Returns `None` if its preconditions can never hold.
    pub fn ground(&mut self, target: &mut Problem, action: &Sym, arguments: &[Object]) -> Result<Option<GroundOrigin>> {
        let schema = self.lifted.action(action)?;
        if schema.parameters.len() != arguments.len() {
            return Err(GroundingError::Model(Message::error(format!(
                "action {action} expects {} arguments but got {}",
                schema.parameters.len(),
                arguments.len()
            ))));
        }
        let env = &mut target.env;
        let mut subst = Substitution::new();
        for (p, o) in schema.parameters.iter().zip(arguments) {
            subst.insert(p.name.clone(), env.object(o));
        }

        let mut preconditions = Vec::with_capacity(schema.preconditions.len());
        for &c in &schema.preconditions {
            let c = self.simplify(env, c, &subst)?;
            match (&*env / c).expr() {
                Expr::Bool(true) => {}
                Expr::Bool(false) => return Ok(None),
                _ => preconditions.push(c),
            }
        }

        let mut effects = Vec::with_capacity(schema.effects.len());
        for eff in &schema.effects {
            let mut domains = Vec::with_capacity(eff.forall.len());
            for v in &eff.forall {
                let tpe = v
                    .tpe
                    .as_user_type()
                    .ok_or_else(|| Message::error(format!("quantified variable {v:?} is not an object")))?;
                domains.push(self.lifted.env.objects.of_type(tpe).cloned().collect_vec());
            }
            let bindings: Vec<Vec<Object>> = if domains.is_empty() {
                vec![Vec::new()]
            } else if domains.iter().any(|d| d.is_empty()) {
                Vec::new()
            } else {
                domains.iter().map(|d| d.iter().cloned()).multi_cartesian_product().collect()
            };
            for values in bindings {
                let mut subst = subst.clone();
                for (v, o) in eff.forall.iter().zip(&values) {
                    subst.insert(v.name.clone(), env.object(o));
                }
                let condition = match eff.condition {
                    Some(c) => {
                        let c = self.simplify(env, c, &subst)?;
                        match (&*env / c).expr() {
                            Expr::Bool(true) => None,
                            Expr::Bool(false) => continue,
                            _ => Some(c),
                        }
                    }
                    None => None,
                };
                let state_variable = eff.state_variable.substitute(env, &subst)?;
                let value = self.simplify(env, eff.operation.value(), &subst)?;
                effects.push(Effect {
                    forall: Vec::new(),
                    condition,
                    state_variable,
                    operation: eff.operation.with_value(value),
                });
            }
        }

        let mut full_name = vec![schema.name.canonical_str()];
        full_name.extend(arguments.iter().map(|o| o.name().canonical_str()));
        let name = Sym::from(unique_name(&mut self.used_names, full_name.join("_")));
        let mut ground = Action::new(name.clone(), Vec::new());
        ground.preconditions = preconditions;
        ground.effects = effects;
        target.add_action(ground)?;
        Ok(Some(GroundOrigin {
            ground_action: name,
            action: schema.name.clone(),
            arguments: arguments.to_vec(),
        }))
    }
}
