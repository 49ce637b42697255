//! Reachability analysis of a PDDL task, in the style of the Fast Downward translator.
//!
//! The task is normalized, its delete relaxation is encoded as a Datalog program whose minimal model
//! over-approximates the reachable atoms and action instances, and the actions and axioms are then
//! instantiated for all bindings of the model.

pub mod datalog;
pub mod instantiate;
pub mod normalize;
pub mod parse;
pub mod task;

use hashbrown::HashSet;

use crate::errors::Result;
use datalog::{GroundAtom, Predicate, Program};
pub use instantiate::{Explored, PropositionalAction, PropositionalAxiom};
use task::{Name, Task};

/// Parses and normalizes the task, and computes the minimal model of its relaxation.
fn model(domain: &str, problem: &str) -> Result<(Task, Vec<GroundAtom>)> {
    let mut task = parse::parse_task(domain, problem)?;
    normalize::normalize(&mut task);
    let model = Program::translate(&task).compute_model();
    Ok((task, model))
}

/// Computes all ground actions, axioms and goals of the task that may be relevant.
pub fn explore(domain: &str, problem: &str) -> Result<Explored> {
    let _span = tracing::debug_span!("explore").entered();
    let (task, model) = model(domain, problem)?;
    instantiate::instantiate(&task, &model)
}

/// An action schema together with values for its declared parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionBinding {
    pub action: Name,
    pub arguments: Vec<Name>,
}

/// Bindings of the action schemas that are reachable in the relaxation of the task, without duplicates.
pub fn reachable_bindings(domain: &str, problem: &str) -> Result<Vec<ActionBinding>> {
    let _span = tracing::debug_span!("reachable_bindings").entered();
    let (task, model) = model(domain, problem)?;
    let mut seen = HashSet::new();
    let mut bindings = Vec::new();
    for atom in model {
        if let Predicate::Action(i) = atom.predicate {
            let action = &task.actions[i];
            let binding = ActionBinding {
                action: action.name.clone(),
                arguments: atom.args[..action.num_external_parameters].to_vec(),
            };
            if seen.insert(binding.clone()) {
                bindings.push(binding);
            }
        }
    }
    tracing::debug!(num_bindings = bindings.len());
    Ok(bindings)
}
