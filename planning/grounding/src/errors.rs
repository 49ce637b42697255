use downward_model::{Feature, Message};
use thiserror::Error;

use crate::CompilationKind;

/// Hint given when the reachability analysis introduced derived predicates.
pub const AXIOMS_MSG: &str = "Grounding this problem introduces axioms. Does the problem use existential \
quantification and negation that corresponds to universal quantification (in negation normal form)?";

#[derive(Error, Debug)]
pub enum GroundingError {
    #[error("unsupported compilation kind: {0}")]
    UnsupportedCompilation(CompilationKind),
    #[error("{0}")]
    UnsupportedProblemFeature(&'static str),
    #[error("unsupported problem features: {}", .0.iter().map(|f| f.name()).collect::<Vec<_>>().join(", "))]
    UnsupportedProblemKind(Vec<Feature>),
    #[error("cannot resolve `{0}` in the original problem")]
    NameResolution(String),
    #[error("unsupported task: {0}")]
    UnsupportedTask(String),
    #[error(transparent)]
    Model(#[from] Message),
}

impl From<downward_model::pddl::writer::UnknownName> for GroundingError {
    fn from(value: downward_model::pddl::writer::UnknownName) -> Self {
        GroundingError::NameResolution(value.0)
    }
}

pub type Result<T> = std::result::Result<T, GroundingError>;
