use downward_grounding::GroundingError;
use downward_model::Message;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unable to run {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },
    /// The problem could not be written or the plan produced could not be read.
    #[error(transparent)]
    Plan(#[from] Message),
    #[error(transparent)]
    Grounding(#[from] GroundingError),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
