//! Invocation of the Fast Downward planner on problems of the model, optionally grounded beforehand.

pub mod command;
pub mod config;
pub mod errors;
pub mod output;
pub mod solve;
pub mod status;

pub use config::{DownwardConfig, LogLevel};
pub use errors::{PlannerError, Result};
pub use solve::{FastDownward, PlanResult};
pub use status::ResultStatus;
