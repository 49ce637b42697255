mod actions;
mod effects;
mod env;
pub mod errors;
mod expressions;
mod fluents;
pub mod kind;
mod metrics;
mod objects;
mod params;
mod plan;
pub mod pddl;
mod problem;
mod simplify;
mod sym;
mod types;
pub(crate) mod utils;
pub mod validate;

use std::fmt::{Debug, Display};

pub use actions::*;
pub use effects::*;
pub use env::*;
pub use expressions::*;
pub use fluents::*;
pub use kind::{Feature, ProblemKind};
pub use metrics::*;
pub use objects::*;
pub use params::*;
pub use plan::*;
pub use problem::*;
pub use simplify::*;
pub use sym::*;
pub use types::*;

pub use errors::Message;
use errors::{Span, Spanned};

pub type Res<T> = std::result::Result<T, Message>;
