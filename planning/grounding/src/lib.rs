//! Grounding of lifted planning problems with the reachability analysis of the Fast Downward translator.
//!
//! The entry points are the two [`Compiler`]s: [`FastDownwardGrounder`] builds the ground problem from the
//! full instantiation of the translator, while [`FastDownwardReachabilityGrounder`] only uses the reachable
//! parameter bindings. Both return a [`PlanLifter`] mapping plans of the ground problem back to the
//! input problem.

pub mod compiler;
pub mod errors;
pub mod goal;
pub mod ground;
pub mod kind;
pub mod materialize;
pub mod metric;
pub mod reachability;
pub mod trace;

pub use compiler::{Compiler, CompilerResult, FastDownwardGrounder, FastDownwardReachabilityGrounder, compiler_by_name};
pub use errors::{GroundingError, Result};
pub use kind::CompilationKind;
pub use trace::{PlanLifter, TraceBackMap, TraceEntry};
