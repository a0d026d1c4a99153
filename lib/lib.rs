//! Kestrel: configurable program analysis for event-driven programs.
//!
//! Kestrel verifies block-structured, event-driven programs (think Scratch
//! projects) against behavioral properties. Orthogonal analyses are stacked
//! into one composite analysis whose fixpoint proves or refutes the
//! reachability of property violations.
//!
//! # Layout
//!
//! * `task` holds the program being verified: actors, scripts, methods and
//! their transition relations over typed statements.
//! * `lattice` provides the lattice and abstract domain contracts, and the
//! concrete lattices the analyses are built from.
//! * `solver` answers feasibility queries over formulas.
//! * `analysis` holds the composable analyses, the state sets and operators
//! of the reachability algorithm, the refiner and the driver.
//! * `graph` is a small directed graph used for transition relations and for
//! the accessibility relation between reached states.
//!
//! The usual entry point is `analysis::verify`, which assembles the standard
//! chain of analyses for a `task::Task` and runs it to a verdict.

pub mod analysis;
pub mod graph;
pub mod lattice;
pub mod solver;
pub mod task;
#[cfg(test)]
mod tests;

#[cfg(not(feature = "thread_safe"))]
pub use std::rc::Rc as RC;
#[cfg(feature = "thread_safe")]
pub use std::sync::Arc as RC;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
    #[error("Actor not found: {0}")]
    ActorNotFound(String),
    #[error("{0}")]
    Custom(String),
    #[error("Graph edge not found: {0}, {1}")]
    GraphEdgeNotFound(usize, usize),
    #[error("Graph vertex not found: {0}")]
    GraphVertexNotFound(usize),
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Operation not found: {0}")]
    OperationNotFound(usize),
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Script not found: {0}")]
    ScriptNotFound(usize),
    #[error("Type error: {0}")]
    Type(String),
    #[error("Not implemented: {0}")]
    Unimplemented(String),
    #[error("Not supported for this domain: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns true if analysis stopped at a feature that is not modelled.
    ///
    /// A run that ends with such an error has not proven anything, and
    /// callers should treat it as inconclusive.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Error::Unimplemented(_))
    }

    /// Returns true if the error indicates an internal inconsistency of the
    /// model or the analysis, as opposed to a property of the program.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::InvariantViolation(_))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error::Custom(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}
