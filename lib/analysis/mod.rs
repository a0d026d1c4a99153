//! Configurable program analysis over event-driven tasks.
//!
//! Analyses are stacked by wrapping. The standard chain, outermost first, is
//!
//! `Stats(Abstraction(Graph(Control(Label(Ssa(Data))))))`
//!
//! where the data analysis is either `SymemAnalysis` or `ValueAnalysis`.
//! `reachability` computes the fixpoint of any such chain, and `verify`
//! assembles the standard chain from an `AnalysisConfig`.

mod abstraction;
mod config;
mod context;
pub mod control;
pub mod graph;
mod label;
mod operators;
mod program_analysis;
mod reachability;
mod refiner;
mod ssa;
mod state_set;
mod stats;
mod symem;
mod value;

pub use self::abstraction::*;
pub use self::config::*;
pub use self::context::*;
pub use self::control::ControlAnalysis;
pub use self::graph::{AccessibilityRelation, ErrorWitness, GraphAnalysis, Mock};
pub use self::label::*;
pub use self::operators::*;
pub use self::program_analysis::*;
pub use self::reachability::*;
pub use self::refiner::*;
pub use self::ssa::*;
pub use self::state_set::*;
pub use self::stats::*;
pub use self::symem::SymemAnalysis;
pub use self::value::ValueAnalysis;
