//! Feasibility queries over formulas.
//!
//! A `Solver` answers whether a `Formula` is satisfiable. Any failure to
//! decide, whether from an incomplete search, a crashed solver process or
//! unparsable output, is reported as `SatResult::Unknown`, never as `Unsat`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lattice::{Formula, Model};
use crate::{Error, RC};

mod enumeration;
mod z3;

pub use self::enumeration::EnumerationSolver;
pub use self::z3::Z3Solver;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

impl fmt::Display for SatResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SatResult::Sat => write!(f, "sat"),
            SatResult::Unsat => write!(f, "unsat"),
            SatResult::Unknown => write!(f, "unknown"),
        }
    }
}

pub trait Solver: fmt::Debug {
    fn check(&self, formula: &Formula) -> Result<SatResult, Error>;

    /// A satisfying assignment of `formula`. `None` if the formula is not
    /// known to be satisfiable, or the solver cannot produce models.
    fn model(&self, _formula: &Formula) -> Result<Option<Model>, Error> {
        Ok(None)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverKind {
    Enumeration,
    Z3,
}

/// Which solver to use and how to set it up.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SolverOptions {
    kind: SolverKind,
    z3_path: String,
    integer_range: u32,
}

impl SolverOptions {
    pub fn new() -> SolverOptions {
        SolverOptions::default()
    }

    pub fn kind(&self) -> SolverKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: SolverKind) {
        self.kind = kind;
    }

    /// The z3 executable, looked up in `PATH` unless absolute.
    pub fn z3_path(&self) -> &str {
        &self.z3_path
    }

    pub fn set_z3_path<S: Into<String>>(&mut self, z3_path: S) {
        self.z3_path = z3_path.into();
    }

    /// The enumeration solver tries integers in `-range..=range`, in addition
    /// to the constants of the formula and their neighbours.
    pub fn integer_range(&self) -> u32 {
        self.integer_range
    }

    pub fn set_integer_range(&mut self, integer_range: u32) {
        self.integer_range = integer_range;
    }

    pub fn create(&self) -> RC<dyn Solver> {
        match self.kind {
            SolverKind::Enumeration => RC::new(EnumerationSolver::new(self.integer_range)),
            SolverKind::Z3 => RC::new(Z3Solver::new(self.z3_path.clone())),
        }
    }
}

impl Default for SolverOptions {
    fn default() -> SolverOptions {
        SolverOptions {
            kind: SolverKind::Enumeration,
            z3_path: "z3".to_string(),
            integer_range: 8,
        }
    }
}
