//! Configuration of an analysis run.
//!
//! The configuration is a JSON object with one section per analysis layer.
//! Missing sections and keys take their defaults; unknown keys are errors.
//!
//! ```json
//! {
//!     "ControlAnalysis": { "wait-policy": "approximate" },
//!     "AbstractionAnalysis": { "abstraction-type": "cartesian" },
//!     "DataAnalysis": { "domain": "value", "merge-operator": "JOIN" },
//!     "Reachability": { "max-states": 5000 },
//!     "Solver": { "kind": "z3", "z3-path": "/usr/bin/z3" }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::lattice::AbstractionType;
use crate::solver::SolverOptions;
use crate::Error;

/// What the scheduler does with waiting statements it cannot model exactly.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitPolicy {
    /// Treat the wait as a yield and record a soundness caveat.
    Approximate,
    /// Fail with `Error::Unimplemented`.
    Reject,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ControlOptions {
    aggregate_atomic_transitions: bool,
    wait_policy: WaitPolicy,
}

impl ControlOptions {
    pub fn new() -> ControlOptions {
        ControlOptions::default()
    }

    pub fn aggregate_atomic_transitions(&self) -> bool {
        self.aggregate_atomic_transitions
    }

    pub fn set_aggregate_atomic_transitions(&mut self, aggregate_atomic_transitions: bool) {
        self.aggregate_atomic_transitions = aggregate_atomic_transitions;
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait_policy
    }

    pub fn set_wait_policy(&mut self, wait_policy: WaitPolicy) {
        self.wait_policy = wait_policy;
    }
}

impl Default for ControlOptions {
    fn default() -> ControlOptions {
        ControlOptions {
            aggregate_atomic_transitions: false,
            wait_policy: WaitPolicy::Approximate,
        }
    }
}

/// Where the abstraction layer computes summaries.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbstractionPoints {
    Always,
    LoopHeads,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct AbstractionOptions {
    abstraction_type: String,
    abstraction_points: AbstractionPoints,
}

impl AbstractionOptions {
    pub fn new() -> AbstractionOptions {
        AbstractionOptions::default()
    }

    /// Fails with `Error::IllegalArgument` for unknown abstraction types.
    pub fn abstraction_type(&self) -> Result<AbstractionType, Error> {
        self.abstraction_type.parse()
    }

    pub fn set_abstraction_type(&mut self, abstraction_type: AbstractionType) {
        self.abstraction_type = abstraction_type.to_string();
    }

    pub fn abstraction_points(&self) -> AbstractionPoints {
        self.abstraction_points
    }

    pub fn set_abstraction_points(&mut self, abstraction_points: AbstractionPoints) {
        self.abstraction_points = abstraction_points;
    }
}

impl Default for AbstractionOptions {
    fn default() -> AbstractionOptions {
        AbstractionOptions {
            abstraction_type: AbstractionType::Boolean.to_string(),
            abstraction_points: AbstractionPoints::Always,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataDomain {
    /// Path formulas.
    Symbolic,
    /// Constant values.
    Value,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DataOptions {
    domain: DataDomain,
    merge_operator: String,
}

impl DataOptions {
    pub fn new() -> DataOptions {
        DataOptions::default()
    }

    pub fn domain(&self) -> DataDomain {
        self.domain
    }

    pub fn set_domain(&mut self, domain: DataDomain) {
        self.domain = domain;
    }

    /// The name of the merge operator, `SEP` or `JOIN`.
    pub fn merge_operator(&self) -> &str {
        &self.merge_operator
    }

    pub fn set_merge_operator<S: Into<String>>(&mut self, merge_operator: S) {
        self.merge_operator = merge_operator.into();
    }
}

impl Default for DataOptions {
    fn default() -> DataOptions {
        DataOptions {
            domain: DataDomain::Symbolic,
            merge_operator: "SEP".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ReachabilityOptions {
    max_states: usize,
    max_refinements: usize,
}

impl ReachabilityOptions {
    pub fn new() -> ReachabilityOptions {
        ReachabilityOptions::default()
    }

    /// The reached set may not grow beyond this many states.
    pub fn max_states(&self) -> usize {
        self.max_states
    }

    pub fn set_max_states(&mut self, max_states: usize) {
        self.max_states = max_states;
    }

    pub fn max_refinements(&self) -> usize {
        self.max_refinements
    }

    pub fn set_max_refinements(&mut self, max_refinements: usize) {
        self.max_refinements = max_refinements;
    }
}

impl Default for ReachabilityOptions {
    fn default() -> ReachabilityOptions {
        ReachabilityOptions {
            max_states: 100_000,
            max_refinements: 16,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(rename = "ControlAnalysis")]
    control: ControlOptions,
    #[serde(rename = "AbstractionAnalysis")]
    abstraction: AbstractionOptions,
    #[serde(rename = "DataAnalysis")]
    data: DataOptions,
    #[serde(rename = "Reachability")]
    reachability: ReachabilityOptions,
    #[serde(rename = "Solver")]
    solver: SolverOptions,
}

impl AnalysisConfig {
    pub fn new() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    pub fn from_json(json: &str) -> Result<AnalysisConfig, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn control(&self) -> &ControlOptions {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut ControlOptions {
        &mut self.control
    }

    pub fn abstraction(&self) -> &AbstractionOptions {
        &self.abstraction
    }

    pub fn abstraction_mut(&mut self) -> &mut AbstractionOptions {
        &mut self.abstraction
    }

    pub fn data(&self) -> &DataOptions {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataOptions {
        &mut self.data
    }

    pub fn reachability(&self) -> &ReachabilityOptions {
        &self.reachability
    }

    pub fn reachability_mut(&mut self) -> &mut ReachabilityOptions {
        &mut self.reachability
    }

    pub fn solver(&self) -> &SolverOptions {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut SolverOptions {
        &mut self.solver
    }
}
