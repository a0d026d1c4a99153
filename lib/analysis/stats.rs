//! Counts what the analysis below it does.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::analysis::{
    AnalysisLayer, Capabilities, PartitionKey, ProgramAnalysis, Provenance, Transfer,
    WrappingAnalysis,
};
use crate::lattice::Formula;
use crate::task::{Constant, Expression, Property, Task, Variable};
use crate::Error;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisStatistics {
    pub successor_computations: u64,
    pub states_computed: u64,
    pub merges: u64,
    pub stop_checks: u64,
    pub states_covered: u64,
    pub widenings: u64,
    pub transfer_time_ms: u64,
    pub refinements: u64,
    pub reached_states: u64,
}

#[derive(Debug, Default)]
struct Counters {
    successor_computations: Cell<u64>,
    states_computed: Cell<u64>,
    merges: Cell<u64>,
    stop_checks: Cell<u64>,
    states_covered: Cell<u64>,
    widenings: Cell<u64>,
    transfer_micros: Cell<u64>,
}

fn increment(counter: &Cell<u64>, by: u64) {
    counter.set(counter.get() + by);
}

/// Passes everything through to the wrapped analysis, counting calls.
pub struct StatsAnalysis<A> {
    wrapped: A,
    counters: Counters,
}

impl<A: ProgramAnalysis> StatsAnalysis<A> {
    pub fn new(wrapped: A) -> StatsAnalysis<A> {
        StatsAnalysis {
            wrapped,
            counters: Counters::default(),
        }
    }

    /// The counts so far. Refinements and reached states are not known to
    /// this layer and are left at zero.
    pub fn statistics(&self) -> AnalysisStatistics {
        AnalysisStatistics {
            successor_computations: self.counters.successor_computations.get(),
            states_computed: self.counters.states_computed.get(),
            merges: self.counters.merges.get(),
            stop_checks: self.counters.stop_checks.get(),
            states_covered: self.counters.states_covered.get(),
            widenings: self.counters.widenings.get(),
            transfer_time_ms: self.counters.transfer_micros.get() / 1000,
            refinements: 0,
            reached_states: 0,
        }
    }
}

impl<A: ProgramAnalysis> ProgramAnalysis for StatsAnalysis<A> {
    type State = A::State;

    fn abstract_succ(&self, state: &A::State) -> Result<Vec<A::State>, Error> {
        let start = Instant::now();
        let successors = self.wrapped.abstract_succ(state)?;
        increment(
            &self.counters.transfer_micros,
            start.elapsed().as_micros() as u64,
        );
        increment(&self.counters.successor_computations, 1);
        increment(&self.counters.states_computed, successors.len() as u64);
        Ok(successors)
    }

    fn join(&self, a: &A::State, b: &A::State) -> Result<A::State, Error> {
        self.wrapped.join(a, b)
    }

    fn should_merge(&self, a: &A::State, b: &A::State) -> Result<bool, Error> {
        self.wrapped.should_merge(a, b)
    }

    fn merge(&self, a: &A::State, b: &A::State) -> Result<A::State, Error> {
        increment(&self.counters.merges, 1);
        self.wrapped.merge(a, b)
    }

    fn stop(&self, state: &A::State, reached: &[&A::State]) -> Result<bool, Error> {
        increment(&self.counters.stop_checks, 1);
        let covered = self.wrapped.stop(state, reached)?;
        if covered {
            increment(&self.counters.states_covered, 1);
        }
        Ok(covered)
    }

    fn widen(&self, state: &A::State, reached: &[&A::State]) -> Result<A::State, Error> {
        increment(&self.counters.widenings, 1);
        self.wrapped.widen(state, reached)
    }

    fn target(&self, state: &A::State) -> BTreeSet<Property> {
        self.wrapped.target(state)
    }

    fn initial_states_for(&self, task: &Task) -> Result<Vec<A::State>, Error> {
        self.wrapped.initial_states_for(task)
    }

    fn partition_key(&self, state: &A::State) -> PartitionKey {
        self.wrapped.partition_key(state)
    }

    fn state_formula(&self, state: &A::State) -> Result<Formula, Error> {
        self.wrapped.state_formula(state)
    }

    fn reset_path(&self, state: &A::State) -> Result<A::State, Error> {
        self.wrapped.reset_path(state)
    }

    fn is_loop_head(&self, state: &A::State) -> bool {
        self.wrapped.is_loop_head(state)
    }

    fn instantiate_predicate(
        &self,
        state: &A::State,
        predicate: &Expression,
    ) -> Result<Expression, Error> {
        self.wrapped.instantiate_predicate(state, predicate)
    }

    fn transition_label(&self, state: &A::State) -> Vec<Transfer> {
        self.wrapped.transition_label(state)
    }

    fn variable_values(&self, state: &A::State) -> BTreeMap<Variable, Constant> {
        self.wrapped.variable_values(state)
    }

    fn provenance(&self, state: &A::State) -> Option<Provenance> {
        self.wrapped.provenance(state)
    }
}

impl<A: ProgramAnalysis> WrappingAnalysis for StatsAnalysis<A> {
    type Wrapped = A;

    fn wrapped_analysis(&self) -> &A {
        &self.wrapped
    }

    fn unwrap<'s>(&self, state: &'s A::State) -> &'s A::State {
        state
    }
}

impl<A: ProgramAnalysis + AnalysisLayer> AnalysisLayer for StatsAnalysis<A> {
    fn name(&self) -> &'static str {
        "StatsAnalysis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::EXPORTS_RESULT
    }

    fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer> {
        Some(&self.wrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Counter;

    #[test]
    fn counts_calls() {
        let analysis = StatsAnalysis::new(Counter::new(2));
        let task = Task::new("empty", Vec::new(), Vec::new()).unwrap();

        let initial = analysis.initial_states_for(&task).unwrap().remove(0);
        let successor = analysis.abstract_succ(&initial).unwrap().remove(0);
        assert!(analysis.abstract_succ(&2).unwrap().is_empty());
        assert!(analysis.stop(&successor, &[&successor]).unwrap());
        assert!(!analysis.stop(&successor, &[&initial]).unwrap());
        analysis.widen(&successor, &[]).unwrap();

        let statistics = analysis.statistics();
        assert_eq!(statistics.successor_computations, 2);
        assert_eq!(statistics.states_computed, 1);
        assert_eq!(statistics.stop_checks, 2);
        assert_eq!(statistics.states_covered, 1);
        assert_eq!(statistics.widenings, 1);
        assert_eq!(statistics.merges, 0);
        assert_eq!(analysis.unwrap(&successor), &successor);
    }
}
