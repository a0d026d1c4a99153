//! The contract every analysis implements, and how analyses stack.
//!
//! An analysis either works on the data of the program directly, or wraps
//! exactly one other analysis and adds a single concern to it. A wrapping
//! analysis owns the wrapped analysis and, for each of its states, exactly
//! one wrapped state. It delegates what it does not own to the wrapped
//! analysis and never looks inside a wrapped state except through the
//! wrapped analysis.

use bitflags::bitflags;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::analysis::{PartitionKey, StateId, ThreadId};
use crate::lattice::Formula;
use crate::task::{Constant, Expression, OperationId, Property, Statement, Task, Variable};
use crate::Error;

/// A value some analysis manipulates.
pub trait AbstractState: Clone + Debug + Eq + Hash {}

impl<T: Clone + Debug + Eq + Hash> AbstractState for T {}

/// Where a state came from, for reconstructing paths.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Provenance {
    pub id: StateId,
    pub predecessors: BTreeSet<StateId>,
    /// The ids this state was merged from, including its own.
    pub merge_of: BTreeSet<StateId>,
}

/// One operation applied during a control step.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Transfer {
    pub thread: ThreadId,
    /// The task operation, `None` for operations the scheduler synthesizes.
    pub operation: Option<OperationId>,
    pub statement: Statement,
    pub big_step: usize,
}

/// An operation handed from the scheduler to the analyses below it.
#[derive(Clone, Debug)]
pub struct LabeledOperation {
    pub thread: ThreadId,
    pub operation: Option<OperationId>,
    pub statement: Statement,
    pub big_step: usize,
    /// Set on the first operation of a control step.
    pub step_start: bool,
}

impl LabeledOperation {
    /// An operation no thread executes, used by analyses to constrain their
    /// own wrapped states.
    pub fn synthesized(statement: Statement) -> LabeledOperation {
        LabeledOperation {
            thread: 0,
            operation: None,
            statement,
            big_step: 0,
            step_start: false,
        }
    }

    pub fn transfer(&self) -> Transfer {
        Transfer {
            thread: self.thread,
            operation: self.operation,
            statement: self.statement.clone(),
            big_step: self.big_step,
        }
    }
}

pub trait ProgramAnalysis {
    type State: AbstractState;

    /// The successors of a state.
    fn abstract_succ(&self, state: &Self::State) -> Result<Vec<Self::State>, Error>;

    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error>;

    fn should_merge(&self, a: &Self::State, b: &Self::State) -> Result<bool, Error>;

    /// Merge `a` into `b`.
    fn merge(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error>;

    /// Returns true if `state` is covered by one of the `reached` states.
    fn stop(&self, state: &Self::State, reached: &[&Self::State]) -> Result<bool, Error>;

    fn widen(&self, state: &Self::State, reached: &[&Self::State]) -> Result<Self::State, Error>;

    /// The properties this state violates.
    fn target(&self, state: &Self::State) -> BTreeSet<Property>;

    fn initial_states_for(&self, task: &Task) -> Result<Vec<Self::State>, Error>;

    /// Only states with equal keys are ever compared with each other.
    fn partition_key(&self, _state: &Self::State) -> PartitionKey {
        PartitionKey::default()
    }

    /// A formula over-approximating the concrete states this state stands
    /// for.
    fn state_formula(&self, _state: &Self::State) -> Result<Formula, Error> {
        Ok(Formula::top())
    }

    /// Forget everything this state knows about the data, keeping control.
    fn reset_path(&self, state: &Self::State) -> Result<Self::State, Error> {
        Ok(state.clone())
    }

    /// Returns true if some thread of this state sits at a loop head.
    fn is_loop_head(&self, _state: &Self::State) -> bool {
        false
    }

    /// Bind the variables of a predicate to their instances in this state.
    fn instantiate_predicate(
        &self,
        _state: &Self::State,
        predicate: &Expression,
    ) -> Result<Expression, Error> {
        Ok(predicate.clone())
    }

    /// The operations applied by the step that produced this state.
    fn transition_label(&self, _state: &Self::State) -> Vec<Transfer> {
        Vec::new()
    }

    /// The values this state knows for program variables.
    fn variable_values(&self, _state: &Self::State) -> BTreeMap<Variable, Constant> {
        BTreeMap::new()
    }

    fn provenance(&self, _state: &Self::State) -> Option<Provenance> {
        None
    }
}

/// Analyses below the scheduler interpret individual operations.
pub trait LabeledTransferRelation: ProgramAnalysis {
    fn abstract_succ_for(
        &self,
        state: &Self::State,
        operation: &LabeledOperation,
    ) -> Result<Vec<Self::State>, Error>;
}

pub trait WrappingAnalysis: ProgramAnalysis {
    type Wrapped: ProgramAnalysis;

    fn wrapped_analysis(&self) -> &Self::Wrapped;

    fn unwrap<'s>(
        &self,
        state: &'s Self::State,
    ) -> &'s <Self::Wrapped as ProgramAnalysis>::State;

    fn unwrap_all<'s>(
        &self,
        states: &[&'s Self::State],
    ) -> Vec<&'s <Self::Wrapped as ProgramAnalysis>::State> {
        states.iter().map(|state| self.unwrap(state)).collect()
    }
}

bitflags! {
    /// What a layer of the analysis chain offers its users.
    pub struct Capabilities: u32 {
        const EXPORTS_RESULT     = 0b0000_0001;
        const REFINES_PRECISION  = 0b0000_0010;
        const PROVIDES_FORMULA   = 0b0000_0100;
        const TRACKS_PROVENANCE  = 0b0000_1000;
        const SCHEDULES_THREADS  = 0b0001_0000;
    }
}

/// A view of one layer of the analysis chain, independent of state types.
pub trait AnalysisLayer {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer>;
}

/// Walk the chain of analyses starting at `from`, returning the first layer
/// satisfying `predicate`.
pub fn extract_wrapped_analysis<'a, P>(
    from: &'a dyn AnalysisLayer,
    predicate: P,
) -> Option<&'a dyn AnalysisLayer>
where
    P: Fn(&dyn AnalysisLayer) -> bool,
{
    let mut layer = Some(from);
    while let Some(current) = layer {
        if predicate(current) {
            return Some(current);
        }
        layer = current.wrapped_layer();
    }
    None
}

/// The names of all layers, outermost first.
pub fn layer_names(from: &dyn AnalysisLayer) -> Vec<&'static str> {
    let mut names = Vec::new();
    let mut layer = Some(from);
    while let Some(current) = layer {
        names.push(current.name());
        layer = current.wrapped_layer();
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Layer {
        name: &'static str,
        capabilities: Capabilities,
        wrapped: Option<Box<Layer>>,
    }

    impl AnalysisLayer for Layer {
        fn name(&self) -> &'static str {
            self.name
        }

        fn capabilities(&self) -> Capabilities {
            self.capabilities
        }

        fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer> {
            self.wrapped.as_ref().map(|w| w.as_ref() as &dyn AnalysisLayer)
        }
    }

    #[test]
    fn extract_stops_at_first_match() {
        let chain = Layer {
            name: "outer",
            capabilities: Capabilities::REFINES_PRECISION,
            wrapped: Some(Box::new(Layer {
                name: "middle",
                capabilities: Capabilities::EXPORTS_RESULT,
                wrapped: Some(Box::new(Layer {
                    name: "inner",
                    capabilities: Capabilities::EXPORTS_RESULT | Capabilities::PROVIDES_FORMULA,
                    wrapped: None,
                })),
            })),
        };

        let found = extract_wrapped_analysis(&chain, |layer| {
            layer.capabilities().contains(Capabilities::EXPORTS_RESULT)
        });
        assert_eq!(found.map(|layer| layer.name()), Some("middle"));

        let found = extract_wrapped_analysis(&chain, |layer| {
            layer.capabilities().contains(Capabilities::SCHEDULES_THREADS)
        });
        assert!(found.is_none());

        assert_eq!(layer_names(&chain), vec!["outer", "middle", "inner"]);
    }
}
