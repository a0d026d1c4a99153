//! Records the operations of the control step that produced each state.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{
    AnalysisLayer, Capabilities, LabeledOperation, LabeledTransferRelation, PartitionKey,
    ProgramAnalysis, Transfer, WrappingAnalysis,
};
use crate::lattice::Formula;
use crate::task::{Constant, Expression, Property, Task, Variable};
use crate::Error;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LabelState<S> {
    transfers: Vec<Transfer>,
    wrapped: S,
}

impl<S> LabelState<S> {
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn wrapped(&self) -> &S {
        &self.wrapped
    }
}

pub struct LabelAnalysis<A> {
    wrapped: A,
}

impl<A: LabeledTransferRelation> LabelAnalysis<A> {
    pub fn new(wrapped: A) -> LabelAnalysis<A> {
        LabelAnalysis { wrapped }
    }

    fn wrap(&self, transfers: Vec<Transfer>, wrapped: A::State) -> LabelState<A::State> {
        LabelState { transfers, wrapped }
    }
}

/// The transfers of `b`, followed by those of `a` not already in `b`.
fn union(a: &[Transfer], b: &[Transfer]) -> Vec<Transfer> {
    let mut transfers = b.to_vec();
    for transfer in a {
        if !transfers.contains(transfer) {
            transfers.push(transfer.clone());
        }
    }
    transfers
}

impl<A: LabeledTransferRelation> ProgramAnalysis for LabelAnalysis<A> {
    type State = LabelState<A::State>;

    fn abstract_succ(&self, state: &Self::State) -> Result<Vec<Self::State>, Error> {
        Ok(self
            .wrapped
            .abstract_succ(&state.wrapped)?
            .into_iter()
            .map(|w| self.wrap(state.transfers.clone(), w))
            .collect())
    }

    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        Ok(self.wrap(
            union(&a.transfers, &b.transfers),
            self.wrapped.join(&a.wrapped, &b.wrapped)?,
        ))
    }

    fn should_merge(&self, a: &Self::State, b: &Self::State) -> Result<bool, Error> {
        self.wrapped.should_merge(&a.wrapped, &b.wrapped)
    }

    fn merge(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        Ok(self.wrap(
            union(&a.transfers, &b.transfers),
            self.wrapped.merge(&a.wrapped, &b.wrapped)?,
        ))
    }

    fn stop(&self, state: &Self::State, reached: &[&Self::State]) -> Result<bool, Error> {
        self.wrapped.stop(&state.wrapped, &self.unwrap_all(reached))
    }

    fn widen(&self, state: &Self::State, reached: &[&Self::State]) -> Result<Self::State, Error> {
        Ok(self.wrap(
            state.transfers.clone(),
            self.wrapped.widen(&state.wrapped, &self.unwrap_all(reached))?,
        ))
    }

    fn target(&self, state: &Self::State) -> BTreeSet<Property> {
        self.wrapped.target(&state.wrapped)
    }

    fn initial_states_for(&self, task: &Task) -> Result<Vec<Self::State>, Error> {
        Ok(self
            .wrapped
            .initial_states_for(task)?
            .into_iter()
            .map(|w| self.wrap(Vec::new(), w))
            .collect())
    }

    fn partition_key(&self, state: &Self::State) -> PartitionKey {
        self.wrapped.partition_key(&state.wrapped)
    }

    fn state_formula(&self, state: &Self::State) -> Result<Formula, Error> {
        self.wrapped.state_formula(&state.wrapped)
    }

    fn reset_path(&self, state: &Self::State) -> Result<Self::State, Error> {
        Ok(self.wrap(
            state.transfers.clone(),
            self.wrapped.reset_path(&state.wrapped)?,
        ))
    }

    fn instantiate_predicate(
        &self,
        state: &Self::State,
        predicate: &Expression,
    ) -> Result<Expression, Error> {
        self.wrapped.instantiate_predicate(&state.wrapped, predicate)
    }

    fn transition_label(&self, state: &Self::State) -> Vec<Transfer> {
        state.transfers.clone()
    }

    fn variable_values(&self, state: &Self::State) -> BTreeMap<Variable, Constant> {
        self.wrapped.variable_values(&state.wrapped)
    }
}

impl<A: LabeledTransferRelation> LabeledTransferRelation for LabelAnalysis<A> {
    fn abstract_succ_for(
        &self,
        state: &Self::State,
        operation: &LabeledOperation,
    ) -> Result<Vec<Self::State>, Error> {
        let mut transfers = if operation.step_start {
            Vec::new()
        } else {
            state.transfers.clone()
        };
        transfers.push(operation.transfer());

        Ok(self
            .wrapped
            .abstract_succ_for(&state.wrapped, operation)?
            .into_iter()
            .map(|w| self.wrap(transfers.clone(), w))
            .collect())
    }
}

impl<A: LabeledTransferRelation> WrappingAnalysis for LabelAnalysis<A> {
    type Wrapped = A;

    fn wrapped_analysis(&self) -> &A {
        &self.wrapped
    }

    fn unwrap<'s>(&self, state: &'s Self::State) -> &'s A::State {
        &state.wrapped
    }
}

impl<A: LabeledTransferRelation + AnalysisLayer> AnalysisLayer for LabelAnalysis<A> {
    fn name(&self) -> &'static str {
        "LabelAnalysis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::EXPORTS_RESULT
    }

    fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer> {
        Some(&self.wrapped)
    }
}
