//! Tracks where every state came from.
//!
//! Each state receives a fresh id, remembers the ids of its predecessors and
//! the ids it was merged from. From this the `AccessibilityRelation` between
//! reached states is rebuilt on demand, and from that the path to an error
//! state.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{
    AnalysisContext, AnalysisLayer, Capabilities, PartitionKey, ProgramAnalysis, Provenance,
    StateId, Transfer, WrappingAnalysis,
};
use crate::lattice::Formula;
use crate::task::{Constant, Expression, Property, Task, Variable};
use crate::{Error, RC};

mod accessibility;
mod witness;

pub use self::accessibility::AccessibilityRelation;
pub use self::witness::*;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct GraphState<S> {
    id: StateId,
    predecessors: BTreeSet<StateId>,
    merge_of: BTreeSet<StateId>,
    wrapped: S,
}

impl<S> GraphState<S> {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn predecessors(&self) -> &BTreeSet<StateId> {
        &self.predecessors
    }

    pub fn merge_of(&self) -> &BTreeSet<StateId> {
        &self.merge_of
    }

    pub fn wrapped(&self) -> &S {
        &self.wrapped
    }
}

pub struct GraphAnalysis<A> {
    wrapped: A,
    context: RC<AnalysisContext>,
}

impl<A: ProgramAnalysis> GraphAnalysis<A> {
    pub fn new(wrapped: A, context: RC<AnalysisContext>) -> GraphAnalysis<A> {
        GraphAnalysis { wrapped, context }
    }

    fn fresh(&self, predecessors: BTreeSet<StateId>, wrapped: A::State) -> GraphState<A::State> {
        let id = self.context.state_ids().allocate();
        let mut merge_of = BTreeSet::new();
        merge_of.insert(id);
        GraphState {
            id,
            predecessors,
            merge_of,
            wrapped,
        }
    }

    fn combined(
        &self,
        a: &GraphState<A::State>,
        b: &GraphState<A::State>,
        wrapped: A::State,
    ) -> GraphState<A::State> {
        let mut state = self.fresh(
            a.predecessors.union(&b.predecessors).cloned().collect(),
            wrapped,
        );
        state.merge_of.extend(a.merge_of.iter().chain(b.merge_of.iter()));
        state
    }

    /// The same state and provenance around a different wrapped state.
    fn rewrap(&self, state: &GraphState<A::State>, wrapped: A::State) -> GraphState<A::State> {
        GraphState {
            id: state.id,
            predecessors: state.predecessors.clone(),
            merge_of: state.merge_of.clone(),
            wrapped,
        }
    }
}

impl<A: ProgramAnalysis> ProgramAnalysis for GraphAnalysis<A> {
    type State = GraphState<A::State>;

    fn abstract_succ(&self, state: &Self::State) -> Result<Vec<Self::State>, Error> {
        Ok(self
            .wrapped
            .abstract_succ(&state.wrapped)?
            .into_iter()
            .map(|wrapped| {
                let mut predecessors = BTreeSet::new();
                predecessors.insert(state.id);
                self.fresh(predecessors, wrapped)
            })
            .collect())
    }

    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        let wrapped = self.wrapped.join(&a.wrapped, &b.wrapped)?;
        Ok(self.combined(a, b, wrapped))
    }

    fn should_merge(&self, a: &Self::State, b: &Self::State) -> Result<bool, Error> {
        self.wrapped.should_merge(&a.wrapped, &b.wrapped)
    }

    fn merge(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        let wrapped = self.wrapped.merge(&a.wrapped, &b.wrapped)?;
        if wrapped == b.wrapped {
            return Ok(b.clone());
        }
        Ok(self.combined(a, b, wrapped))
    }

    fn stop(&self, state: &Self::State, reached: &[&Self::State]) -> Result<bool, Error> {
        self.wrapped.stop(&state.wrapped, &self.unwrap_all(reached))
    }

    fn widen(&self, state: &Self::State, reached: &[&Self::State]) -> Result<Self::State, Error> {
        let wrapped = self.wrapped.widen(&state.wrapped, &self.unwrap_all(reached))?;
        Ok(self.rewrap(state, wrapped))
    }

    fn target(&self, state: &Self::State) -> BTreeSet<Property> {
        self.wrapped.target(&state.wrapped)
    }

    fn initial_states_for(&self, task: &Task) -> Result<Vec<Self::State>, Error> {
        Ok(self
            .wrapped
            .initial_states_for(task)?
            .into_iter()
            .map(|wrapped| self.fresh(BTreeSet::new(), wrapped))
            .collect())
    }

    fn partition_key(&self, state: &Self::State) -> PartitionKey {
        self.wrapped.partition_key(&state.wrapped)
    }

    fn state_formula(&self, state: &Self::State) -> Result<Formula, Error> {
        self.wrapped.state_formula(&state.wrapped)
    }

    fn reset_path(&self, state: &Self::State) -> Result<Self::State, Error> {
        Ok(self.rewrap(state, self.wrapped.reset_path(&state.wrapped)?))
    }

    fn is_loop_head(&self, state: &Self::State) -> bool {
        self.wrapped.is_loop_head(&state.wrapped)
    }

    fn instantiate_predicate(
        &self,
        state: &Self::State,
        predicate: &Expression,
    ) -> Result<Expression, Error> {
        self.wrapped.instantiate_predicate(&state.wrapped, predicate)
    }

    fn transition_label(&self, state: &Self::State) -> Vec<Transfer> {
        self.wrapped.transition_label(&state.wrapped)
    }

    fn variable_values(&self, state: &Self::State) -> BTreeMap<Variable, Constant> {
        self.wrapped.variable_values(&state.wrapped)
    }

    fn provenance(&self, state: &Self::State) -> Option<Provenance> {
        Some(Provenance {
            id: state.id,
            predecessors: state.predecessors.clone(),
            merge_of: state.merge_of.clone(),
        })
    }
}

impl<A: ProgramAnalysis> WrappingAnalysis for GraphAnalysis<A> {
    type Wrapped = A;

    fn wrapped_analysis(&self) -> &A {
        &self.wrapped
    }

    fn unwrap<'s>(&self, state: &'s Self::State) -> &'s A::State {
        &state.wrapped
    }
}

impl<A: ProgramAnalysis + AnalysisLayer> AnalysisLayer for GraphAnalysis<A> {
    fn name(&self) -> &'static str {
        "GraphAnalysis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TRACKS_PROVENANCE | Capabilities::EXPORTS_RESULT
    }

    fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer> {
        Some(&self.wrapped)
    }
}
