//! Operators shared by the reachability algorithm and the analyses.

use log::debug;

use crate::analysis::{
    AbstractState, FrontierSet, PartitionKey, ProgramAnalysis, ReachedSet, StateSet,
};
use crate::lattice::Lattice;
use crate::Error;

/// Whether and how two states are combined before admission.
pub trait MergeOperator<S> {
    fn should_merge(&self, a: &S, b: &S) -> Result<bool, Error>;

    /// Merge `a` into `b`.
    fn merge(&self, a: &S, b: &S) -> Result<S, Error>;
}

/// Never merge; states stay distinct.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeSep;

impl<S: Clone> MergeOperator<S> for MergeSep {
    fn should_merge(&self, _: &S, _: &S) -> Result<bool, Error> {
        Ok(false)
    }

    fn merge(&self, _: &S, b: &S) -> Result<S, Error> {
        Ok(b.clone())
    }
}

/// Always merge, by the join of the lattice.
#[derive(Clone, Debug)]
pub struct MergeJoin<L: Lattice> {
    lattice: L,
}

impl<L: Lattice> MergeJoin<L> {
    pub fn new(lattice: L) -> MergeJoin<L> {
        MergeJoin { lattice }
    }
}

impl<L: Lattice> MergeOperator<L::Element> for MergeJoin<L> {
    fn should_merge(&self, _: &L::Element, _: &L::Element) -> Result<bool, Error> {
        Ok(true)
    }

    fn merge(&self, a: &L::Element, b: &L::Element) -> Result<L::Element, Error> {
        self.lattice.join(a, b)
    }
}

/// Creates merge operators from their configured names.
pub struct StandardMergeOperatorFactory;

impl StandardMergeOperatorFactory {
    pub fn create<L>(name: &str, lattice: L) -> Result<Box<dyn MergeOperator<L::Element>>, Error>
    where
        L: Lattice + 'static,
    {
        match name {
            "SEP" => Ok(Box::new(MergeSep)),
            "JOIN" => Ok(Box::new(MergeJoin::new(lattice))),
            _ => Err(Error::IllegalArgument(format!(
                "Unknown merge operator {}",
                name
            ))),
        }
    }
}

/// How comparable states are combined.
pub trait JoinOperator<S> {
    fn join_states(&self, a: &S, b: &S) -> Result<S, Error>;
}

impl<A: ProgramAnalysis> JoinOperator<A::State> for A {
    fn join_states(&self, a: &A::State, b: &A::State) -> Result<A::State, Error> {
        ProgramAnalysis::join(self, a, b)
    }
}

/// Which states are comparable at all.
pub trait PartitionOperator<S> {
    fn key_of(&self, state: &S) -> PartitionKey;
}

impl<A: ProgramAnalysis> PartitionOperator<A::State> for A {
    fn key_of(&self, state: &A::State) -> PartitionKey {
        ProgramAnalysis::partition_key(self, state)
    }
}

/// Merges a new state into the reached states of its partition.
pub trait MergeIntoOperator<S: AbstractState> {
    fn merge_into(
        &self,
        state: &S,
        frontier: &mut FrontierSet<S>,
        reached: &mut ReachedSet<S>,
    ) -> Result<(), Error>;
}

/// Replaces every reached state the analysis wants merged with the new
/// state by the merge result. Merge results that differ from the state they
/// replace are waiting to be expanded again.
pub struct StandardMergeInto<'a, A> {
    analysis: &'a A,
}

impl<'a, A> StandardMergeInto<'a, A> {
    pub fn new(analysis: &'a A) -> StandardMergeInto<'a, A> {
        StandardMergeInto { analysis }
    }
}

impl<'a, A: ProgramAnalysis> MergeIntoOperator<A::State> for StandardMergeInto<'a, A> {
    fn merge_into(
        &self,
        state: &A::State,
        frontier: &mut FrontierSet<A::State>,
        reached: &mut ReachedSet<A::State>,
    ) -> Result<(), Error> {
        let mut replacements = Vec::new();
        for reached_state in reached.partition_of(state) {
            if self.analysis.should_merge(state, reached_state)? {
                let merged = self.analysis.merge(state, reached_state)?;
                if &merged != reached_state {
                    replacements.push((reached_state.clone(), merged));
                }
            }
        }

        for (old, merged) in replacements {
            debug!("merged into reached state");
            reached.remove(&old);
            if !frontier.replace(&old, merged.clone()) {
                frontier.add(merged.clone());
            }
            reached.add(merged);
        }
        Ok(())
    }
}

/// Leaves reached states untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMergeInto;

impl<S: AbstractState> MergeIntoOperator<S> for NoMergeInto {
    fn merge_into(
        &self,
        _: &S,
        _: &mut FrontierSet<S>,
        _: &mut ReachedSet<S>,
    ) -> Result<(), Error> {
        Ok(())
    }
}
