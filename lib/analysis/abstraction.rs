//! Predicate abstraction over blocks of the program.
//!
//! At every abstraction point the formula of the block just completed is
//! abstracted, together with the summary the block was entered with, over
//! the current precision. The wrapped state then forgets its data, so the
//! next block starts from the summary alone.
//!
//! The abstraction layer also keeps the conjunction of all completed block
//! formulas, the path formula, which the refiner checks for feasibility when
//! a target state is reached.

use log::trace;
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{
    AbstractionPoints, AnalysisLayer, Capabilities, PartitionKey, ProgramAnalysis, Provenance,
    Transfer, WrappingAnalysis,
};
use crate::lattice::{AbstractDomain, Formula, Lattice, PredicateAbstractionDomain};
use crate::task::{Constant, Expression, Property, Task, Variable};
use crate::Error;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AbstractionState<S> {
    entering_summary: Formula,
    path: Formula,
    wrapped: S,
    block_id: PartitionKey,
    precision: BTreeSet<Expression>,
}

impl<S> AbstractionState<S> {
    /// The abstraction of everything before the current block.
    pub fn entering_summary(&self) -> &Formula {
        &self.entering_summary
    }

    pub fn path(&self) -> &Formula {
        &self.path
    }

    pub fn wrapped(&self) -> &S {
        &self.wrapped
    }

    /// The partition key of the abstraction point the block started at.
    pub fn block_id(&self) -> &PartitionKey {
        &self.block_id
    }

    /// The predicates, without SSA versions.
    pub fn precision(&self) -> &BTreeSet<Expression> {
        &self.precision
    }
}

/// Forget SSA versions, so summaries of different blocks compare.
pub fn strip_versions(formula: &Formula) -> Result<Formula, Error> {
    Formula::from_expression(
        &formula
            .to_expression()
            .rename(&|variable: &Variable| variable.base()),
    )
}

pub struct AbstractionAnalysis<A> {
    wrapped: A,
    domain: PredicateAbstractionDomain,
    points: AbstractionPoints,
}

impl<A: ProgramAnalysis> AbstractionAnalysis<A> {
    pub fn new(
        wrapped: A,
        domain: PredicateAbstractionDomain,
        points: AbstractionPoints,
    ) -> AbstractionAnalysis<A> {
        AbstractionAnalysis {
            wrapped,
            domain,
            points,
        }
    }

    pub fn domain(&self) -> &PredicateAbstractionDomain {
        &self.domain
    }

    fn is_abstraction_point(&self, state: &AbstractionState<A::State>) -> bool {
        match self.points {
            AbstractionPoints::Always => true,
            AbstractionPoints::LoopHeads => self.wrapped.is_loop_head(&state.wrapped),
        }
    }

    fn rewrap(&self, state: &AbstractionState<A::State>, wrapped: A::State) -> AbstractionState<A::State> {
        AbstractionState {
            entering_summary: state.entering_summary.clone(),
            path: state.path.clone(),
            wrapped,
            block_id: state.block_id.clone(),
            precision: state.precision.clone(),
        }
    }

    /// The same state, tracking the given predicates from now on.
    pub fn with_precision(
        &self,
        state: &AbstractionState<A::State>,
        precision: BTreeSet<Expression>,
    ) -> AbstractionState<A::State> {
        AbstractionState {
            precision,
            ..state.clone()
        }
    }
}

impl<A: ProgramAnalysis> ProgramAnalysis for AbstractionAnalysis<A> {
    type State = AbstractionState<A::State>;

    fn abstract_succ(&self, state: &Self::State) -> Result<Vec<Self::State>, Error> {
        if state.entering_summary.is_false() {
            return Ok(Vec::new());
        }
        Ok(self
            .wrapped
            .abstract_succ(&state.wrapped)?
            .into_iter()
            .map(|wrapped| self.rewrap(state, wrapped))
            .collect())
    }

    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        Ok(AbstractionState {
            entering_summary: self.domain.join(&a.entering_summary, &b.entering_summary)?,
            path: a.path.disjunction(&b.path),
            wrapped: self.wrapped.join(&a.wrapped, &b.wrapped)?,
            block_id: b.block_id.clone(),
            precision: a.precision.union(&b.precision).cloned().collect(),
        })
    }

    /// Only states of one block, entered with the same summary, merge. The
    /// wrapped analysis decides about the block's own data.
    fn should_merge(&self, a: &Self::State, b: &Self::State) -> Result<bool, Error> {
        Ok(a.block_id == b.block_id
            && a.precision == b.precision
            && a.entering_summary == b.entering_summary
            && self.wrapped.partition_key(&a.wrapped) == self.wrapped.partition_key(&b.wrapped)
            && self.wrapped.should_merge(&a.wrapped, &b.wrapped)?)
    }

    fn merge(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        let merged = AbstractionState {
            entering_summary: self.domain.join(&a.entering_summary, &b.entering_summary)?,
            path: a.path.disjunction(&b.path),
            wrapped: self.wrapped.merge(&a.wrapped, &b.wrapped)?,
            block_id: b.block_id.clone(),
            precision: b.precision.clone(),
        };
        if merged.entering_summary == b.entering_summary && merged.wrapped == b.wrapped {
            return Ok(b.clone());
        }
        Ok(merged)
    }

    /// Covered by a reached state of the same block whose summary includes
    /// this one. States with a false summary are unreachable and always
    /// covered.
    fn stop(&self, state: &Self::State, reached: &[&Self::State]) -> Result<bool, Error> {
        if state.entering_summary.is_false() {
            return Ok(true);
        }
        let summary = strip_versions(&state.entering_summary)?;
        for r in reached {
            if r.block_id != state.block_id {
                continue;
            }
            if self
                .domain
                .is_included(&summary, &strip_versions(&r.entering_summary)?)?
                && self.wrapped.stop(&state.wrapped, &[&r.wrapped])?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Summarize the completed block at abstraction points.
    fn widen(&self, state: &Self::State, _: &[&Self::State]) -> Result<Self::State, Error> {
        if !self.is_abstraction_point(state) {
            return Ok(state.clone());
        }

        let block = self.wrapped.state_formula(&state.wrapped)?;
        let predicates = state
            .precision
            .iter()
            .map(|predicate| self.wrapped.instantiate_predicate(&state.wrapped, predicate))
            .collect::<Result<BTreeSet<Expression>, Error>>()?;
        let summary = self
            .domain
            .widen(&state.entering_summary.conjunction(&block), &predicates)?;
        trace!("block summary {}", summary);

        let wrapped = self.wrapped.reset_path(&state.wrapped)?;
        Ok(AbstractionState {
            entering_summary: summary,
            path: state.path.conjunction(&block),
            block_id: self.wrapped.partition_key(&wrapped),
            wrapped,
            precision: state.precision.clone(),
        })
    }

    fn target(&self, state: &Self::State) -> BTreeSet<Property> {
        if state.entering_summary.is_false() {
            return BTreeSet::new();
        }
        self.wrapped.target(&state.wrapped)
    }

    fn initial_states_for(&self, task: &Task) -> Result<Vec<Self::State>, Error> {
        Ok(self
            .wrapped
            .initial_states_for(task)?
            .into_iter()
            .map(|wrapped| AbstractionState {
                entering_summary: Formula::top(),
                path: Formula::top(),
                block_id: self.wrapped.partition_key(&wrapped),
                wrapped,
                precision: BTreeSet::new(),
            })
            .collect())
    }

    fn partition_key(&self, state: &Self::State) -> PartitionKey {
        self.wrapped.partition_key(&state.wrapped)
    }

    fn state_formula(&self, state: &Self::State) -> Result<Formula, Error> {
        Ok(state
            .path
            .conjunction(&state.entering_summary)
            .conjunction(&self.wrapped.state_formula(&state.wrapped)?))
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
        self.wrapped.provenance(&state.wrapped)
    }
}

impl<A: ProgramAnalysis> WrappingAnalysis for AbstractionAnalysis<A> {
    type Wrapped = A;

    fn wrapped_analysis(&self) -> &A {
        &self.wrapped
    }

    fn unwrap<'s>(&self, state: &'s Self::State) -> &'s A::State {
        &state.wrapped
    }
}

impl<A: ProgramAnalysis + AnalysisLayer> AnalysisLayer for AbstractionAnalysis<A> {
    fn name(&self) -> &'static str {
        "AbstractionAnalysis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::REFINES_PRECISION | Capabilities::PROVIDES_FORMULA
    }

    fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer> {
        Some(&self.wrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::AbstractionType;
    use crate::solver::EnumerationSolver;
    use crate::task::{expr_int, expr_var};
    use crate::tests::Counter;
    use crate::RC;

    fn analysis() -> AbstractionAnalysis<Counter> {
        AbstractionAnalysis::new(
            Counter::new(5),
            PredicateAbstractionDomain::new(
                RC::new(EnumerationSolver::new(4)),
                AbstractionType::Boolean,
            ),
            AbstractionPoints::Always,
        )
    }

    fn initial(analysis: &AbstractionAnalysis<Counter>) -> AbstractionState<usize> {
        let task = Task::new("empty", Vec::new(), Vec::new()).unwrap();
        analysis.initial_states_for(&task).unwrap().remove(0)
    }

    #[test]
    fn widen_summarizes_the_block() {
        let analysis = analysis();
        let state = analysis.abstract_succ(&initial(&analysis)).unwrap().remove(0);
        assert_eq!(*state.wrapped(), 1);

        // the counter's formula is `n == 1`, with `n < 3` tracked
        let n = Variable::integer("n");
        let precision = vec![Expression::cmplt(expr_var(&n), expr_int(3)).unwrap()]
            .into_iter()
            .collect();
        let state = analysis.with_precision(&state, precision);
        let widened = analysis.widen(&state, &[]).unwrap();

        let expected = Formula::from_expression(
            &Expression::cmplt(expr_var(&n.with_version(1)), expr_int(3)).unwrap(),
        )
        .unwrap();
        assert_eq!(widened.entering_summary(), &expected);
        assert!(!widened.path().is_true());
        assert_eq!(widened.block_id(), &analysis.partition_key(&widened));
    }

    #[test]
    fn merging_needs_equal_summaries() {
        let analysis = analysis();
        let state = analysis.abstract_succ(&initial(&analysis)).unwrap().remove(0);
        assert!(analysis.should_merge(&state, &state.clone()).unwrap());

        let n = Variable::integer("n").with_version(1);
        let other = AbstractionState {
            entering_summary: Formula::from_expression(
                &Expression::cmplt(expr_var(&n), expr_int(3)).unwrap(),
            )
            .unwrap(),
            ..state.clone()
        };
        assert_eq!(other.wrapped(), state.wrapped());
        assert!(!analysis.should_merge(&other, &state).unwrap());
        assert!(!analysis.should_merge(&state, &other).unwrap());
    }

    #[test]
    fn false_summaries_end_the_path() {
        let analysis = analysis();
        let state = AbstractionState {
            entering_summary: Formula::bottom(),
            ..initial(&analysis)
        };
        assert!(analysis.abstract_succ(&state).unwrap().is_empty());
        assert!(analysis.stop(&state, &[]).unwrap());
    }

    #[test]
    fn stop_compares_summaries_without_versions() {
        let analysis = analysis();
        let n = Variable::integer("n");
        let weak = Formula::from_expression(
            &Expression::cmplt(expr_var(&n.with_version(1)), expr_int(3)).unwrap(),
        )
        .unwrap();
        let n4 = n.with_version(4);
        let strong = Formula::from_expression(
            &Expression::and(
                Expression::cmplt(expr_var(&n4), expr_int(3)).unwrap(),
                Expression::cmpeq(expr_var(&n4), expr_int(1)).unwrap(),
            )
            .unwrap(),
        )
        .unwrap();

        let reached = AbstractionState {
            entering_summary: weak,
            ..initial(&analysis)
        };
        let state = AbstractionState {
            entering_summary: strong,
            ..initial(&analysis)
        };
        assert!(analysis.stop(&state, &[&reached]).unwrap());
        assert!(!analysis.stop(&reached, &[&state]).unwrap());
    }
}
