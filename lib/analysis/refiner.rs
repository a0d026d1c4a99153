//! Feasibility checks of target states, and precision refinement.

use log::{debug, info};
use std::collections::BTreeSet;

use crate::analysis::{
    AbstractionAnalysis, AbstractionState, AccessibilityRelation, FrontierSet, ProgramAnalysis,
    ReachedSet, StateSet,
};
use crate::lattice::Model;
use crate::solver::{SatResult, Solver};
use crate::task::{Expression, Variable};
use crate::{Error, RC};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Feasibility {
    /// The path to the target is possible in the program. The model assigns
    /// the versioned variables of the path.
    Feasible(Model),
    /// The target was only reached because of imprecision.
    Infeasible,
    /// The check could not decide, for the given reason.
    Inconclusive(String),
}

pub trait Refiner<S> {
    fn check_is_feasible(
        &self,
        reached: &ReachedSet<S>,
        accessibility: &AccessibilityRelation,
        state: &S,
    ) -> Result<Feasibility, Error>;

    /// Make the analysis precise enough to exclude the infeasible path to
    /// `state`. Returns false if no progress could be made.
    fn refine_precision(
        &self,
        frontier: &mut FrontierSet<S>,
        reached: &mut ReachedSet<S>,
        state: &S,
    ) -> Result<bool, Error>;
}

fn feasibility_of<A: ProgramAnalysis>(
    analysis: &A,
    solver: &dyn Solver,
    state: &A::State,
) -> Result<Feasibility, Error> {
    let formula = analysis.state_formula(state)?;
    Ok(match solver.check(&formula)? {
        SatResult::Sat => {
            Feasibility::Feasible(solver.model(&formula)?.unwrap_or_default())
        }
        SatResult::Unsat => Feasibility::Infeasible,
        SatResult::Unknown => {
            Feasibility::Inconclusive("solver could not decide path feasibility".to_string())
        }
    })
}

/// Checks the formula the analysis keeps for a target. Cannot refine.
pub struct DataRefiner<'a, A> {
    analysis: &'a A,
    solver: RC<dyn Solver>,
}

impl<'a, A: ProgramAnalysis> DataRefiner<'a, A> {
    pub fn new(analysis: &'a A, solver: RC<dyn Solver>) -> DataRefiner<'a, A> {
        DataRefiner { analysis, solver }
    }
}

impl<'a, A: ProgramAnalysis> Refiner<A::State> for DataRefiner<'a, A> {
    fn check_is_feasible(
        &self,
        _: &ReachedSet<A::State>,
        _: &AccessibilityRelation,
        state: &A::State,
    ) -> Result<Feasibility, Error> {
        feasibility_of(self.analysis, self.solver.as_ref(), state)
    }

    fn refine_precision(
        &self,
        _: &mut FrontierSet<A::State>,
        _: &mut ReachedSet<A::State>,
        _: &A::State,
    ) -> Result<bool, Error> {
        Err(Error::Unsupported(
            "data analyses have no precision to refine".to_string(),
        ))
    }
}

/// Refines the predicates of an `AbstractionAnalysis` with the atoms of an
/// infeasible path, then restarts the search from the initial states.
pub struct AbstractionRefiner<'a, A> {
    analysis: &'a AbstractionAnalysis<A>,
    solver: RC<dyn Solver>,
}

impl<'a, A: ProgramAnalysis> AbstractionRefiner<'a, A> {
    pub fn new(
        analysis: &'a AbstractionAnalysis<A>,
        solver: RC<dyn Solver>,
    ) -> AbstractionRefiner<'a, A> {
        AbstractionRefiner { analysis, solver }
    }

    /// The atoms of the path to `state`, without SSA versions.
    fn interpolants(&self, state: &AbstractionState<A::State>) -> Result<BTreeSet<Expression>, Error> {
        let formula = self.analysis.state_formula(state)?;
        Ok(formula
            .atoms()
            .into_iter()
            .filter(|atom| !atom.variables().is_empty())
            .map(|atom| atom.rename(&|variable: &Variable| variable.base()))
            .collect())
    }
}

impl<'a, A: ProgramAnalysis> Refiner<AbstractionState<A::State>> for AbstractionRefiner<'a, A> {
    fn check_is_feasible(
        &self,
        _: &ReachedSet<AbstractionState<A::State>>,
        _: &AccessibilityRelation,
        state: &AbstractionState<A::State>,
    ) -> Result<Feasibility, Error> {
        feasibility_of(self.analysis, self.solver.as_ref(), state)
    }

    fn refine_precision(
        &self,
        frontier: &mut FrontierSet<AbstractionState<A::State>>,
        reached: &mut ReachedSet<AbstractionState<A::State>>,
        state: &AbstractionState<A::State>,
    ) -> Result<bool, Error> {
        let new_predicates: BTreeSet<Expression> = self
            .interpolants(state)?
            .into_iter()
            .filter(|predicate| !state.precision().contains(predicate))
            .collect();
        if new_predicates.is_empty() {
            debug!("refinement found no new predicates");
            return Ok(false);
        }

        let mut initial_states = Vec::new();
        for reached_state in reached.iter() {
            let provenance = self.analysis.provenance(reached_state).ok_or_else(|| {
                Error::Precondition("refinement needs provenance tracking".to_string())
            })?;
            if provenance.predecessors.is_empty() {
                initial_states.push(reached_state.clone());
            }
        }
        if initial_states.is_empty() {
            return Err(Error::InvariantViolation(
                "no initial state left to restart from".to_string(),
            ));
        }

        let precision: BTreeSet<Expression> = state
            .precision()
            .union(&new_predicates)
            .cloned()
            .collect();
        info!(
            "refined precision with {} predicates, {} in total",
            new_predicates.len(),
            precision.len()
        );

        let all: Vec<AbstractionState<A::State>> = reached.iter().cloned().collect();
        reached.remove_all(&all);
        frontier.clear();
        for initial in initial_states {
            let refined = self.analysis.with_precision(&initial, precision.clone());
            reached.add(refined.clone());
            frontier.add(refined);
        }
        Ok(true)
    }
}
