//! The reachability algorithm, and the standard verification run.
//!
//! States are expanded in first-in first-out order. Every successor is
//! widened, merged into the reached states of its partition, checked for
//! coverage, and admitted. Admitted target states are checked for
//! feasibility: a feasible target ends the run with a witness, an infeasible
//! one refines the precision and restarts the search.

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::analysis::{
    extract_wrapped_analysis, layer_names, AbstractionAnalysis, AbstractionRefiner,
    AccessibilityRelation, AnalysisConfig, AnalysisContext, AnalysisLayer, AnalysisStatistics,
    Capabilities, ControlAnalysis, DataDomain, ErrorWitness, Feasibility, FrontierSet,
    GraphAnalysis, LabelAnalysis, LabeledTransferRelation, MergeIntoOperator, ProgramAnalysis,
    ReachabilityOptions, ReachedSet, Refiner, SoundnessCaveat, SsaAnalysis, StandardMergeInto,
    StateSet, StatsAnalysis, SymemAnalysis, ValueAnalysis, WrappingAnalysis,
};
use crate::lattice::PredicateAbstractionDomain;
use crate::solver::Solver;
use crate::task::{Property, Task};
use crate::{Error, RC};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum Verdict {
    /// No property violation is reachable.
    Safe,
    /// A feasible path violates the given properties.
    Unsafe {
        properties: BTreeSet<Property>,
        witness: ErrorWitness,
    },
    /// Neither could be shown.
    Inconclusive { reason: String },
}

impl Verdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, Verdict::Safe)
    }

    pub fn is_unsafe(&self) -> bool {
        matches!(self, Verdict::Unsafe { .. })
    }

    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Verdict::Inconclusive { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Safe => write!(f, "safe"),
            Verdict::Unsafe { properties, .. } => {
                let names: Vec<&str> = properties.iter().map(|p| p.name()).collect();
                write!(f, "unsafe ({})", names.join(", "))
            }
            Verdict::Inconclusive { reason } => write!(f, "inconclusive: {}", reason),
        }
    }
}

/// The outcome of `verify`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisResult {
    verdict: Verdict,
    caveats: BTreeSet<SoundnessCaveat>,
    statistics: AnalysisStatistics,
}

impl AnalysisResult {
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// Constructs modelled unsoundly during the run. The verdict only holds
    /// under these caveats.
    pub fn caveats(&self) -> &BTreeSet<SoundnessCaveat> {
        &self.caveats
    }

    pub fn statistics(&self) -> &AnalysisStatistics {
        &self.statistics
    }

    /// Returns true if the verdict is qualified by soundness caveats.
    pub fn is_qualified(&self) -> bool {
        !self.caveats.is_empty()
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReachabilityOutcome {
    pub verdict: Verdict,
    pub refinements: usize,
    pub reached_states: usize,
}

/// Run the reachability algorithm from the initial states of `task`.
pub fn reachability<A, R>(
    analysis: &A,
    refiner: &R,
    task: &Task,
    options: &ReachabilityOptions,
) -> Result<ReachabilityOutcome, Error>
where
    A: ProgramAnalysis,
    R: Refiner<A::State>,
{
    let mut reached = ReachedSet::new(|state: &A::State| analysis.partition_key(state));
    let mut frontier = FrontierSet::new(|state: &A::State| analysis.partition_key(state));
    let merge_into = StandardMergeInto::new(analysis);

    for state in analysis.initial_states_for(task)? {
        reached.add(state.clone());
        frontier.add(state);
    }

    let mut refinements = 0;
    let mut inconclusive = Vec::new();
    let outcome = |verdict: Verdict, refinements: usize, reached_states: usize| {
        ReachabilityOutcome {
            verdict,
            refinements,
            reached_states,
        }
    };

    'search: while let Some(state) = frontier.pop() {
        trace!(
            "expanding state, {} reached, {} waiting",
            reached.len(),
            frontier.len()
        );
        for successor in analysis.abstract_succ(&state)? {
            if reached.len() >= options.max_states() {
                warn!("state budget of {} exhausted", options.max_states());
                return Ok(outcome(
                    Verdict::Inconclusive {
                        reason: "state budget exhausted".to_string(),
                    },
                    refinements,
                    reached.len(),
                ));
            }

            let successor = analysis.widen(&successor, &reached.partition_of(&successor))?;
            merge_into.merge_into(&successor, &mut frontier, &mut reached)?;
            if analysis.stop(&successor, &reached.partition_of(&successor))? {
                continue;
            }
            reached.add(successor.clone());

            let properties = analysis.target(&successor);
            if properties.is_empty() {
                frontier.add(successor);
                continue;
            }

            let accessibility = AccessibilityRelation::from_reached(analysis, &reached)?;
            match refiner.check_is_feasible(&reached, &accessibility, &successor)? {
                Feasibility::Feasible(model) => {
                    let witness = ErrorWitness::build(
                        analysis,
                        task,
                        &reached,
                        &accessibility,
                        &successor,
                        &properties,
                        &model,
                    )?;
                    return Ok(outcome(
                        Verdict::Unsafe {
                            properties,
                            witness,
                        },
                        refinements,
                        reached.len(),
                    ));
                }
                Feasibility::Infeasible => {
                    if refinements >= options.max_refinements() {
                        return Ok(outcome(
                            Verdict::Inconclusive {
                                reason: "refinement budget exhausted".to_string(),
                            },
                            refinements,
                            reached.len(),
                        ));
                    }
                    refinements += 1;
                    debug!("spurious target, refinement {}", refinements);
                    if !refiner.refine_precision(&mut frontier, &mut reached, &successor)? {
                        return Ok(outcome(
                            Verdict::Inconclusive {
                                reason: "refinement found no new predicates".to_string(),
                            },
                            refinements,
                            reached.len(),
                        ));
                    }
                    continue 'search;
                }
                Feasibility::Inconclusive(reason) => {
                    warn!("target feasibility undecided: {}", reason);
                    inconclusive.push(reason);
                }
            }
        }
    }

    let verdict = match inconclusive.into_iter().next() {
        Some(reason) => Verdict::Inconclusive { reason },
        None => Verdict::Safe,
    };
    Ok(outcome(verdict, refinements, reached.len()))
}

fn run<D>(
    task: RC<Task>,
    context: RC<AnalysisContext>,
    solver: RC<dyn Solver>,
    config: &AnalysisConfig,
    data: D,
) -> Result<(Verdict, AnalysisStatistics), Error>
where
    D: LabeledTransferRelation + AnalysisLayer,
{
    let control = ControlAnalysis::new(
        task.clone(),
        context.clone(),
        config.control().clone(),
        LabelAnalysis::new(SsaAnalysis::new(data)),
    )?;
    let domain =
        PredicateAbstractionDomain::new(solver.clone(), config.abstraction().abstraction_type()?);
    let analysis = StatsAnalysis::new(AbstractionAnalysis::new(
        GraphAnalysis::new(control, context),
        domain,
        config.abstraction().abstraction_points(),
    ));
    debug!("analysis chain: {}", layer_names(&analysis).join(" > "));

    if extract_wrapped_analysis(&analysis, |layer| {
        layer
            .capabilities()
            .contains(Capabilities::TRACKS_PROVENANCE)
    })
    .is_none()
    {
        return Err(Error::Precondition(
            "no layer tracks provenance for witnesses".to_string(),
        ));
    }

    let refiner = AbstractionRefiner::new(analysis.wrapped_analysis(), solver);
    let outcome = reachability(&analysis, &refiner, &task, config.reachability())?;

    let mut statistics = analysis.statistics();
    statistics.refinements = outcome.refinements as u64;
    statistics.reached_states = outcome.reached_states as u64;
    Ok((outcome.verdict, statistics))
}

/// Verify `task` with the standard chain of analyses.
///
/// A run that reaches a feature which is not modelled ends inconclusive.
/// Every other error is returned.
pub fn verify(task: &Task, config: &AnalysisConfig) -> Result<AnalysisResult, Error> {
    let task = RC::new(task.clone());
    let context = RC::new(AnalysisContext::new());
    let solver = config.solver().create();

    let data = config.data();
    let result = match data.domain() {
        DataDomain::Symbolic => run(
            task.clone(),
            context.clone(),
            solver,
            config,
            SymemAnalysis::new(data.merge_operator())?,
        ),
        DataDomain::Value => run(
            task.clone(),
            context.clone(),
            solver,
            config,
            ValueAnalysis::new(data.merge_operator())?,
        ),
    };

    let (verdict, statistics) = match result {
        Ok(result) => result,
        Err(e) if e.is_unimplemented() => {
            warn!("{}", e);
            (
                Verdict::Inconclusive {
                    reason: e.to_string(),
                },
                AnalysisStatistics::default(),
            )
        }
        Err(e) => return Err(e),
    };

    let result = AnalysisResult {
        verdict,
        caveats: context.caveats(),
        statistics,
    };
    info!("{}: {}", task.name(), result.verdict());
    info!("{:?}", result.statistics());
    Ok(result)
}
