use std::collections::BTreeSet;

use crate::analysis::control::{ComputationState, ControlState, ThreadState};
use crate::analysis::{
    verify, AbstractionPoints, AnalysisConfig, AnalysisContext, AnalysisResult, ControlAnalysis,
    ControlOptions, DataDomain, ErrorWitness, LabelAnalysis, Mock, PartitionKey, ProgramAnalysis,
    Provenance, ReachedSet, SoundnessCaveat, SsaAnalysis, StateSet, ValueAnalysis, Verdict,
};
use crate::lattice::Formula;
use crate::task::{
    expr_int, expr_var, Actor, Event, Expression, LocationId, Method, Operation, OperationId,
    Property, Script, ScriptId, Statement, Task, TransitionRelation, Variable,
};
use crate::{Error, RC};

/// A script whose entry is the head of its first transition.
pub(crate) fn script(
    id: ScriptId,
    event: Event,
    transitions: &[(LocationId, OperationId, LocationId)],
) -> Script {
    let entry = transitions[0].0;
    Script::new(
        id,
        event,
        TransitionRelation::from_transitions(&[entry], transitions).unwrap(),
    )
}

pub(crate) fn actor(name: &str, observer: bool, scripts: Vec<Script>) -> Actor {
    let mut actor = Actor::new(name, observer);
    for script in scripts {
        actor.add_script(script).unwrap();
    }
    actor
}

pub(crate) fn thread_states<S>(state: &ControlState<S>) -> Vec<ComputationState> {
    state.threads().iter().map(ThreadState::computation).collect()
}

pub(crate) type ValueControlAnalysis = ControlAnalysis<LabelAnalysis<SsaAnalysis<ValueAnalysis>>>;

pub(crate) fn control_analysis(
    task: &Task,
    options: ControlOptions,
) -> Result<(ValueControlAnalysis, RC<AnalysisContext>), Error> {
    let context = RC::new(AnalysisContext::new());
    let analysis = ControlAnalysis::new(
        RC::new(task.clone()),
        context.clone(),
        options,
        LabelAnalysis::new(SsaAnalysis::new(ValueAnalysis::new("SEP")?)),
    )?;
    Ok((analysis, context))
}

pub(crate) fn value_control_analysis(task: &Task) -> (ValueControlAnalysis, RC<AnalysisContext>) {
    control_analysis(task, ControlOptions::new()).unwrap()
}

/// Counts from zero up to a limit, one state per number.
///
/// The formula of state `n` is `n@n == n`.
pub(crate) struct Counter {
    limit: usize,
}

impl Counter {
    pub(crate) fn new(limit: usize) -> Counter {
        Counter { limit }
    }

    fn variable(n: usize) -> Variable {
        Variable::integer("n").with_version(n)
    }
}

impl ProgramAnalysis for Counter {
    type State = usize;

    fn abstract_succ(&self, state: &usize) -> Result<Vec<usize>, Error> {
        if *state < self.limit {
            Ok(vec![state + 1])
        } else {
            Ok(Vec::new())
        }
    }

    fn join(&self, a: &usize, b: &usize) -> Result<usize, Error> {
        Ok(*a.max(b))
    }

    fn should_merge(&self, a: &usize, b: &usize) -> Result<bool, Error> {
        Ok(a == b)
    }

    fn merge(&self, _: &usize, b: &usize) -> Result<usize, Error> {
        Ok(*b)
    }

    fn stop(&self, state: &usize, reached: &[&usize]) -> Result<bool, Error> {
        Ok(reached.iter().any(|r| *r == state))
    }

    fn widen(&self, state: &usize, _: &[&usize]) -> Result<usize, Error> {
        Ok(*state)
    }

    fn target(&self, _: &usize) -> BTreeSet<Property> {
        BTreeSet::new()
    }

    fn initial_states_for(&self, _: &Task) -> Result<Vec<usize>, Error> {
        Ok(vec![0])
    }

    fn state_formula(&self, state: &usize) -> Result<Formula, Error> {
        Formula::from_expression(&Expression::cmpeq(
            expr_var(&Counter::variable(*state)),
            expr_int(*state),
        )?)
    }

    fn instantiate_predicate(
        &self,
        state: &usize,
        predicate: &Expression,
    ) -> Result<Expression, Error> {
        Ok(predicate.rename(&|variable: &Variable| variable.with_version(*state)))
    }
}

/// States that are their own provenance.
pub(crate) struct Tracked;

impl ProgramAnalysis for Tracked {
    type State = Provenance;

    fn abstract_succ(&self, _: &Provenance) -> Result<Vec<Provenance>, Error> {
        Ok(Vec::new())
    }

    fn join(&self, _: &Provenance, b: &Provenance) -> Result<Provenance, Error> {
        Ok(b.clone())
    }

    fn should_merge(&self, _: &Provenance, _: &Provenance) -> Result<bool, Error> {
        Ok(false)
    }

    fn merge(&self, _: &Provenance, b: &Provenance) -> Result<Provenance, Error> {
        Ok(b.clone())
    }

    fn stop(&self, state: &Provenance, reached: &[&Provenance]) -> Result<bool, Error> {
        Ok(reached.iter().any(|r| *r == state))
    }

    fn widen(&self, state: &Provenance, _: &[&Provenance]) -> Result<Provenance, Error> {
        Ok(state.clone())
    }

    fn target(&self, _: &Provenance) -> BTreeSet<Property> {
        BTreeSet::new()
    }

    fn initial_states_for(&self, _: &Task) -> Result<Vec<Provenance>, Error> {
        Ok(Vec::new())
    }

    fn provenance(&self, state: &Provenance) -> Option<Provenance> {
        Some(state.clone())
    }
}

/// A script that calls a method signalling failure of `P`, next to a second
/// script doing nothing.
fn failing_method_task() -> Task {
    let mut stage = actor("Stage", false, vec![script(0, Event::Bootstrap, &[(10, 1, 11)])]);
    stage
        .add_method(Method::new(
            "check",
            Vec::new(),
            TransitionRelation::from_transitions(&[50], &[(50, 2, 51)]).unwrap(),
        ))
        .unwrap();
    Task::new(
        "failing method",
        vec![
            stage,
            actor("Sprite", false, vec![script(0, Event::Bootstrap, &[(20, 3, 21)])]),
        ],
        vec![
            Operation::new(1, Statement::call("check", Vec::new(), None)),
            Operation::new(2, Statement::signal_failure(vec![Property::new("P")])),
            Operation::new(3, Statement::Nop),
        ],
    )
    .unwrap()
}

/// `x := 1; assume x == 2; fail P`, which never fails.
fn guarded_failure_task() -> Task {
    let x = Variable::integer("Sprite.x");
    Task::new(
        "guarded failure",
        vec![actor(
            "Sprite",
            false,
            vec![script(
                0,
                Event::Bootstrap,
                &[(10, 1, 11), (11, 2, 12), (12, 3, 13), (13, 4, 14)],
            )],
        )],
        vec![
            Operation::new(1, Statement::Declare(x.clone())),
            Operation::new(2, Statement::assign(x.clone(), expr_int(1))),
            Operation::new(
                3,
                Statement::Assume(Expression::cmpeq(expr_var(&x), expr_int(2)).unwrap()),
            ),
            Operation::new(4, Statement::signal_failure(vec![Property::new("P")])),
        ],
    )
    .unwrap()
}

/// `r := inc(1); assume r == expected; fail P`, where `inc(a)` returns
/// `a + 1`.
fn increment_task(expected: i64) -> Task {
    let a = Variable::integer("Sprite.a");
    let r = Variable::integer("Sprite.r");
    let mut sprite = actor(
        "Sprite",
        false,
        vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 2, 12), (12, 3, 13)])],
    );
    sprite
        .add_method(Method::new(
            "inc",
            vec![a.clone()],
            TransitionRelation::from_transitions(&[50], &[(50, 4, 51)]).unwrap(),
        ))
        .unwrap();
    Task::new(
        "increment",
        vec![sprite],
        vec![
            Operation::new(1, Statement::call("inc", vec![expr_int(1)], Some(r.clone()))),
            Operation::new(
                2,
                Statement::Assume(Expression::cmpeq(expr_var(&r), expr_int(expected)).unwrap()),
            ),
            Operation::new(3, Statement::signal_failure(vec![Property::new("P")])),
            Operation::new(
                4,
                Statement::Return(Some(Expression::add(expr_var(&a), expr_int(1)).unwrap())),
            ),
        ],
    )
    .unwrap()
}

fn unsafe_witness(result: &AnalysisResult) -> &ErrorWitness {
    match result.verdict() {
        Verdict::Unsafe { witness, .. } => witness,
        verdict => panic!("expected unsafe, got {}", verdict),
    }
}

fn config(domain: DataDomain) -> AnalysisConfig {
    let mut config = AnalysisConfig::new();
    config.data_mut().set_domain(domain);
    config
}

#[test]
fn failing_method_is_unsafe() {
    for domain in &[DataDomain::Symbolic, DataDomain::Value] {
        let task = failing_method_task();
        let result = verify(&task, &config(*domain)).unwrap();

        let (properties, witness) = match result.verdict() {
            Verdict::Unsafe {
                properties,
                witness,
            } => (properties, witness),
            verdict => panic!("expected unsafe, got {}", verdict),
        };
        assert!(properties.contains(&Property::new("P")));
        assert_eq!(witness.program_name, "failing method");
        assert_eq!(witness.violations, vec!["P".to_string()]);

        // initial, call, the other script's step, failure
        assert_eq!(witness.steps.len(), 4);
        assert_eq!(witness.steps[0].action, "initial");
        assert!(witness.steps[3].action.contains("signal"));
        let timestamps: Vec<usize> = witness.steps.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![0, 1, 2, 3]);

        assert!(result
            .caveats()
            .contains(&SoundnessCaveat::WorkTimeBudgetIgnored));
        assert!(result.is_qualified());
    }
}

#[test]
fn infeasible_failure_is_refined_away() {
    for domain in &[DataDomain::Symbolic, DataDomain::Value] {
        let result = verify(&guarded_failure_task(), &config(*domain)).unwrap();
        assert_eq!(result.verdict(), &Verdict::Safe);
        assert_eq!(result.statistics().refinements, 1);
        assert!(!result.is_qualified());
    }
}

#[test]
fn refinement_budget() {
    let mut config = config(DataDomain::Symbolic);
    config.reachability_mut().set_max_refinements(0);
    let result = verify(&guarded_failure_task(), &config).unwrap();
    assert!(result.verdict().is_inconclusive());
}

#[test]
fn state_budget() {
    let mut config = config(DataDomain::Symbolic);
    config.reachability_mut().set_max_states(2);
    let result = verify(&guarded_failure_task(), &config).unwrap();
    assert_eq!(
        result.verdict(),
        &Verdict::Inconclusive {
            reason: "state budget exhausted".to_string()
        }
    );
}

#[test]
fn unimplemented_features_are_inconclusive() {
    let mut config = config(DataDomain::Value);
    config.control_mut().set_aggregate_atomic_transitions(true);
    let result = verify(&failing_method_task(), &config).unwrap();
    assert!(result.verdict().is_inconclusive());
}

#[test]
fn configuration_errors_propagate() {
    let mut config = config(DataDomain::Value);
    config.data_mut().set_merge_operator("WIDEN");
    assert!(matches!(
        verify(&failing_method_task(), &config),
        Err(Error::IllegalArgument(_))
    ));
}

#[test]
fn reached_states_partition_by_location() {
    let task = failing_method_task();
    let (analysis, _) = value_control_analysis(&task);
    let mut reached = ReachedSet::new(|state: &ControlState<_>| analysis.partition_key(state));

    let initial = analysis.initial_states_for(&task).unwrap().remove(0);
    let successor = analysis.abstract_succ(&initial).unwrap().remove(0);
    reached.add(initial.clone());
    reached.add(successor.clone());

    assert_ne!(
        analysis.partition_key(&initial),
        analysis.partition_key(&successor)
    );
    assert_eq!(reached.partition_of(&initial), vec![&initial]);
    assert_eq!(reached.partition_keys().count(), 2);
    assert!(reached
        .partition_keys()
        .all(|key| key != &PartitionKey::default()));
}

#[test]
fn returned_values_reach_the_path_formula() {
    for domain in &[DataDomain::Symbolic, DataDomain::Value] {
        let result = verify(&increment_task(3), &config(*domain)).unwrap();
        assert_eq!(result.verdict(), &Verdict::Safe, "{:?}", domain);

        let result = verify(&increment_task(2), &config(*domain)).unwrap();
        let witness = unsafe_witness(&result);
        let last = witness.steps.last().unwrap();
        let sprite = last.actors.iter().find(|a| a.name == "Sprite").unwrap();
        assert_eq!(sprite.variables.get("r"), Some(&serde_json::Value::from(2)));
        assert_eq!(sprite.variables.get("a"), Some(&serde_json::Value::from(1)));
        assert!(witness.mocks.is_empty());
    }
}

#[test]
fn undeclared_reads_are_mocked() {
    let answer = Variable::integer("Sprite.answer");
    let task = Task::new(
        "input",
        vec![actor(
            "Sprite",
            false,
            vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 2, 12)])],
        )],
        vec![
            Operation::new(
                1,
                Statement::Assume(Expression::cmpeq(expr_var(&answer), expr_int(7)).unwrap()),
            ),
            Operation::new(2, Statement::signal_failure(vec![Property::new("P")])),
        ],
    )
    .unwrap();

    for domain in &[DataDomain::Symbolic, DataDomain::Value] {
        let result = verify(&task, &config(*domain)).unwrap();
        let witness = unsafe_witness(&result);
        let mut assignments = std::collections::BTreeMap::new();
        assignments.insert("answer".to_string(), serde_json::Value::from(7));
        assert_eq!(
            witness.mocks,
            vec![Mock::ActorAssignments {
                actor: "Sprite".to_string(),
                assignments: vec![assignments],
            }]
        );
    }
}

#[test]
fn loops_converge_at_loop_heads() {
    let x = Variable::integer("Sprite.x");
    let below = Expression::cmplt(expr_var(&x), expr_int(3)).unwrap();
    let task = Task::new(
        "loop",
        vec![actor(
            "Sprite",
            false,
            vec![script(
                0,
                Event::Bootstrap,
                &[(10, 1, 11), (11, 2, 12), (12, 3, 11), (11, 4, 13), (13, 5, 14)],
            )],
        )],
        vec![
            Operation::new(1, Statement::Declare(x.clone())),
            Operation::new(2, Statement::Assume(below.clone())),
            Operation::new(
                3,
                Statement::assign(x.clone(), Expression::add(expr_var(&x), expr_int(1)).unwrap()),
            ),
            Operation::new(4, Statement::Assume(Expression::not(below).unwrap())),
            Operation::new(5, Statement::Nop),
        ],
    )
    .unwrap();

    for domain in &[DataDomain::Symbolic, DataDomain::Value] {
        let mut config = config(*domain);
        config
            .abstraction_mut()
            .set_abstraction_points(AbstractionPoints::LoopHeads);
        let result = verify(&task, &config).unwrap();
        assert_eq!(result.verdict(), &Verdict::Safe);
        assert!(result.statistics().states_covered > 0);
        assert!(result.statistics().reached_states < 20);
    }
}
