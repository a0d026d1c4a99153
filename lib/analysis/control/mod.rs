//! The scheduler: threads of control over the actors of a task.
//!
//! Every script entry location is one thread. A state of this analysis holds
//! the control state of all threads and one state of the analyses below it.
//! A successor steps exactly one thread by one transition, handing each of
//! the transition's operations to the wrapped analysis as a
//! `LabeledOperation`.
//!
//! Observer threads take priority: while an observer can move, no program
//! thread steps. Of the program threads, exactly one runs at a time, and it
//! yields after every transition unless it is inside an atomic method.

use log::{trace, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{
    AnalysisContext, AnalysisLayer, Capabilities, ControlOptions, LabeledOperation,
    LabeledTransferRelation, PartitionKey, ProgramAnalysis, Transfer, WrappingAnalysis,
};
use crate::lattice::Formula;
use crate::task::{Constant, Expression, Property, Task, Variable};
use crate::{Error, RC};

mod state;
mod transfer;

pub use self::state::*;
pub use self::transfer::ControlTransferRelation;

pub struct ControlAnalysis<A> {
    wrapped: A,
    transfer: ControlTransferRelation,
    context: RC<AnalysisContext>,
}

impl<A: LabeledTransferRelation> ControlAnalysis<A> {
    pub fn new(
        task: RC<Task>,
        context: RC<AnalysisContext>,
        options: ControlOptions,
        wrapped: A,
    ) -> Result<ControlAnalysis<A>, Error> {
        if options.aggregate_atomic_transitions() {
            return Err(Error::Unimplemented(
                "aggregation of atomic transitions".to_string(),
            ));
        }
        Ok(ControlAnalysis {
            wrapped,
            transfer: ControlTransferRelation::new(task, context.clone(), options),
            context,
        })
    }

    pub fn transfer_relation(&self) -> &ControlTransferRelation {
        &self.transfer
    }

    fn target_for(threads: &[ThreadState]) -> BTreeSet<Property> {
        threads
            .iter()
            .flat_map(|t| t.failed_for().iter().cloned())
            .collect()
    }
}

impl<A: LabeledTransferRelation> ProgramAnalysis for ControlAnalysis<A> {
    type State = ControlState<A::State>;

    fn abstract_succ(&self, state: &Self::State) -> Result<Vec<Self::State>, Error> {
        let index = match self.transfer.choose_observer(&state.threads)? {
            Some(index) => index,
            None => match self.transfer.choose_thread_to_step(&state.threads)? {
                Some(index) => index,
                None => {
                    trace!("no thread can step");
                    return Ok(Vec::new());
                }
            },
        };
        let thread = &state.threads[index];
        let big_step = self.context.big_steps().allocate();

        let mut successors = Vec::new();
        for step in self.transfer.leaving_steps(thread)? {
            let mut wrapped = vec![state.wrapped.clone()];
            for (i, (operation, statement)) in step.operations.iter().enumerate() {
                let operation = LabeledOperation {
                    thread: thread.thread_id(),
                    operation: *operation,
                    statement: statement.clone(),
                    big_step,
                    step_start: i == 0,
                };
                let mut next = Vec::new();
                for w in &wrapped {
                    next.extend(self.wrapped.abstract_succ_for(w, &operation)?);
                }
                wrapped = next;
            }
            if wrapped.is_empty() {
                continue;
            }

            let mut threads = state.threads.clone();
            self.transfer.apply(&mut threads, index, &step)?;
            let target_for = Self::target_for(&threads);
            for w in wrapped {
                successors.push(ControlState {
                    threads: threads.clone(),
                    wrapped: w,
                    target_for: target_for.clone(),
                });
            }
        }
        Ok(successors)
    }

    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        if a.threads != b.threads {
            return Err(Error::Unsupported(
                "joining control states with different threads".to_string(),
            ));
        }
        Ok(ControlState {
            threads: b.threads.clone(),
            wrapped: self.wrapped.join(&a.wrapped, &b.wrapped)?,
            target_for: a.target_for.union(&b.target_for).cloned().collect(),
        })
    }

    fn should_merge(&self, a: &Self::State, b: &Self::State) -> Result<bool, Error> {
        Ok(a.threads == b.threads && self.wrapped.should_merge(&a.wrapped, &b.wrapped)?)
    }

    fn merge(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        if a.threads != b.threads {
            return Ok(b.clone());
        }
        Ok(ControlState {
            threads: b.threads.clone(),
            wrapped: self.wrapped.merge(&a.wrapped, &b.wrapped)?,
            target_for: a.target_for.union(&b.target_for).cloned().collect(),
        })
    }

    fn stop(&self, state: &Self::State, reached: &[&Self::State]) -> Result<bool, Error> {
        for r in reached {
            if r.threads == state.threads && self.wrapped.stop(&state.wrapped, &[&r.wrapped])? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn widen(&self, state: &Self::State, reached: &[&Self::State]) -> Result<Self::State, Error> {
        Ok(ControlState {
            threads: state.threads.clone(),
            wrapped: self.wrapped.widen(&state.wrapped, &self.unwrap_all(reached))?,
            target_for: state.target_for.clone(),
        })
    }

    fn target(&self, state: &Self::State) -> BTreeSet<Property> {
        state.target_for.clone()
    }

    fn initial_states_for(&self, task: &Task) -> Result<Vec<Self::State>, Error> {
        let threads = self.transfer.initial_threads()?;
        let target_for = Self::target_for(&threads);
        Ok(self
            .wrapped
            .initial_states_for(task)?
            .into_iter()
            .map(|wrapped| ControlState {
                threads: threads.clone(),
                wrapped,
                target_for: target_for.clone(),
            })
            .collect())
    }

    /// The location and computation state of every thread.
    fn partition_key(&self, state: &Self::State) -> PartitionKey {
        let mut key = Vec::with_capacity(state.threads.len() * 2);
        for thread in &state.threads {
            key.push(thread.location());
            key.push(thread.computation().code());
        }
        PartitionKey::new(key)
    }

    fn state_formula(&self, state: &Self::State) -> Result<Formula, Error> {
        self.wrapped.state_formula(&state.wrapped)
    }

    fn reset_path(&self, state: &Self::State) -> Result<Self::State, Error> {
        Ok(ControlState {
            threads: state.threads.clone(),
            wrapped: self.wrapped.reset_path(&state.wrapped)?,
            target_for: state.target_for.clone(),
        })
    }

    fn is_loop_head(&self, state: &Self::State) -> bool {
        state.threads.iter().any(|thread| {
            if !thread.computation().is_active() {
                return false;
            }
            match self.transfer.relation_of(thread) {
                Ok(relation) => relation.is_loop_head(thread.location()),
                Err(e) => {
                    warn!("no transition relation for thread {}: {}", thread.thread_id(), e);
                    false
                }
            }
        })
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
}

impl<A: LabeledTransferRelation> WrappingAnalysis for ControlAnalysis<A> {
    type Wrapped = A;

    fn wrapped_analysis(&self) -> &A {
        &self.wrapped
    }

    fn unwrap<'s>(&self, state: &'s Self::State) -> &'s A::State {
        &state.wrapped
    }
}

impl<A: LabeledTransferRelation + AnalysisLayer> AnalysisLayer for ControlAnalysis<A> {
    fn name(&self) -> &'static str {
        "ControlAnalysis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SCHEDULES_THREADS
    }

    fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer> {
        Some(&self.wrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{SoundnessCaveat, WaitPolicy};
    use crate::task::{
        expr_bool, expr_int, expr_str, expr_var, Event, Method, Operation, Statement,
        TransitionRelation,
    };
    use crate::tests::{actor, control_analysis, script, thread_states, value_control_analysis};

    /// Three program scripts of two no-op transitions each.
    fn three_threads() -> Task {
        Task::new(
            "round robin",
            vec![
                actor("A", false, vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 1, 12)])]),
                actor("B", false, vec![script(0, Event::Bootstrap, &[(20, 1, 21), (21, 1, 22)])]),
                actor("C", false, vec![script(0, Event::Bootstrap, &[(30, 1, 31), (31, 1, 32)])]),
            ],
            vec![Operation::new(1, Statement::Nop)],
        )
        .unwrap()
    }

    fn step_once<A: LabeledTransferRelation>(
        analysis: &ControlAnalysis<A>,
        state: &ControlState<A::State>,
    ) -> ControlState<A::State> {
        let mut successors = analysis.abstract_succ(state).unwrap();
        assert_eq!(successors.len(), 1);
        successors.remove(0)
    }

    #[test]
    fn round_robin() {
        let task = three_threads();
        let (analysis, context) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);
        assert_eq!(
            thread_states(&initial),
            vec![
                ComputationState::Running,
                ComputationState::Yield,
                ComputationState::Yield
            ]
        );
        assert!(context.caveats().contains(&SoundnessCaveat::WorkTimeBudgetIgnored));

        let state = step_once(&analysis, &initial);
        assert_eq!(
            thread_states(&state),
            vec![
                ComputationState::Yield,
                ComputationState::Running,
                ComputationState::Yield
            ]
        );

        let state = step_once(&analysis, &state);
        assert_eq!(
            thread_states(&state),
            vec![
                ComputationState::Yield,
                ComputationState::Yield,
                ComputationState::Running
            ]
        );

        // C steps, A runs again; then A finishes and B takes over
        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[0].computation(), ComputationState::Running);
        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[0].computation(), ComputationState::Done);
        assert_eq!(state.threads()[1].computation(), ComputationState::Running);
        assert_eq!(state.threads()[0].location(), 12);
    }

    #[test]
    fn broadcast_restarts_receivers() {
        let task = Task::new(
            "broadcast",
            vec![
                actor("Sender", false, vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 2, 12)])]),
                actor(
                    "Receiver",
                    false,
                    vec![script(0, Event::MessageReceived("go".to_string()), &[(20, 2, 21)])],
                ),
            ],
            vec![
                Operation::new(1, Statement::Broadcast(expr_str("go"))),
                Operation::new(2, Statement::Nop),
            ],
        )
        .unwrap();
        let (analysis, _) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);
        assert_eq!(
            thread_states(&initial),
            vec![ComputationState::Running, ComputationState::Wait]
        );

        let state = step_once(&analysis, &initial);
        assert_eq!(state.threads()[1].computation(), ComputationState::Running);
        assert_eq!(state.threads()[1].location(), 20);
        assert_eq!(state.threads()[0].computation(), ComputationState::Yield);

        // the receiver finishes and the sender continues
        let state = step_once(&analysis, &state);
        assert_eq!(
            thread_states(&state),
            vec![ComputationState::Running, ComputationState::Done]
        );
        assert_eq!(state.threads()[0].location(), 11);
    }

    #[test]
    fn broadcast_and_wait_blocks_sender() {
        let task = Task::new(
            "broadcast and wait",
            vec![
                actor("Sender", false, vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 2, 12)])]),
                actor(
                    "Receiver",
                    false,
                    vec![script(
                        0,
                        Event::MessageReceived("go".to_string()),
                        &[(20, 2, 21), (21, 2, 22)],
                    )],
                ),
            ],
            vec![
                Operation::new(1, Statement::BroadcastAndWait(expr_str("go"))),
                Operation::new(2, Statement::Nop),
            ],
        )
        .unwrap();
        let (analysis, _) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);
        let receiver = initial.threads()[1].thread_id();

        let state = step_once(&analysis, &initial);
        assert_eq!(state.threads()[0].computation(), ComputationState::Wait);
        assert!(state.threads()[0].waiting_for().contains(&receiver));
        assert_eq!(state.threads()[1].computation(), ComputationState::Running);

        // the sender is never scheduled while the receiver is not done
        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[0].computation(), ComputationState::Wait);
        assert_eq!(state.threads()[1].computation(), ComputationState::Running);

        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[1].computation(), ComputationState::Done);
        assert_eq!(state.threads()[0].computation(), ComputationState::Running);
        assert!(state.threads()[0].waiting_for().is_empty());
    }

    #[test]
    fn method_failure_marks_target() {
        let mut sprite = actor(
            "Sprite",
            false,
            vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 3, 12)])],
        );
        sprite
            .add_method(crate::task::Method::new(
                "check",
                Vec::new(),
                crate::task::TransitionRelation::from_transitions(&[50], &[(50, 2, 51)]).unwrap(),
            ))
            .unwrap();
        let task = Task::new(
            "failure",
            vec![sprite],
            vec![
                Operation::new(1, Statement::call("check", Vec::new(), None)),
                Operation::new(
                    2,
                    Statement::signal_failure(vec![Property::new("P")]),
                ),
                Operation::new(3, Statement::Nop),
            ],
        )
        .unwrap();
        let (analysis, _) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);

        let called = step_once(&analysis, &initial);
        assert_eq!(called.threads()[0].location(), 50);
        assert_eq!(called.threads()[0].call_stack().len(), 1);
        assert!(analysis.target(&called).is_empty());

        let failed = step_once(&analysis, &called);
        assert_eq!(failed.threads()[0].computation(), ComputationState::Failure);
        assert!(failed.threads()[0].failed_for().contains(&Property::new("P")));
        assert!(analysis.target(&failed).contains(&Property::new("P")));
        assert!(analysis.abstract_succ(&failed).unwrap().is_empty());
    }

    #[test]
    fn waits_follow_the_policy() {
        let task = Task::new(
            "wait",
            vec![actor("A", false, vec![script(0, Event::Bootstrap, &[(10, 1, 11)])])],
            vec![Operation::new(1, Statement::WaitSecs(expr_int(1)))],
        )
        .unwrap();

        let (analysis, context) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);
        step_once(&analysis, &initial);
        assert!(context.caveats().contains(&SoundnessCaveat::WaitSecsIgnored));

        let mut options = ControlOptions::new();
        options.set_wait_policy(WaitPolicy::Reject);
        let (analysis, _) = control_analysis(&task, options).unwrap();
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);
        assert!(matches!(
            analysis.abstract_succ(&initial),
            Err(Error::Unimplemented(_))
        ));
    }

    #[test]
    fn observers_step_first_and_restart_after_statements() {
        let task = Task::new(
            "observer",
            vec![
                actor("A", false, vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 1, 12)])]),
                actor("Obs", true, vec![script(0, Event::AfterStatement, &[(40, 1, 41)])]),
            ],
            vec![Operation::new(1, Statement::Nop)],
        )
        .unwrap();
        let (analysis, _) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);
        assert_eq!(
            thread_states(&initial),
            vec![ComputationState::Running, ComputationState::Yield]
        );

        let state = step_once(&analysis, &initial);
        assert_eq!(state.threads()[1].location(), 41);
        assert_eq!(
            thread_states(&state),
            vec![ComputationState::Running, ComputationState::Done]
        );
        assert_eq!(state.threads()[0].location(), 10);

        // a program statement brings the observer back
        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[0].location(), 11);
        assert_eq!(state.threads()[1].location(), 40);
        assert_eq!(
            thread_states(&state),
            vec![ComputationState::Running, ComputationState::Yield]
        );

        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[1].location(), 41);
        assert_eq!(state.threads()[0].location(), 11);
    }

    #[test]
    fn arguments_and_results_pass_through_calls() {
        let a = Variable::integer("Sprite.a");
        let r = Variable::integer("Sprite.r");
        let mut sprite = actor(
            "Sprite",
            false,
            vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 3, 12)])],
        );
        sprite
            .add_method(Method::new(
                "inc",
                vec![a.clone()],
                TransitionRelation::from_transitions(&[50], &[(50, 2, 51)]).unwrap(),
            ))
            .unwrap();
        let task = Task::new(
            "inc",
            vec![sprite],
            vec![
                Operation::new(1, Statement::call("inc", vec![expr_int(1)], Some(r.clone()))),
                Operation::new(
                    2,
                    Statement::Return(Some(Expression::add(expr_var(&a), expr_int(1)).unwrap())),
                ),
                Operation::new(3, Statement::Nop),
            ],
        )
        .unwrap();
        let (analysis, _) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);

        let called = step_once(&analysis, &initial);
        assert_eq!(called.threads()[0].location(), 50);
        assert_eq!(analysis.variable_values(&called).get(&a), Some(&Constant::integer(1)));

        let returned = step_once(&analysis, &called);
        let thread = &returned.threads()[0];
        assert_eq!(thread.location(), 11);
        assert!(thread.call_stack().is_empty());
        assert_eq!(thread.computation(), ComputationState::Running);
        assert_eq!(analysis.variable_values(&returned).get(&r), Some(&Constant::integer(2)));
    }

    #[test]
    fn methods_return_at_their_end() {
        let mut sprite = actor(
            "Sprite",
            false,
            vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 2, 12)])],
        );
        sprite
            .add_method(Method::new(
                "idle",
                Vec::new(),
                TransitionRelation::from_transitions(&[60], &[(60, 2, 61)]).unwrap(),
            ))
            .unwrap();
        let task = Task::new(
            "implicit return",
            vec![sprite],
            vec![
                Operation::new(1, Statement::call("idle", Vec::new(), None)),
                Operation::new(2, Statement::Nop),
            ],
        )
        .unwrap();
        let (analysis, _) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);

        let state = step_once(&analysis, &initial);
        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[0].location(), 61);
        assert_eq!(state.threads()[0].call_stack().len(), 1);

        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[0].location(), 11);
        assert!(state.threads()[0].call_stack().is_empty());
        assert_eq!(state.threads()[0].computation(), ComputationState::Running);
        assert_eq!(state.threads()[0].scope_stack(), &["Sprite".to_string()]);
    }

    #[test]
    fn atomic_methods_resume_atomically_after_waiting() {
        let mut sprite = actor(
            "Sprite",
            false,
            vec![script(0, Event::Bootstrap, &[(10, 1, 11), (11, 3, 12)])],
        );
        let mut method = Method::new(
            "m",
            Vec::new(),
            TransitionRelation::from_transitions(&[50], &[(50, 2, 51), (51, 3, 52)]).unwrap(),
        );
        method.set_atomic(true);
        sprite.add_method(method).unwrap();
        let task = Task::new(
            "atomic",
            vec![
                sprite,
                actor(
                    "Receiver",
                    false,
                    vec![script(0, Event::MessageReceived("go".to_string()), &[(20, 3, 21)])],
                ),
                actor("Other", false, vec![script(0, Event::Bootstrap, &[(30, 3, 31), (31, 3, 32)])]),
            ],
            vec![
                Operation::new(1, Statement::call("m", Vec::new(), None)),
                Operation::new(2, Statement::BroadcastAndWait(expr_str("go"))),
                Operation::new(3, Statement::Nop),
            ],
        )
        .unwrap();
        let (analysis, _) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);

        let state = step_once(&analysis, &initial);
        assert_eq!(
            thread_states(&state),
            vec![
                ComputationState::RunningAtomic,
                ComputationState::Wait,
                ComputationState::Yield
            ]
        );

        let state = step_once(&analysis, &state);
        assert_eq!(
            thread_states(&state),
            vec![
                ComputationState::Wait,
                ComputationState::Running,
                ComputationState::Yield
            ]
        );

        // released, the sprite goes before the other yielding thread
        let state = step_once(&analysis, &state);
        assert_eq!(
            thread_states(&state),
            vec![
                ComputationState::RunningAtomic,
                ComputationState::Done,
                ComputationState::Yield
            ]
        );
        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[0].location(), 52);
        assert_eq!(state.threads()[0].computation(), ComputationState::RunningAtomic);

        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[0].location(), 11);
        assert_eq!(
            thread_states(&state),
            vec![
                ComputationState::Yield,
                ComputationState::Done,
                ComputationState::Running
            ]
        );
    }

    #[test]
    fn waiting_broadcasters_are_not_restarted() {
        let mut receiver = script(
            0,
            Event::MessageReceived("go".to_string()),
            &[(20, 2, 21), (21, 3, 22)],
        );
        receiver.set_restart_on_triggered(false);
        let task = Task::new(
            "no restart",
            vec![
                actor("Sender", false, vec![script(0, Event::Bootstrap, &[(10, 1, 11)])]),
                actor("Receiver", false, vec![receiver]),
                actor(
                    "Pinger",
                    false,
                    vec![script(
                        0,
                        Event::MessageReceived("ping".to_string()),
                        &[(30, 3, 31), (31, 4, 32)],
                    )],
                ),
            ],
            vec![
                Operation::new(1, Statement::BroadcastAndWait(expr_str("go"))),
                Operation::new(2, Statement::BroadcastAndWait(expr_str("ping"))),
                Operation::new(3, Statement::Nop),
                Operation::new(4, Statement::Broadcast(expr_str("go"))),
            ],
        )
        .unwrap();
        let (analysis, _) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);

        let state = step_once(&analysis, &initial);
        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[1].location(), 21);
        assert_eq!(state.threads()[1].computation(), ComputationState::Wait);
        assert!(state.threads()[1].is_in_progress());

        let state = step_once(&analysis, &state);
        let state = step_once(&analysis, &state);
        assert_eq!(state.threads()[2].computation(), ComputationState::Done);
        let receiver = &state.threads()[1];
        assert_eq!(receiver.location(), 21);
        assert_eq!(receiver.computation(), ComputationState::Running);
        assert!(receiver.waiting_for().is_empty());
        assert_eq!(state.threads()[0].computation(), ComputationState::Wait);
    }

    #[test]
    fn broken_schedules_are_invariant_violations() {
        let task = three_threads();
        let (analysis, _) = value_control_analysis(&task);

        let two_running = vec![
            ThreadState::new(0, "A", 0, 10, false, ComputationState::Running),
            ThreadState::new(1, "B", 0, 20, false, ComputationState::Running),
        ];
        assert!(matches!(
            analysis.transfer.choose_thread_to_step(&two_running),
            Err(Error::InvariantViolation(_))
        ));
        assert!(matches!(
            analysis.transfer.check_schedule(&two_running),
            Err(Error::InvariantViolation(_))
        ));

        let stuck = vec![ThreadState::new(0, "A", 0, 12, false, ComputationState::Running)];
        assert!(matches!(
            analysis.transfer.choose_thread_to_step(&stuck),
            Err(Error::InvariantViolation(_))
        ));
        assert!(matches!(
            analysis.transfer.check_schedule(&stuck),
            Err(Error::InvariantViolation(_))
        ));

        let fine = vec![
            ThreadState::new(0, "A", 0, 10, false, ComputationState::Running),
            ThreadState::new(1, "B", 0, 20, false, ComputationState::Yield),
        ];
        assert!(analysis.transfer.check_schedule(&fine).is_ok());
        assert_eq!(analysis.transfer.choose_thread_to_step(&fine).unwrap(), Some(0));
    }

    #[test]
    fn wait_until_follows_the_policy() {
        let task = Task::new(
            "wait until",
            vec![actor("A", false, vec![script(0, Event::Bootstrap, &[(10, 1, 11)])])],
            vec![Operation::new(1, Statement::WaitUntil(expr_bool(true)))],
        )
        .unwrap();

        let (analysis, context) = value_control_analysis(&task);
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);
        step_once(&analysis, &initial);
        assert!(context.caveats().contains(&SoundnessCaveat::ApproximateWaitUntil));

        let mut options = ControlOptions::new();
        options.set_wait_policy(WaitPolicy::Reject);
        let (analysis, _) = control_analysis(&task, options).unwrap();
        let initial = analysis.initial_states_for(&task).unwrap().remove(0);
        assert!(matches!(
            analysis.abstract_succ(&initial),
            Err(Error::Unimplemented(_))
        ));
    }

    #[test]
    fn aggregation_is_not_implemented() {
        let task = three_threads();
        let mut options = ControlOptions::new();
        options.set_aggregate_atomic_transitions(true);
        assert!(matches!(
            control_analysis(&task, options),
            Err(Error::Unimplemented(_))
        ));
    }
}
