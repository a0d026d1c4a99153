//! Thread steps and the scheduler.
//!
//! A thread leaves its location through one of the transitions of the
//! transition relation it currently executes, the relation of its script or
//! of the method on top of its call stack. Calls and returns are resolved
//! here and turned into plain operations for the analyses below.
//!
//! After every step the scheduler settles the threads:
//!
//! * a yielding thread without leaving transitions is done,
//! * a thread waiting for other threads is released once they all finished,
//! * if no program thread is running, the next yielding program thread after
//! the stepped one, in round-robin order, starts running.

use log::trace;
use std::collections::BTreeSet;

use crate::analysis::control::{ComputationState, MethodCall, ThreadState};
use crate::analysis::{AnalysisContext, ControlOptions, SoundnessCaveat, ThreadId, WaitPolicy};
use crate::task::{
    Event, Expression, LocationId, OperationId, Statement, Task, TransitionRelation,
};
use crate::{Error, RC};

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum StepKind {
    Plain,
    Call(MethodCall),
    Return,
    /// The thread leaves its script for good.
    Finish,
}

/// One way a thread can move, with the operations it applies.
#[derive(Clone, Debug)]
pub(crate) struct Step {
    pub(crate) operations: Vec<(Option<OperationId>, Statement)>,
    pub(crate) target: LocationId,
    pub(crate) kind: StepKind,
    /// The statement whose scheduling effects apply after the step.
    pub(crate) effect: Statement,
}

impl Step {
    fn plain(operation: OperationId, statement: Statement, target: LocationId) -> Step {
        Step {
            operations: vec![(Some(operation), statement.clone())],
            target,
            kind: StepKind::Plain,
            effect: statement,
        }
    }
}

fn message_of(message: &Expression) -> Result<String, Error> {
    match message.get_constant().and_then(|c| c.as_str()) {
        Some(message) => Ok(message.to_string()),
        None => Err(Error::Unimplemented(format!(
            "broadcast of the computed message {}",
            message
        ))),
    }
}

pub struct ControlTransferRelation {
    task: RC<Task>,
    context: RC<AnalysisContext>,
    options: ControlOptions,
}

impl ControlTransferRelation {
    pub fn new(
        task: RC<Task>,
        context: RC<AnalysisContext>,
        options: ControlOptions,
    ) -> ControlTransferRelation {
        ControlTransferRelation {
            task,
            context,
            options,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The transition relation the thread currently executes.
    pub fn relation_of(&self, thread: &ThreadState) -> Result<&TransitionRelation, Error> {
        match thread.call_stack().last() {
            Some(call) => Ok(self
                .task
                .actor(&call.actor)?
                .method(&call.method)?
                .transitions()),
            None => Ok(self
                .task
                .actor(thread.actor())?
                .script(thread.script())?
                .transitions()),
        }
    }

    /// Returns true if the thread can still move. A thread inside a method
    /// can always return.
    pub fn has_leaving(&self, thread: &ThreadState) -> Result<bool, Error> {
        Ok(!thread.call_stack().is_empty()
            || self
                .relation_of(thread)?
                .has_transitions_from(thread.location())?)
    }

    fn event_of(&self, thread: &ThreadState) -> Result<&Event, Error> {
        Ok(self
            .task
            .actor(thread.actor())?
            .script(thread.script())?
            .event())
    }

    /// One thread per entry location of every script, in task order.
    pub fn initial_threads(&self) -> Result<Vec<ThreadState>, Error> {
        let mut threads = Vec::new();
        for actor in self.task.actors() {
            for script in actor.scripts() {
                for &entry in script.transitions().entry_locations() {
                    let computation = match script.event() {
                        Event::Bootstrap => ComputationState::Yield,
                        Event::AfterStatement if actor.is_observer() => ComputationState::Yield,
                        _ => ComputationState::Wait,
                    };
                    threads.push(ThreadState::new(
                        self.context.thread_ids().allocate(),
                        actor.ident(),
                        script.id(),
                        entry,
                        actor.is_observer(),
                        computation,
                    ));
                }
            }
        }

        if threads.iter().filter(|t| !t.is_observer()).count() >= 2 {
            self.context
                .report_caveat(SoundnessCaveat::WorkTimeBudgetIgnored);
        }

        self.settle(&mut threads)?;
        if !threads.is_empty() {
            let last = threads.len() - 1;
            self.schedule(&mut threads, last);
        }
        self.check_schedule(&threads)?;
        Ok(threads)
    }

    /// Observers step before any program thread, in task order.
    pub fn choose_observer(&self, threads: &[ThreadState]) -> Result<Option<usize>, Error> {
        for (index, thread) in threads.iter().enumerate() {
            if thread.is_observer() && thread.computation().is_active() && self.has_leaving(thread)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// The running program thread, if any.
    pub fn choose_thread_to_step(&self, threads: &[ThreadState]) -> Result<Option<usize>, Error> {
        let running: Vec<usize> = threads
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_observer() && t.computation().is_running())
            .map(|(index, _)| index)
            .collect();

        match running.as_slice() {
            [] => Ok(None),
            [index] => {
                if !self.has_leaving(&threads[*index])? {
                    return Err(Error::InvariantViolation(format!(
                        "{} is running without leaving transitions",
                        threads[*index]
                    )));
                }
                Ok(Some(*index))
            }
            _ => Err(Error::InvariantViolation(format!(
                "{} program threads are running at once",
                running.len()
            ))),
        }
    }

    /// All steps the thread can take from its location.
    pub(crate) fn leaving_steps(&self, thread: &ThreadState) -> Result<Vec<Step>, Error> {
        let targets = self.relation_of(thread)?.transitions_from(thread.location())?;

        if targets.is_empty() {
            // falling off the end of a method returns without a value
            return Ok(match thread.call_stack().last() {
                Some(call) => vec![Step {
                    operations: vec![(None, Statement::Nop)],
                    target: call.return_to,
                    kind: StepKind::Return,
                    effect: Statement::Nop,
                }],
                None => Vec::new(),
            });
        }

        let mut steps = Vec::new();
        for target in targets {
            let statement = self.task.operation(target.operation)?.statement().clone();
            match &statement {
                Statement::Call {
                    method,
                    arguments,
                    result,
                } => {
                    let (actor_name, method_name) = match method.split_once('.') {
                        Some((actor, method)) => (actor, method),
                        None => (thread.actor(), method.as_str()),
                    };
                    let callee = self.task.actor(actor_name)?.method(method_name)?;
                    if callee.parameters().len() != arguments.len() {
                        return Err(Error::IllegalArgument(format!(
                            "{}.{} takes {} arguments, {} given",
                            actor_name,
                            method_name,
                            callee.parameters().len(),
                            arguments.len()
                        )));
                    }

                    let mut operations = vec![(Some(target.operation), statement.clone())];
                    for (parameter, argument) in callee.parameters().iter().zip(arguments) {
                        operations.push((None, Statement::assign(parameter.clone(), argument.clone())));
                    }

                    let call = MethodCall {
                        call_from: thread.location(),
                        return_to: target.target,
                        actor: actor_name.to_string(),
                        method: method_name.to_string(),
                        result: result.clone(),
                        atomic: callee.atomic(),
                    };
                    let entries = callee.transitions().entry_locations();
                    if entries.is_empty() {
                        return Err(Error::IllegalArgument(format!(
                            "{}.{} has no entry location",
                            actor_name, method_name
                        )));
                    }
                    for &entry in entries {
                        steps.push(Step {
                            operations: operations.clone(),
                            target: entry,
                            kind: StepKind::Call(call.clone()),
                            effect: statement.clone(),
                        });
                    }
                }
                Statement::Return(value) => match thread.call_stack().last() {
                    Some(call) => {
                        let mut operations = vec![(Some(target.operation), statement.clone())];
                        match (&call.result, value) {
                            (Some(result), Some(value)) => {
                                operations.push((None, Statement::assign(result.clone(), value.clone())))
                            }
                            (Some(result), None) => {
                                return Err(Error::IllegalArgument(format!(
                                    "{}.{} returns no value for {}",
                                    call.actor, call.method, result
                                )))
                            }
                            (None, _) => {}
                        }
                        steps.push(Step {
                            operations,
                            target: call.return_to,
                            kind: StepKind::Return,
                            effect: statement.clone(),
                        });
                    }
                    None => steps.push(Step {
                        operations: vec![(Some(target.operation), statement.clone())],
                        target: target.target,
                        kind: StepKind::Finish,
                        effect: statement.clone(),
                    }),
                },
                _ => steps.push(Step::plain(target.operation, statement.clone(), target.target)),
            }
        }
        Ok(steps)
    }

    /// Move the thread at `index` along `step` and reschedule.
    pub(crate) fn apply(
        &self,
        threads: &mut [ThreadState],
        index: usize,
        step: &Step,
    ) -> Result<(), Error> {
        let thread = &mut threads[index];
        thread.set_location(step.target);
        match &step.kind {
            StepKind::Plain | StepKind::Finish => {}
            StepKind::Call(call) => {
                thread.push_call(call.clone());
                if call.atomic {
                    thread.set_computation(ComputationState::RunningAtomic);
                }
            }
            StepKind::Return => {
                thread.pop_call();
                if thread.computation() == ComputationState::RunningAtomic
                    && !thread.in_atomic_call()
                {
                    thread.set_computation(ComputationState::Running);
                }
            }
        }

        self.apply_effect(threads, index, &step.effect)?;

        let thread = &threads[index];
        let computation = match thread.computation() {
            ComputationState::Failure | ComputationState::Wait => thread.computation(),
            _ if step.kind == StepKind::Finish || !self.has_leaving(thread)? => {
                ComputationState::Done
            }
            ComputationState::RunningAtomic => ComputationState::RunningAtomic,
            _ if thread.is_observer() => ComputationState::Running,
            _ => ComputationState::Yield,
        };
        threads[index].set_computation(computation);

        if !threads[index].is_observer() {
            self.restart_after_statement_observers(threads)?;
        }
        self.settle(threads)?;
        self.schedule(threads, index);
        self.check_schedule(threads)
    }

    fn apply_effect(
        &self,
        threads: &mut [ThreadState],
        index: usize,
        effect: &Statement,
    ) -> Result<(), Error> {
        match effect {
            Statement::SignalFailure(properties) => threads[index].fail(properties),
            Statement::Broadcast(message) => {
                self.trigger(threads, index, &message_of(message)?)?;
            }
            Statement::BroadcastAndWait(message) => {
                let triggered = self.trigger(threads, index, &message_of(message)?)?;
                if !triggered.is_empty() {
                    threads[index].wait_for(triggered);
                }
            }
            Statement::WaitUntil(_) => {
                self.approximate_wait(SoundnessCaveat::ApproximateWaitUntil, effect)?
            }
            Statement::WaitSecs(_) => self.approximate_wait(SoundnessCaveat::WaitSecsIgnored, effect)?,
            _ => {}
        }
        Ok(())
    }

    fn approximate_wait(&self, caveat: SoundnessCaveat, statement: &Statement) -> Result<(), Error> {
        match self.options.wait_policy() {
            WaitPolicy::Approximate => {
                self.context.report_caveat(caveat);
                Ok(())
            }
            WaitPolicy::Reject => Err(Error::Unimplemented(statement.to_string())),
        }
    }

    /// Restart every other thread whose script the message triggers,
    /// returning the restarted threads.
    fn trigger(
        &self,
        threads: &mut [ThreadState],
        index: usize,
        message: &str,
    ) -> Result<BTreeSet<ThreadId>, Error> {
        let mut triggered = BTreeSet::new();
        for (i, thread) in threads.iter_mut().enumerate() {
            if i == index {
                continue;
            }
            let script = self.task.actor(thread.actor())?.script(thread.script())?;
            if !script.is_triggered_by(message) {
                continue;
            }
            if thread.computation() == ComputationState::Failure {
                continue;
            }
            if thread.is_in_progress() && !script.restart_on_triggered() {
                continue;
            }
            trace!("{:?} restarts {}", message, thread);
            thread.restart();
            triggered.insert(thread.thread_id());
        }
        Ok(triggered)
    }

    fn restart_after_statement_observers(&self, threads: &mut [ThreadState]) -> Result<(), Error> {
        for thread in threads.iter_mut() {
            if thread.is_observer()
                && thread.computation() == ComputationState::Done
                && *self.event_of(thread)? == Event::AfterStatement
            {
                thread.restart();
            }
        }
        Ok(())
    }

    /// Finish yielding threads that cannot move and release waiting threads,
    /// until nothing changes.
    fn settle(&self, threads: &mut [ThreadState]) -> Result<(), Error> {
        loop {
            let mut changed = false;
            for thread in threads.iter_mut() {
                if thread.computation() == ComputationState::Yield && !self.has_leaving(thread)? {
                    thread.set_computation(ComputationState::Done);
                    changed = true;
                }
            }

            let finished: BTreeSet<ThreadId> = threads
                .iter()
                .filter(|t| t.computation().is_finished())
                .map(|t| t.thread_id())
                .collect();
            for thread in threads.iter_mut() {
                changed |= thread.release(&finished);
            }

            if !changed {
                return Ok(());
            }
        }
    }

    /// Start the next yielding program thread after `index`, unless a program
    /// thread is already running. The thread at `index` comes last. A thread
    /// inside an atomic method goes before all others and resumes atomically.
    fn schedule(&self, threads: &mut [ThreadState], index: usize) {
        if threads
            .iter()
            .any(|t| !t.is_observer() && t.computation().is_running())
        {
            return;
        }
        let count = threads.len();
        let ready = |t: &ThreadState| !t.is_observer() && t.computation() == ComputationState::Yield;
        let order = (1..=count).map(|k| (index + k) % count);
        let chosen = order
            .clone()
            .find(|&i| ready(&threads[i]) && threads[i].in_atomic_call())
            .or_else(|| order.clone().find(|&i| ready(&threads[i])));
        if let Some(i) = chosen {
            let thread = &mut threads[i];
            if thread.in_atomic_call() {
                thread.set_computation(ComputationState::RunningAtomic);
            } else {
                thread.set_computation(ComputationState::Running);
            }
            trace!("scheduled {}", thread);
        }
    }

    /// At most one program thread runs, and every running thread can move.
    pub fn check_schedule(&self, threads: &[ThreadState]) -> Result<(), Error> {
        let running = threads
            .iter()
            .filter(|t| !t.is_observer() && t.computation().is_running())
            .count();
        if running > 1 {
            return Err(Error::InvariantViolation(format!(
                "{} program threads are running at once",
                running
            )));
        }
        for thread in threads {
            if thread.computation().is_running() && !self.has_leaving(thread)? {
                return Err(Error::InvariantViolation(format!(
                    "{} is running without leaving transitions",
                    thread
                )));
            }
        }
        Ok(())
    }
}
