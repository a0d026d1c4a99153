use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::analysis::ThreadId;
use crate::task::{LocationId, Property, ScriptId, Variable};

/// The scheduling status of a thread.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ComputationState {
    Unknown,
    Running,
    /// Running a method which may not be interrupted.
    RunningAtomic,
    /// Waiting for a trigger or for other threads to finish.
    Wait,
    Done,
    /// Ready to run when scheduled.
    Yield,
    /// Stopped after signalling a property violation.
    Failure,
}

impl ComputationState {
    /// A small integer, stable across runs, used in partition keys.
    pub fn code(&self) -> usize {
        match self {
            ComputationState::Unknown => 0,
            ComputationState::Running => 1,
            ComputationState::RunningAtomic => 2,
            ComputationState::Wait => 3,
            ComputationState::Done => 4,
            ComputationState::Yield => 5,
            ComputationState::Failure => 6,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ComputationState::Running | ComputationState::RunningAtomic
        )
    }

    /// Running, or ready to run.
    pub fn is_active(&self) -> bool {
        self.is_running() || *self == ComputationState::Yield
    }

    /// The thread will never run again unless restarted.
    pub fn is_finished(&self) -> bool {
        matches!(self, ComputationState::Done | ComputationState::Failure)
    }
}

impl fmt::Display for ComputationState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ComputationState::Unknown => write!(f, "UNKNOWN"),
            ComputationState::Running => write!(f, "RUNNING"),
            ComputationState::RunningAtomic => write!(f, "RUNNING_ATOMIC"),
            ComputationState::Wait => write!(f, "WAIT"),
            ComputationState::Done => write!(f, "DONE"),
            ComputationState::Yield => write!(f, "YIELD"),
            ComputationState::Failure => write!(f, "FAILURE"),
        }
    }
}

/// An active method call of a thread.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MethodCall {
    pub call_from: LocationId,
    pub return_to: LocationId,
    pub actor: String,
    pub method: String,
    /// Receives the returned value.
    pub result: Option<Variable>,
    pub atomic: bool,
}

/// The control state of one script instance.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ThreadState {
    thread_id: ThreadId,
    actor: String,
    script: ScriptId,
    entry: LocationId,
    observer: bool,
    location: LocationId,
    computation: ComputationState,
    waiting_for: BTreeSet<ThreadId>,
    failed_for: BTreeSet<Property>,
    call_stack: Vec<MethodCall>,
    scope_stack: Vec<String>,
}

impl ThreadState {
    pub fn new<S: Into<String>>(
        thread_id: ThreadId,
        actor: S,
        script: ScriptId,
        entry: LocationId,
        observer: bool,
        computation: ComputationState,
    ) -> ThreadState {
        let actor = actor.into();
        ThreadState {
            thread_id,
            scope_stack: vec![actor.clone()],
            actor,
            script,
            entry,
            observer,
            location: entry,
            computation,
            waiting_for: BTreeSet::new(),
            failed_for: BTreeSet::new(),
            call_stack: Vec::new(),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn script(&self) -> ScriptId {
        self.script
    }

    pub fn entry(&self) -> LocationId {
        self.entry
    }

    /// Returns true if this thread belongs to an observer actor.
    pub fn is_observer(&self) -> bool {
        self.observer
    }

    pub fn location(&self) -> LocationId {
        self.location
    }

    pub fn computation(&self) -> ComputationState {
        self.computation
    }

    /// The threads this thread waits for after broadcasting and waiting.
    pub fn waiting_for(&self) -> &BTreeSet<ThreadId> {
        &self.waiting_for
    }

    /// The properties this thread has signalled a failure for.
    pub fn failed_for(&self) -> &BTreeSet<Property> {
        &self.failed_for
    }

    pub fn call_stack(&self) -> &[MethodCall] {
        &self.call_stack
    }

    pub fn scope_stack(&self) -> &[String] {
        &self.scope_stack
    }

    pub(crate) fn set_location(&mut self, location: LocationId) {
        self.location = location;
    }

    pub(crate) fn set_computation(&mut self, computation: ComputationState) {
        self.computation = computation;
    }

    pub(crate) fn push_call(&mut self, call: MethodCall) {
        self.scope_stack.push(format!("{}.{}", call.actor, call.method));
        self.call_stack.push(call);
    }

    pub(crate) fn pop_call(&mut self) -> Option<MethodCall> {
        let call = self.call_stack.pop()?;
        self.scope_stack.pop();
        Some(call)
    }

    /// Running, ready to run, or waiting on threads it started itself.
    /// Waiting for a trigger does not count.
    pub fn is_in_progress(&self) -> bool {
        self.computation.is_active()
            || (self.computation == ComputationState::Wait && !self.waiting_for.is_empty())
    }

    /// Returns true if some active call on the stack is atomic.
    pub fn in_atomic_call(&self) -> bool {
        self.call_stack.iter().any(|call| call.atomic)
    }

    pub(crate) fn fail<'p, I: IntoIterator<Item = &'p Property>>(&mut self, properties: I) {
        self.failed_for.extend(properties.into_iter().cloned());
        self.computation = ComputationState::Failure;
    }

    pub(crate) fn wait_for(&mut self, threads: BTreeSet<ThreadId>) {
        self.waiting_for = threads;
        self.computation = ComputationState::Wait;
    }

    /// Stop waiting for finished threads. Returns true if the thread was
    /// released.
    pub(crate) fn release(&mut self, finished: &BTreeSet<ThreadId>) -> bool {
        if self.computation != ComputationState::Wait || self.waiting_for.is_empty() {
            return false;
        }
        self.waiting_for.retain(|id| !finished.contains(id));
        if self.waiting_for.is_empty() {
            self.computation = ComputationState::Yield;
            return true;
        }
        false
    }

    /// Start the script over from its entry location.
    pub(crate) fn restart(&mut self) {
        self.location = self.entry;
        self.computation = ComputationState::Yield;
        self.waiting_for.clear();
        self.call_stack.clear();
        self.scope_stack = vec![self.actor.clone()];
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "T{}({} script {} @ {}, {})",
            self.thread_id, self.actor, self.script, self.location, self.computation
        )
    }
}

/// The control state of all threads, wrapping the state of the analyses
/// below the scheduler.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ControlState<S> {
    pub(crate) threads: Vec<ThreadState>,
    pub(crate) wrapped: S,
    pub(crate) target_for: BTreeSet<Property>,
}

impl<S> ControlState<S> {
    pub fn threads(&self) -> &[ThreadState] {
        &self.threads
    }

    pub fn thread(&self, thread_id: ThreadId) -> Option<&ThreadState> {
        self.threads.iter().find(|t| t.thread_id() == thread_id)
    }

    pub fn wrapped(&self) -> &S {
        &self.wrapped
    }

    /// The properties some thread has signalled a failure for.
    pub fn target_for(&self) -> &BTreeSet<Property> {
        &self.target_for
    }
}
