use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::task::{TransitionRelation, Variable};
use crate::Error;

pub type ScriptId = usize;

/// The event that starts a script.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Event {
    /// Run when the program starts.
    Bootstrap,
    /// Run whenever the given message is broadcast.
    MessageReceived(String),
    /// Run after every statement of the program. Only meaningful for
    /// observer actors.
    AfterStatement,
    /// Never triggered.
    Never,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Event::Bootstrap => write!(f, "bootstrap"),
            Event::MessageReceived(message) => write!(f, "message {:?}", message),
            Event::AfterStatement => write!(f, "after statement"),
            Event::Never => write!(f, "never"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Script {
    id: ScriptId,
    event: Event,
    restart_on_triggered: bool,
    transitions: TransitionRelation,
}

impl Script {
    pub fn new(id: ScriptId, event: Event, transitions: TransitionRelation) -> Script {
        Script {
            id,
            event,
            restart_on_triggered: true,
            transitions,
        }
    }

    /// Set whether a running instance of this script restarts when its event
    /// fires again. Scripts restart by default.
    pub fn set_restart_on_triggered(&mut self, restart_on_triggered: bool) {
        self.restart_on_triggered = restart_on_triggered;
    }

    pub fn id(&self) -> ScriptId {
        self.id
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn restart_on_triggered(&self) -> bool {
        self.restart_on_triggered
    }

    pub fn transitions(&self) -> &TransitionRelation {
        &self.transitions
    }

    /// Returns true if broadcasting `message` triggers this script.
    pub fn is_triggered_by(&self, message: &str) -> bool {
        matches!(&self.event, Event::MessageReceived(m) if m == message)
    }
}

/// A procedure of an actor.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Method {
    ident: String,
    parameters: Vec<Variable>,
    atomic: bool,
    transitions: TransitionRelation,
}

impl Method {
    pub fn new<S: Into<String>>(
        ident: S,
        parameters: Vec<Variable>,
        transitions: TransitionRelation,
    ) -> Method {
        Method {
            ident: ident.into(),
            parameters,
            atomic: false,
            transitions,
        }
    }

    /// Set whether this method runs without yielding to other threads.
    pub fn set_atomic(&mut self, atomic: bool) {
        self.atomic = atomic;
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn parameters(&self) -> &[Variable] {
        &self.parameters
    }

    pub fn atomic(&self) -> bool {
        self.atomic
    }

    pub fn transitions(&self) -> &TransitionRelation {
        &self.transitions
    }
}

/// An actor of the program, a sprite, the stage, or a synthetic observer
/// checking properties.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Actor {
    ident: String,
    is_observer: bool,
    scripts: Vec<Script>,
    methods: BTreeMap<String, Method>,
}

impl Actor {
    pub fn new<S: Into<String>>(ident: S, is_observer: bool) -> Actor {
        Actor {
            ident: ident.into(),
            is_observer,
            scripts: Vec::new(),
            methods: BTreeMap::new(),
        }
    }

    pub fn add_script(&mut self, script: Script) -> Result<(), Error> {
        if self.scripts.iter().any(|s| s.id() == script.id()) {
            return Err(Error::IllegalArgument(format!(
                "actor {} already has a script {}",
                self.ident,
                script.id()
            )));
        }
        self.scripts.push(script);
        Ok(())
    }

    pub fn add_method(&mut self, method: Method) -> Result<(), Error> {
        if self.methods.contains_key(method.ident()) {
            return Err(Error::IllegalArgument(format!(
                "actor {} already has a method {}",
                self.ident,
                method.ident()
            )));
        }
        self.methods.insert(method.ident().to_string(), method);
        Ok(())
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn is_observer(&self) -> bool {
        self.is_observer
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.values()
    }

    pub fn script(&self, id: ScriptId) -> Result<&Script, Error> {
        self.scripts
            .iter()
            .find(|script| script.id() == id)
            .ok_or(Error::ScriptNotFound(id))
    }

    pub fn method(&self, ident: &str) -> Result<&Method, Error> {
        self.methods
            .get(ident)
            .ok_or_else(|| Error::MethodNotFound(format!("{}.{}", self.ident, ident)))
    }
}
