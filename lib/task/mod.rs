//! The program under verification.
//!
//! A `Task` is produced by a front end which parses and translates the
//! program; the analyses only ever read it. It consists of:
//!
//! * `Actor`s, each with `Script`s started by an `Event`, and `Method`s.
//! * A `TransitionRelation` per script and method, a graph over control
//! locations whose edges refer to operations by id.
//! * The table of `Operation`s, each holding a `Statement` over typed
//! `Expression`s.
//!
//! Location ids are unique across the whole task, so a location id alone
//! identifies the script or method it belongs to.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::Error;

mod actor;
mod constant;
pub mod eval;
mod expression;
mod statement;
mod transition_relation;
mod variable;

pub use self::actor::*;
pub use self::constant::*;
pub use self::expression::*;
pub use self::statement::*;
pub use self::transition_relation::*;
pub use self::variable::*;

/// A verification task: the program and its observers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Task {
    name: String,
    actors: Vec<Actor>,
    operations: BTreeMap<OperationId, Operation>,
}

impl Task {
    /// Create a task, checking that it is well formed.
    ///
    /// Actor names and operation ids must be unique, every operation a
    /// transition refers to must exist, and no location may belong to more
    /// than one transition relation.
    pub fn new<S: Into<String>>(
        name: S,
        actors: Vec<Actor>,
        operations: Vec<Operation>,
    ) -> Result<Task, Error> {
        let mut table = BTreeMap::new();
        for operation in operations {
            let id = operation.id();
            if table.insert(id, operation).is_some() {
                return Err(Error::IllegalArgument(format!("duplicate operation {}", id)));
            }
        }

        let mut actor_names = BTreeSet::new();
        let mut owners: BTreeMap<LocationId, String> = BTreeMap::new();
        for actor in &actors {
            if !actor_names.insert(actor.ident()) {
                return Err(Error::IllegalArgument(format!(
                    "duplicate actor {}",
                    actor.ident()
                )));
            }

            let relations = actor
                .scripts()
                .iter()
                .map(|s| (format!("{} script {}", actor.ident(), s.id()), s.transitions()))
                .chain(
                    actor
                        .methods()
                        .map(|m| (format!("{} method {}", actor.ident(), m.ident()), m.transitions())),
                );

            for (owner, relation) in relations {
                for operation in relation.operations() {
                    if !table.contains_key(&operation) {
                        return Err(Error::OperationNotFound(operation));
                    }
                }
                for location in relation.locations() {
                    if let Some(other) = owners.insert(location, owner.clone()) {
                        return Err(Error::IllegalArgument(format!(
                            "location {} belongs to both {} and {}",
                            location, other, owner
                        )));
                    }
                }
            }
        }

        Ok(Task {
            name: name.into(),
            actors,
            operations: table,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actor(&self, name: &str) -> Result<&Actor, Error> {
        self.actors
            .iter()
            .find(|actor| actor.ident() == name)
            .ok_or_else(|| Error::ActorNotFound(name.to_string()))
    }

    pub fn operation(&self, id: OperationId) -> Result<&Operation, Error> {
        self.operations.get(&id).ok_or(Error::OperationNotFound(id))
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }
}

/// A convenience function to create an integer constant expression.
pub fn expr_int<I: Into<BigInt>>(value: I) -> Expression {
    Expression::Constant(Constant::integer(value))
}

/// A convenience function to create a boolean constant expression.
pub fn expr_bool(value: bool) -> Expression {
    Expression::Constant(Constant::boolean(value))
}

/// A convenience function to create a string constant expression.
pub fn expr_str<S: Into<String>>(value: S) -> Expression {
    Expression::Constant(Constant::string(value))
}

/// A convenience function to create a variable expression.
pub fn expr_var(variable: &Variable) -> Expression {
    Expression::Variable(variable.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite() -> Actor {
        let mut actor = Actor::new("Sprite1", false);
        actor
            .add_script(Script::new(
                1,
                Event::Bootstrap,
                TransitionRelation::from_transitions(&[0], &[(0, 1, 1)]).unwrap(),
            ))
            .unwrap();
        actor
            .add_method(Method::new(
                "jump",
                vec![],
                TransitionRelation::from_transitions(&[10], &[(10, 2, 11)]).unwrap(),
            ))
            .unwrap();
        actor
    }

    fn operations() -> Vec<Operation> {
        vec![
            Operation::new(1, Statement::call("jump", vec![], None)),
            Operation::new(2, Statement::Nop),
        ]
    }

    #[test]
    fn lookups() {
        let task = Task::new("lookups", vec![sprite()], operations()).unwrap();

        let actor = task.actor("Sprite1").unwrap();
        assert_eq!(actor.script(1).unwrap().event(), &Event::Bootstrap);
        assert!(actor.method("jump").is_ok());
        assert!(matches!(actor.method("fly"), Err(Error::MethodNotFound(_))));
        assert!(matches!(actor.script(7), Err(Error::ScriptNotFound(7))));
        assert!(matches!(task.actor("Stage"), Err(Error::ActorNotFound(_))));
        assert!(matches!(task.operation(9), Err(Error::OperationNotFound(9))));
    }

    #[test]
    fn rejects_missing_operations() {
        let result = Task::new("missing", vec![sprite()], vec![Operation::new(1, Statement::Nop)]);
        assert!(matches!(result, Err(Error::OperationNotFound(2))));
    }

    #[test]
    fn rejects_shared_locations() {
        let mut other = Actor::new("Sprite2", false);
        other
            .add_script(Script::new(
                1,
                Event::Bootstrap,
                TransitionRelation::from_transitions(&[0], &[(0, 2, 5)]).unwrap(),
            ))
            .unwrap();

        let result = Task::new("shared", vec![sprite(), other], operations());
        assert!(matches!(result, Err(Error::IllegalArgument(_))));
    }

    #[test]
    fn rejects_duplicate_scripts() {
        let mut actor = sprite();
        let duplicate = Script::new(1, Event::Never, TransitionRelation::new());
        assert!(actor.add_script(duplicate).is_err());
    }
}
