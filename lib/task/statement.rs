use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::task::{Expression, Variable};

pub type OperationId = usize;

/// An identifier naming a behavioral obligation of the program.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Property {
    name: String,
}

impl Property {
    pub fn new<S: Into<String>>(name: S) -> Property {
        Property { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A statement of the subject language, the label of a transition.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Statement {
    /// Declare a variable, which then holds the default value of its type.
    Declare(Variable),
    Assign {
        variable: Variable,
        expression: Expression,
    },
    /// Continue only if the boolean expression holds.
    Assume(Expression),
    /// Call a method of the executing actor, optionally storing its result.
    Call {
        method: String,
        arguments: Vec<Expression>,
        result: Option<Variable>,
    },
    Return(Option<Expression>),
    Broadcast(Expression),
    BroadcastAndWait(Expression),
    WaitUntil(Expression),
    WaitSecs(Expression),
    /// Report that the given properties are violated.
    SignalFailure(BTreeSet<Property>),
    Nop,
}

impl Statement {
    pub fn assign(variable: Variable, expression: Expression) -> Statement {
        Statement::Assign {
            variable,
            expression,
        }
    }

    pub fn call<S: Into<String>>(
        method: S,
        arguments: Vec<Expression>,
        result: Option<Variable>,
    ) -> Statement {
        Statement::Call {
            method: method.into(),
            arguments,
            result,
        }
    }

    pub fn signal_failure<I: IntoIterator<Item = Property>>(properties: I) -> Statement {
        Statement::SignalFailure(properties.into_iter().collect())
    }

    /// Returns true if this statement can only be interpreted by the
    /// scheduler, never by a data analysis.
    pub fn is_control(&self) -> bool {
        matches!(self, Statement::Call { .. } | Statement::Return(_))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Statement::Declare(variable) => {
                write!(f, "declare {} as {}", variable, variable.data_type())
            }
            Statement::Assign {
                variable,
                expression,
            } => write!(f, "{} := {}", variable, expression),
            Statement::Assume(expression) => write!(f, "assume {}", expression),
            Statement::Call {
                method,
                arguments,
                result,
            } => {
                if let Some(result) = result {
                    write!(f, "{} := ", result)?;
                }
                let arguments: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", method, arguments.join(", "))
            }
            Statement::Return(Some(expression)) => write!(f, "return {}", expression),
            Statement::Return(None) => write!(f, "return"),
            Statement::Broadcast(message) => write!(f, "broadcast {}", message),
            Statement::BroadcastAndWait(message) => {
                write!(f, "broadcast {} and wait", message)
            }
            Statement::WaitUntil(condition) => write!(f, "wait until {}", condition),
            Statement::WaitSecs(seconds) => write!(f, "wait {} seconds", seconds),
            Statement::SignalFailure(properties) => {
                let properties: Vec<&str> = properties.iter().map(|p| p.name()).collect();
                write!(f, "signal failure [{}]", properties.join(", "))
            }
            Statement::Nop => write!(f, "nop"),
        }
    }
}

/// A statement with the identifier transitions refer to it by.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Operation {
    id: OperationId,
    statement: Statement,
}

impl Operation {
    pub fn new(id: OperationId, statement: Statement) -> Operation {
        Operation { id, statement }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02} {}", self.id, self.statement)
    }
}
