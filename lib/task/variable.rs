//! A `Variable` names a memory location of the subject program.
//!
//! Variable names are qualified with the actor owning them, as in
//! `Sprite1.counter`. After SSA renaming a variable also carries a version,
//! and `x@3` and `x@4` are distinct symbols.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::task::{DataType, Expression};

/// The actor name global variables are grouped under.
pub const STAGE_ACTOR: &str = "Stage";

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Variable {
    name: String,
    data_type: DataType,
    version: Option<usize>,
}

impl Variable {
    pub fn new<S: Into<String>>(name: S, data_type: DataType) -> Variable {
        Variable {
            name: name.into(),
            data_type,
            version: None,
        }
    }

    pub fn integer<S: Into<String>>(name: S) -> Variable {
        Variable::new(name, DataType::Integer)
    }

    pub fn boolean<S: Into<String>>(name: S) -> Variable {
        Variable::new(name, DataType::Boolean)
    }

    pub fn string<S: Into<String>>(name: S) -> Variable {
        Variable::new(name, DataType::String)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The SSA version of this variable, if it has been renamed.
    pub fn version(&self) -> Option<usize> {
        self.version
    }

    /// This variable at the given SSA version.
    pub fn with_version(&self, version: usize) -> Variable {
        Variable {
            name: self.name.clone(),
            data_type: self.data_type,
            version: Some(version),
        }
    }

    /// This variable with its SSA version stripped.
    pub fn base(&self) -> Variable {
        Variable {
            name: self.name.clone(),
            data_type: self.data_type,
            version: None,
        }
    }

    /// The actor this variable belongs to, taken from the name qualifier.
    pub fn actor(&self) -> &str {
        match self.name.split_once('.') {
            Some((actor, _)) => actor,
            None => STAGE_ACTOR,
        }
    }

    /// The name without its actor qualifier.
    pub fn local_name(&self) -> &str {
        match self.name.split_once('.') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// An identifier which includes the SSA version.
    pub fn identifier(&self) -> String {
        match self.version {
            Some(version) => format!("{}@{}", self.name, version),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl From<Variable> for Expression {
    fn from(variable: Variable) -> Expression {
        Expression::Variable(variable)
    }
}
