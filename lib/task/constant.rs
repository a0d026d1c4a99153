//! A `Constant` holds a single value of the subject language.

use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::task::Expression;

/// The types values of the subject language can take.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum DataType {
    Integer,
    Boolean,
    String,
}

impl DataType {
    /// The value a freshly declared variable of this type holds.
    pub fn default_value(&self) -> Constant {
        match self {
            DataType::Integer => Constant::Integer(BigInt::zero()),
            DataType::Boolean => Constant::Boolean(false),
            DataType::String => Constant::String(String::new()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "int"),
            DataType::Boolean => write!(f, "bool"),
            DataType::String => write!(f, "string"),
        }
    }
}

/// A constant value
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Constant {
    Integer(BigInt),
    Boolean(bool),
    String(String),
}

impl Constant {
    pub fn integer<I: Into<BigInt>>(value: I) -> Constant {
        Constant::Integer(value.into())
    }

    pub fn boolean(value: bool) -> Constant {
        Constant::Boolean(value)
    }

    pub fn string<S: Into<String>>(value: S) -> Constant {
        Constant::String(value.into())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Constant::Integer(_) => DataType::Integer,
            Constant::Boolean(_) => DataType::Boolean,
            Constant::String(_) => DataType::String,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Constant::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::String(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Constant::Integer(value) => write!(f, "{}", value),
            Constant::Boolean(value) => write!(f, "{}", value),
            Constant::String(value) => write!(f, "{:?}", value),
        }
    }
}

impl From<Constant> for Expression {
    fn from(constant: Constant) -> Expression {
        Expression::Constant(constant)
    }
}
