use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::task::{Constant, DataType, Variable};
use crate::Error;

/// A typed expression of the subject language.
///
/// Expressions should be created through the constructor functions, which
/// check operand types. Comparisons and boolean connectives evaluate to
/// `Boolean`, arithmetic evaluates to `Integer`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Expression {
    Variable(Variable),
    Constant(Constant),
    Add(Box<Expression>, Box<Expression>),
    Sub(Box<Expression>, Box<Expression>),
    Mul(Box<Expression>, Box<Expression>),
    Div(Box<Expression>, Box<Expression>),
    Mod(Box<Expression>, Box<Expression>),
    Cmpeq(Box<Expression>, Box<Expression>),
    Cmplt(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Return the type this expression evaluates to.
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Variable(variable) => variable.data_type(),
            Expression::Constant(constant) => constant.data_type(),
            Expression::Add(..)
            | Expression::Sub(..)
            | Expression::Mul(..)
            | Expression::Div(..)
            | Expression::Mod(..) => DataType::Integer,
            Expression::Cmpeq(..)
            | Expression::Cmplt(..)
            | Expression::Not(..)
            | Expression::And(..)
            | Expression::Or(..) => DataType::Boolean,
        }
    }

    fn ensure_type(expression: &Expression, data_type: DataType) -> Result<(), Error> {
        if expression.data_type() != data_type {
            return Err(Error::Type(format!(
                "expected {} but {} is {}",
                data_type,
                expression,
                expression.data_type()
            )));
        }
        Ok(())
    }

    fn arithmetic<F>(lhs: Expression, rhs: Expression, f: F) -> Result<Expression, Error>
    where
        F: Fn(Box<Expression>, Box<Expression>) -> Expression,
    {
        Expression::ensure_type(&lhs, DataType::Integer)?;
        Expression::ensure_type(&rhs, DataType::Integer)?;
        Ok(f(Box::new(lhs), Box::new(rhs)))
    }

    pub fn variable(variable: Variable) -> Expression {
        Expression::Variable(variable)
    }

    pub fn constant(constant: Constant) -> Expression {
        Expression::Constant(constant)
    }

    pub fn add(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::arithmetic(lhs, rhs, Expression::Add)
    }

    pub fn sub(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::arithmetic(lhs, rhs, Expression::Sub)
    }

    pub fn mul(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::arithmetic(lhs, rhs, Expression::Mul)
    }

    pub fn div(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::arithmetic(lhs, rhs, Expression::Div)
    }

    pub fn modulo(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::arithmetic(lhs, rhs, Expression::Mod)
    }

    /// Equality over two expressions of the same type.
    pub fn cmpeq(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::ensure_type(&rhs, lhs.data_type())?;
        Ok(Expression::Cmpeq(Box::new(lhs), Box::new(rhs)))
    }

    pub fn cmplt(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::arithmetic(lhs, rhs, Expression::Cmplt)
    }

    pub fn not(expression: Expression) -> Result<Expression, Error> {
        Expression::ensure_type(&expression, DataType::Boolean)?;
        Ok(Expression::Not(Box::new(expression)))
    }

    pub fn and(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::ensure_type(&lhs, DataType::Boolean)?;
        Expression::ensure_type(&rhs, DataType::Boolean)?;
        Ok(Expression::And(Box::new(lhs), Box::new(rhs)))
    }

    pub fn or(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::ensure_type(&lhs, DataType::Boolean)?;
        Expression::ensure_type(&rhs, DataType::Boolean)?;
        Ok(Expression::Or(Box::new(lhs), Box::new(rhs)))
    }

    /// Returns the operands of this expression.
    pub fn operands(&self) -> Vec<&Expression> {
        match self {
            Expression::Variable(_) | Expression::Constant(_) => Vec::new(),
            Expression::Not(operand) => vec![operand],
            Expression::Add(lhs, rhs)
            | Expression::Sub(lhs, rhs)
            | Expression::Mul(lhs, rhs)
            | Expression::Div(lhs, rhs)
            | Expression::Mod(lhs, rhs)
            | Expression::Cmpeq(lhs, rhs)
            | Expression::Cmplt(lhs, rhs)
            | Expression::And(lhs, rhs)
            | Expression::Or(lhs, rhs) => vec![lhs, rhs],
        }
    }

    /// Returns all variables used in the expression
    pub fn variables(&self) -> BTreeSet<&Variable> {
        let mut variables = BTreeSet::new();
        let mut queue = vec![self];
        while let Some(expression) = queue.pop() {
            match expression {
                Expression::Variable(variable) => {
                    variables.insert(variable);
                }
                _ => queue.extend(expression.operands()),
            }
        }
        variables
    }

    /// Returns all constants used in the expression
    pub fn constants(&self) -> BTreeSet<&Constant> {
        let mut constants = BTreeSet::new();
        let mut queue = vec![self];
        while let Some(expression) = queue.pop() {
            match expression {
                Expression::Constant(constant) => {
                    constants.insert(constant);
                }
                _ => queue.extend(expression.operands()),
            }
        }
        constants
    }

    /// Rewrites every variable of this expression with the given function.
    ///
    /// Types are preserved by construction, as a variable is only ever
    /// replaced by another variable.
    pub fn rename<F>(&self, f: &F) -> Expression
    where
        F: Fn(&Variable) -> Variable,
    {
        let r = |e: &Expression| Box::new(e.rename(f));
        match self {
            Expression::Variable(variable) => Expression::Variable(f(variable)),
            Expression::Constant(constant) => Expression::Constant(constant.clone()),
            Expression::Add(lhs, rhs) => Expression::Add(r(lhs), r(rhs)),
            Expression::Sub(lhs, rhs) => Expression::Sub(r(lhs), r(rhs)),
            Expression::Mul(lhs, rhs) => Expression::Mul(r(lhs), r(rhs)),
            Expression::Div(lhs, rhs) => Expression::Div(r(lhs), r(rhs)),
            Expression::Mod(lhs, rhs) => Expression::Mod(r(lhs), r(rhs)),
            Expression::Cmpeq(lhs, rhs) => Expression::Cmpeq(r(lhs), r(rhs)),
            Expression::Cmplt(lhs, rhs) => Expression::Cmplt(r(lhs), r(rhs)),
            Expression::Not(operand) => Expression::Not(r(operand)),
            Expression::And(lhs, rhs) => Expression::And(r(lhs), r(rhs)),
            Expression::Or(lhs, rhs) => Expression::Or(r(lhs), r(rhs)),
        }
    }

    pub fn get_variable(&self) -> Option<&Variable> {
        match self {
            Expression::Variable(variable) => Some(variable),
            _ => None,
        }
    }

    pub fn get_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(constant) => Some(constant),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Variable(variable) => write!(f, "{}", variable),
            Expression::Constant(constant) => write!(f, "{}", constant),
            Expression::Add(lhs, rhs) => write!(f, "({} + {})", lhs, rhs),
            Expression::Sub(lhs, rhs) => write!(f, "({} - {})", lhs, rhs),
            Expression::Mul(lhs, rhs) => write!(f, "({} * {})", lhs, rhs),
            Expression::Div(lhs, rhs) => write!(f, "({} / {})", lhs, rhs),
            Expression::Mod(lhs, rhs) => write!(f, "({} % {})", lhs, rhs),
            Expression::Cmpeq(lhs, rhs) => write!(f, "({} == {})", lhs, rhs),
            Expression::Cmplt(lhs, rhs) => write!(f, "({} < {})", lhs, rhs),
            Expression::Not(operand) => write!(f, "!{}", operand),
            Expression::And(lhs, rhs) => write!(f, "({} && {})", lhs, rhs),
            Expression::Or(lhs, rhs) => write!(f, "({} || {})", lhs, rhs),
        }
    }
}
