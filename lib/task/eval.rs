//! Ground evaluation of expressions.
//!
//! Variables are resolved through a lookup function. When an operand cannot
//! be resolved the result is `None`, except where the other operand already
//! decides a boolean connective.

use num_traits::Zero;

use crate::task::{Constant, Expression, Variable};
use crate::Error;

fn integers(
    lhs: Option<Constant>,
    rhs: Option<Constant>,
) -> Result<Option<(num_bigint::BigInt, num_bigint::BigInt)>, Error> {
    match (lhs, rhs) {
        (Some(Constant::Integer(lhs)), Some(Constant::Integer(rhs))) => Ok(Some((lhs, rhs))),
        (Some(lhs), Some(rhs)) => Err(Error::Type(format!(
            "arithmetic over {} and {}",
            lhs.data_type(),
            rhs.data_type()
        ))),
        _ => Ok(None),
    }
}

fn boolean(constant: Option<Constant>) -> Result<Option<bool>, Error> {
    match constant {
        Some(Constant::Boolean(value)) => Ok(Some(value)),
        Some(constant) => Err(Error::Type(format!("{} is not a boolean", constant))),
        None => Ok(None),
    }
}

/// Evaluate an expression, resolving variables with `lookup`.
pub fn eval<F>(expression: &Expression, lookup: &F) -> Result<Option<Constant>, Error>
where
    F: Fn(&Variable) -> Option<Constant>,
{
    Ok(match expression {
        Expression::Variable(variable) => lookup(variable),

        Expression::Constant(constant) => Some(constant.clone()),

        Expression::Add(lhs, rhs) => integers(eval(lhs, lookup)?, eval(rhs, lookup)?)?
            .map(|(lhs, rhs)| Constant::Integer(lhs + rhs)),

        Expression::Sub(lhs, rhs) => integers(eval(lhs, lookup)?, eval(rhs, lookup)?)?
            .map(|(lhs, rhs)| Constant::Integer(lhs - rhs)),

        Expression::Mul(lhs, rhs) => integers(eval(lhs, lookup)?, eval(rhs, lookup)?)?
            .map(|(lhs, rhs)| Constant::Integer(lhs * rhs)),

        Expression::Div(lhs, rhs) => match integers(eval(lhs, lookup)?, eval(rhs, lookup)?)? {
            Some((_, rhs)) if rhs.is_zero() => {
                return Err(Error::Arithmetic("Division by zero".to_string()))
            }
            Some((lhs, rhs)) => Some(Constant::Integer(lhs / rhs)),
            None => None,
        },

        Expression::Mod(lhs, rhs) => match integers(eval(lhs, lookup)?, eval(rhs, lookup)?)? {
            Some((_, rhs)) if rhs.is_zero() => {
                return Err(Error::Arithmetic("Division by zero".to_string()))
            }
            Some((lhs, rhs)) => Some(Constant::Integer(lhs % rhs)),
            None => None,
        },

        Expression::Cmpeq(lhs, rhs) => match (eval(lhs, lookup)?, eval(rhs, lookup)?) {
            (Some(lhs), Some(rhs)) => Some(Constant::Boolean(lhs == rhs)),
            _ => None,
        },

        Expression::Cmplt(lhs, rhs) => integers(eval(lhs, lookup)?, eval(rhs, lookup)?)?
            .map(|(lhs, rhs)| Constant::Boolean(lhs < rhs)),

        Expression::Not(operand) => boolean(eval(operand, lookup)?)?.map(|v| Constant::Boolean(!v)),

        Expression::And(lhs, rhs) => {
            match (boolean(eval(lhs, lookup)?)?, boolean(eval(rhs, lookup)?)?) {
                (Some(false), _) | (_, Some(false)) => Some(Constant::Boolean(false)),
                (Some(true), Some(true)) => Some(Constant::Boolean(true)),
                _ => None,
            }
        }

        Expression::Or(lhs, rhs) => {
            match (boolean(eval(lhs, lookup)?)?, boolean(eval(rhs, lookup)?)?) {
                (Some(true), _) | (_, Some(true)) => Some(Constant::Boolean(true)),
                (Some(false), Some(false)) => Some(Constant::Boolean(false)),
                _ => None,
            }
        }
    })
}

/// Evaluate an expression which must not contain any variables.
pub fn eval_ground(expression: &Expression) -> Result<Constant, Error> {
    eval(expression, &|_| None)?
        .ok_or_else(|| Error::Precondition(format!("{} is not a ground expression", expression)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{expr_bool, expr_int, expr_var};

    #[test]
    fn eval_arithmetic() {
        let e = Expression::mul(
            Expression::add(expr_int(2), expr_int(3)).unwrap(),
            Expression::sub(expr_int(10), expr_int(4)).unwrap(),
        )
        .unwrap();
        assert_eq!(eval_ground(&e).unwrap(), Constant::integer(30));

        let e = Expression::modulo(expr_int(-7), expr_int(3)).unwrap();
        assert_eq!(eval_ground(&e).unwrap(), Constant::integer(-1));
    }

    #[test]
    fn eval_division_by_zero() {
        let e = Expression::div(expr_int(1), expr_int(0)).unwrap();
        assert!(matches!(eval_ground(&e), Err(Error::Arithmetic(_))));
    }

    #[test]
    fn eval_partial_knowledge() {
        let x = Variable::integer("x");
        let unknown = Expression::cmplt(expr_var(&x), expr_int(3)).unwrap();

        let lookup = |_: &Variable| None;
        assert_eq!(eval(&unknown, &lookup).unwrap(), None);

        let e = Expression::and(unknown.clone(), expr_bool(false)).unwrap();
        assert_eq!(eval(&e, &lookup).unwrap(), Some(Constant::boolean(false)));

        let e = Expression::or(expr_bool(true), unknown).unwrap();
        assert_eq!(eval(&e, &lookup).unwrap(), Some(Constant::boolean(true)));

        let known = |_: &Variable| Some(Constant::integer(1));
        let e = Expression::cmplt(expr_var(&x), expr_int(3)).unwrap();
        assert_eq!(eval(&e, &known).unwrap(), Some(Constant::boolean(true)));
    }
}
