//! An in-process solver which searches for models by enumeration.
//!
//! Each cube is handled on its own. Equalities which force the value of a
//! variable are propagated first. The remaining variables are enumerated:
//! booleans exhaustively, integers and strings over a candidate set derived
//! from the constants in the cube. Finding a model proves `Sat`; exhausting
//! the search proves `Unsat` only if every enumerated variable was boolean.

use log::trace;
use num_bigint::BigInt;
use std::collections::{BTreeMap, BTreeSet};

use crate::lattice::{Cube, Formula, Literal, Model};
use crate::solver::{SatResult, Solver};
use crate::task::eval::eval;
use crate::task::{Constant, DataType, Expression, Variable};
use crate::Error;

/// The largest number of assignments tried per cube.
const MAX_ASSIGNMENTS: usize = 1 << 14;

type Assignment = BTreeMap<Variable, Constant>;

#[derive(Clone, Debug)]
pub struct EnumerationSolver {
    integer_range: u32,
}

impl EnumerationSolver {
    pub fn new(integer_range: u32) -> EnumerationSolver {
        EnumerationSolver { integer_range }
    }

    /// Evaluate a literal, `None` if it cannot be decided.
    fn literal_holds(literal: &Literal, assignment: &Assignment) -> Option<bool> {
        let lookup = |variable: &Variable| assignment.get(variable).cloned();
        match eval(literal.atom(), &lookup) {
            Ok(Some(Constant::Boolean(value))) => Some(value == literal.is_positive()),
            _ => None,
        }
    }

    /// Assign every variable an equality literal forces, until nothing
    /// changes.
    fn propagate(cube: &Cube) -> Assignment {
        let mut assignment = Assignment::new();
        loop {
            let mut changed = false;
            for literal in cube {
                let lookup = |variable: &Variable| assignment.get(variable).cloned();
                let forced = match (literal.atom(), literal.is_positive()) {
                    (Expression::Variable(variable), positive) => {
                        Some((variable.clone(), Constant::Boolean(positive)))
                    }
                    (Expression::Cmpeq(lhs, rhs), true) => {
                        match (lhs.get_variable(), rhs.get_variable()) {
                            (Some(variable), _) if !assignment.contains_key(variable) => {
                                eval(rhs, &lookup)
                                    .ok()
                                    .flatten()
                                    .map(|value| (variable.clone(), value))
                            }
                            (_, Some(variable)) if !assignment.contains_key(variable) => {
                                eval(lhs, &lookup)
                                    .ok()
                                    .flatten()
                                    .map(|value| (variable.clone(), value))
                            }
                            _ => None,
                        }
                    }
                    _ => None,
                };
                if let Some((variable, value)) = forced {
                    if !assignment.contains_key(&variable) {
                        assignment.insert(variable, value);
                        changed = true;
                    }
                }
            }
            if !changed {
                return assignment;
            }
        }
    }

    fn candidates(&self, variable: &Variable, cube: &Cube) -> Vec<Constant> {
        let constants: BTreeSet<&Constant> = cube
            .iter()
            .flat_map(|literal| literal.atom().constants())
            .collect();
        match variable.data_type() {
            DataType::Boolean => vec![Constant::boolean(false), Constant::boolean(true)],
            DataType::Integer => {
                let range = i64::from(self.integer_range);
                let mut values: BTreeSet<BigInt> = (-range..=range).map(BigInt::from).collect();
                for constant in constants.iter().filter_map(|c| c.as_integer()) {
                    values.insert(constant - 1);
                    values.insert(constant.clone());
                    values.insert(constant + 1);
                }
                values.into_iter().map(Constant::Integer).collect()
            }
            DataType::String => {
                let mut values: BTreeSet<String> = constants
                    .iter()
                    .filter_map(|c| c.as_str())
                    .map(|s| s.to_string())
                    .collect();
                values.insert(String::new());
                values.insert("\u{0}fresh".to_string());
                values.into_iter().map(Constant::String).collect()
            }
        }
    }

    /// Decide a cube, returning the model found if it is satisfiable.
    fn check_cube(&self, cube: &Cube) -> (SatResult, Option<Assignment>) {
        let assignment = EnumerationSolver::propagate(cube);

        // forced values hold in every model, so a literal they falsify
        // refutes the cube whatever the free variables are
        if cube
            .iter()
            .any(|literal| EnumerationSolver::literal_holds(literal, &assignment) == Some(false))
        {
            return (SatResult::Unsat, None);
        }

        let free: Vec<&Variable> = cube
            .iter()
            .flat_map(|literal| literal.atom().variables())
            .filter(|variable| !assignment.contains_key(*variable))
            .collect::<BTreeSet<&Variable>>()
            .into_iter()
            .collect();
        let candidates: Vec<Vec<Constant>> = free
            .iter()
            .map(|variable| self.candidates(variable, cube))
            .collect();

        let mut complete = free.iter().all(|v| v.data_type() == DataType::Boolean);

        // odometer over the candidate lists
        let mut indices = vec![0; free.len()];
        for _ in 0..MAX_ASSIGNMENTS {
            let mut assignment = assignment.clone();
            for (i, variable) in free.iter().enumerate() {
                assignment.insert((*variable).clone(), candidates[i][indices[i]].clone());
            }

            let mut holds = Some(true);
            for literal in cube {
                match EnumerationSolver::literal_holds(literal, &assignment) {
                    Some(true) => {}
                    Some(false) => {
                        holds = Some(false);
                        break;
                    }
                    None => holds = None,
                }
            }
            match holds {
                Some(true) => return (SatResult::Sat, Some(assignment)),
                Some(false) => {}
                None => complete = false,
            }

            let mut position = 0;
            loop {
                if position == indices.len() {
                    return if complete {
                        (SatResult::Unsat, None)
                    } else {
                        (SatResult::Unknown, None)
                    };
                }
                indices[position] += 1;
                if indices[position] < candidates[position].len() {
                    break;
                }
                indices[position] = 0;
                position += 1;
            }
        }

        trace!("enumeration budget exhausted on {} free variables", free.len());
        (SatResult::Unknown, None)
    }
}

impl Solver for EnumerationSolver {
    fn check(&self, formula: &Formula) -> Result<SatResult, Error> {
        let mut result = SatResult::Unsat;
        for cube in formula.cubes() {
            match self.check_cube(cube).0 {
                SatResult::Sat => return Ok(SatResult::Sat),
                SatResult::Unknown => result = SatResult::Unknown,
                SatResult::Unsat => {}
            }
        }
        Ok(result)
    }

    fn model(&self, formula: &Formula) -> Result<Option<Model>, Error> {
        Ok(formula
            .cubes()
            .find_map(|cube| self.check_cube(cube).1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{expr_int, expr_str, expr_var};

    fn formula(expression: Expression) -> Formula {
        Formula::from_expression(&expression).unwrap()
    }

    #[test]
    fn propagated_equalities() {
        let x1 = Variable::integer("x").with_version(1);
        let x2 = Variable::integer("x").with_version(2);
        let solver = EnumerationSolver::new(2);

        // x@1 == 0 && x@2 == x@1 + 1 && x@2 == 1
        let path = formula(Expression::cmpeq(expr_var(&x1), expr_int(0)).unwrap())
            .conjunction(&formula(
                Expression::cmpeq(
                    expr_var(&x2),
                    Expression::add(expr_var(&x1), expr_int(1)).unwrap(),
                )
                .unwrap(),
            ));

        let feasible =
            path.conjunction(&formula(Expression::cmpeq(expr_var(&x2), expr_int(1)).unwrap()));
        assert_eq!(solver.check(&feasible).unwrap(), SatResult::Sat);
        let model = solver.model(&feasible).unwrap().unwrap();
        assert_eq!(model.get(&x1), Some(&Constant::integer(0)));
        assert_eq!(model.get(&x2), Some(&Constant::integer(1)));

        let infeasible =
            path.conjunction(&formula(Expression::cmplt(expr_var(&x2), expr_int(1)).unwrap()));
        assert_eq!(solver.check(&infeasible).unwrap(), SatResult::Unsat);
        assert!(solver.model(&infeasible).unwrap().is_none());
    }

    #[test]
    fn forced_values_refute_without_enumeration() {
        let x = Variable::integer("x");
        let y = Variable::integer("y");
        let solver = EnumerationSolver::new(2);

        // x == 1 && x == 2 && y < 5, with y never decided by propagation
        let f = formula(Expression::cmpeq(expr_var(&x), expr_int(1)).unwrap())
            .conjunction(&formula(Expression::cmpeq(expr_var(&x), expr_int(2)).unwrap()))
            .conjunction(&formula(Expression::cmplt(expr_var(&y), expr_int(5)).unwrap()));
        assert_eq!(solver.check(&f).unwrap(), SatResult::Unsat);
    }

    #[test]
    fn booleans_are_decided() {
        let a = Variable::boolean("a");
        let b = Variable::boolean("b");
        let solver = EnumerationSolver::new(0);

        let f = formula(
            Expression::and(
                Expression::cmpeq(expr_var(&a), expr_var(&b)).unwrap(),
                Expression::not(Expression::cmpeq(expr_var(&b), expr_var(&a)).unwrap()).unwrap(),
            )
            .unwrap(),
        );
        assert_eq!(solver.check(&f).unwrap(), SatResult::Unsat);
        assert_eq!(solver.check(&Formula::top()).unwrap(), SatResult::Sat);
        assert_eq!(solver.check(&Formula::bottom()).unwrap(), SatResult::Unsat);
    }

    #[test]
    fn unresolved_integers_are_unknown() {
        let x = Variable::integer("x");
        let y = Variable::integer("y");
        let solver = EnumerationSolver::new(2);

        // x < y && y < x has no model, but the search cannot prove it
        let f = formula(
            Expression::and(
                Expression::cmplt(expr_var(&x), expr_var(&y)).unwrap(),
                Expression::cmplt(expr_var(&y), expr_var(&x)).unwrap(),
            )
            .unwrap(),
        );
        assert_eq!(solver.check(&f).unwrap(), SatResult::Unknown);

        // x < y is found quickly
        let f = formula(Expression::cmplt(expr_var(&x), expr_var(&y)).unwrap());
        assert_eq!(solver.check(&f).unwrap(), SatResult::Sat);
    }

    #[test]
    fn strings_use_constants() {
        let s = Variable::string("Stage.answer");
        let solver = EnumerationSolver::new(0);

        let f = formula(
            Expression::not(Expression::cmpeq(expr_var(&s), expr_str("yes")).unwrap()).unwrap(),
        );
        assert_eq!(solver.check(&f).unwrap(), SatResult::Sat);
    }
}
