//! Predicate abstraction over formulas.
//!
//! The precision of this domain is a set of predicates. Widening a formula
//! replaces it by the strongest combination of those predicates it implies,
//! as decided by a `Solver`. Boolean abstraction keeps arbitrary disjunctions
//! of predicate cubes; cartesian abstraction keeps a single cube.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::lattice::{AbstractDomain, Cube, Formula, FormulaLattice, Lattice, Literal};
use crate::solver::{SatResult, Solver};
use crate::task::{Constant, Expression, Variable};
use crate::{Error, RC};

/// Boolean abstraction enumerates all predicate cubes, so the number of
/// predicates it handles is bounded.
pub const MAX_BOOLEAN_PREDICATES: usize = 10;

/// A concrete state of the data.
pub type Model = BTreeMap<Variable, Constant>;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbstractionType {
    Boolean,
    Cartesian,
}

impl FromStr for AbstractionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<AbstractionType, Error> {
        match s {
            "boolean" => Ok(AbstractionType::Boolean),
            "cartesian" => Ok(AbstractionType::Cartesian),
            _ => Err(Error::IllegalArgument(format!(
                "Unknown abstraction type {}",
                s
            ))),
        }
    }
}

impl fmt::Display for AbstractionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AbstractionType::Boolean => write!(f, "boolean"),
            AbstractionType::Cartesian => write!(f, "cartesian"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PredicateAbstractionDomain {
    solver: RC<dyn Solver>,
    abstraction_type: AbstractionType,
    formulas: FormulaLattice,
}

impl PredicateAbstractionDomain {
    pub fn new(solver: RC<dyn Solver>, abstraction_type: AbstractionType) -> Self {
        PredicateAbstractionDomain {
            solver,
            abstraction_type,
            formulas: FormulaLattice::new(),
        }
    }

    pub fn abstraction_type(&self) -> AbstractionType {
        self.abstraction_type
    }

    pub fn solver(&self) -> &RC<dyn Solver> {
        &self.solver
    }

    fn is_unsat(&self, formula: &Formula) -> Result<bool, Error> {
        Ok(self.solver.check(formula)? == SatResult::Unsat)
    }

    /// Positive and negative form of every predicate.
    fn polarities(
        predicates: &BTreeSet<Expression>,
    ) -> Result<Vec<(Formula, Formula)>, Error> {
        predicates
            .iter()
            .map(|predicate| {
                Ok((
                    Formula::from_expression(predicate)?,
                    Formula::from_expression(&Expression::not(predicate.clone())?)?,
                ))
            })
            .collect()
    }

    fn cartesian_abstraction(
        &self,
        formula: &Formula,
        predicates: &BTreeSet<Expression>,
    ) -> Result<Formula, Error> {
        if self.is_unsat(formula)? {
            return Ok(Formula::bottom());
        }
        let mut result = Formula::top();
        for (positive, negative) in PredicateAbstractionDomain::polarities(predicates)? {
            if self.is_unsat(&formula.conjunction(&negative))? {
                result = result.conjunction(&positive);
            } else if self.is_unsat(&formula.conjunction(&positive))? {
                result = result.conjunction(&negative);
            }
        }
        Ok(result)
    }

    fn boolean_abstraction(
        &self,
        formula: &Formula,
        predicates: &BTreeSet<Expression>,
    ) -> Result<Formula, Error> {
        if predicates.len() > MAX_BOOLEAN_PREDICATES {
            warn!(
                "{} predicates exceed boolean abstraction, using cartesian",
                predicates.len()
            );
            return self.cartesian_abstraction(formula, predicates);
        }

        let polarities = PredicateAbstractionDomain::polarities(predicates)?;
        let mut result = Formula::bottom();
        for bits in 0..(1usize << polarities.len()) {
            let cube = polarities
                .iter()
                .enumerate()
                .fold(Formula::top(), |cube, (i, (positive, negative))| {
                    if bits & (1 << i) != 0 {
                        cube.conjunction(positive)
                    } else {
                        cube.conjunction(negative)
                    }
                });
            if cube.is_false() {
                continue;
            }
            if !self.is_unsat(&formula.conjunction(&cube))? {
                result = result.disjunction(&cube);
            }
        }
        Ok(result)
    }
}

impl Lattice for PredicateAbstractionDomain {
    type Element = Formula;

    fn top(&self) -> Result<Formula, Error> {
        self.formulas.top()
    }

    fn bottom(&self) -> Result<Formula, Error> {
        self.formulas.bottom()
    }

    fn join(&self, a: &Formula, b: &Formula) -> Result<Formula, Error> {
        self.formulas.join(a, b)
    }

    fn meet(&self, a: &Formula, b: &Formula) -> Result<Formula, Error> {
        self.formulas.meet(a, b)
    }

    fn is_included(&self, a: &Formula, b: &Formula) -> Result<bool, Error> {
        if self.formulas.is_included(a, b)? {
            return Ok(true);
        }
        // a ⇒ b iff a ∧ ¬b is unsatisfiable
        let not_b = Formula::from_expression(&Expression::not(b.to_expression())?)?;
        self.is_unsat(&a.conjunction(&not_b))
    }
}

impl AbstractDomain<Model> for PredicateAbstractionDomain {
    type Precision = BTreeSet<Expression>;

    fn abstract_of(&self, models: &[Model]) -> Result<Formula, Error> {
        let mut result = Formula::bottom();
        for model in models {
            let mut cube = Cube::new();
            for (variable, value) in model {
                let atom = Expression::cmpeq(
                    Expression::Variable(variable.clone()),
                    Expression::Constant(value.clone()),
                )?;
                cube.insert(Literal::new(atom, true));
            }
            result = result.disjunction(&Formula::cube(cube));
        }
        Ok(result)
    }

    fn concretize<'a>(
        &'a self,
        _: &'a Formula,
    ) -> Result<Box<dyn Iterator<Item = Model> + 'a>, Error> {
        Err(Error::Unsupported(
            "formulas cannot be concretized by enumeration".to_string(),
        ))
    }

    fn widen(
        &self,
        formula: &Formula,
        predicates: &BTreeSet<Expression>,
    ) -> Result<Formula, Error> {
        match self.abstraction_type {
            AbstractionType::Boolean => self.boolean_abstraction(formula, predicates),
            AbstractionType::Cartesian => self.cartesian_abstraction(formula, predicates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::laws::check_lattice_laws;
    use crate::solver::EnumerationSolver;
    use crate::task::{expr_int, expr_var};

    fn domain(abstraction_type: AbstractionType) -> PredicateAbstractionDomain {
        PredicateAbstractionDomain::new(RC::new(EnumerationSolver::new(4)), abstraction_type)
    }

    fn x() -> Variable {
        Variable::integer("x")
    }

    fn lt(value: i64) -> Expression {
        Expression::cmplt(expr_var(&x()), expr_int(value)).unwrap()
    }

    fn eq(value: i64) -> Expression {
        Expression::cmpeq(expr_var(&x()), expr_int(value)).unwrap()
    }

    fn formula(expression: Expression) -> Formula {
        Formula::from_expression(&expression).unwrap()
    }

    #[test]
    fn parse_abstraction_type() {
        assert_eq!(
            "boolean".parse::<AbstractionType>().unwrap(),
            AbstractionType::Boolean
        );
        assert_eq!(
            "cartesian".parse::<AbstractionType>().unwrap(),
            AbstractionType::Cartesian
        );
        assert!("interval".parse::<AbstractionType>().is_err());
    }

    #[test]
    fn predicate_abstraction_lattice_laws() {
        let y = Expression::cmpeq(expr_var(&Variable::integer("y")), expr_int(1)).unwrap();
        let domain = domain(AbstractionType::Boolean);
        check_lattice_laws(
            &domain,
            &[
                Formula::top(),
                Formula::bottom(),
                formula(lt(3)),
                formula(Expression::not(lt(3)).unwrap()),
                formula(eq(1)),
                formula(Expression::and(lt(3), y.clone()).unwrap()),
                formula(y),
            ],
        );

        // inclusion is semantic, not only syntactic
        assert!(domain.is_included(&formula(eq(1)), &formula(lt(3))).unwrap());
        assert!(!FormulaLattice::new()
            .is_included(&formula(eq(1)), &formula(lt(3)))
            .unwrap());
        assert!(!domain.is_included(&formula(lt(3)), &formula(eq(1))).unwrap());
    }

    #[test]
    fn cartesian_keeps_implied_predicates() {
        let domain = domain(AbstractionType::Cartesian);
        let predicates: BTreeSet<Expression> = vec![lt(5), eq(7)].into_iter().collect();

        let widened = domain.widen(&formula(eq(2)), &predicates).unwrap();
        let expected = formula(lt(5)).conjunction(&formula(Expression::not(eq(7)).unwrap()));
        assert_eq!(widened, expected);

        let widened = domain.widen(&formula(eq(2)), &BTreeSet::new()).unwrap();
        assert!(widened.is_true());

        let contradiction = formula(eq(2)).conjunction(&formula(eq(3)));
        assert!(domain.widen(&contradiction, &predicates).unwrap().is_false());
    }

    #[test]
    fn boolean_keeps_disjunctions() {
        let domain = domain(AbstractionType::Boolean);
        let predicates: BTreeSet<Expression> = vec![eq(1), eq(2)].into_iter().collect();

        // x == 1 || x == 2
        let f = formula(Expression::or(eq(1), eq(2)).unwrap());
        let widened = domain.widen(&f, &predicates).unwrap();
        assert_eq!(widened.cubes().count(), 2);
        assert!(domain.is_included(&f, &widened).unwrap());

        // cartesian abstraction loses the disjunction entirely
        let cartesian = self::domain(AbstractionType::Cartesian);
        assert!(cartesian.widen(&f, &predicates).unwrap().is_true());
    }

    #[test]
    fn abstract_of_models() {
        let domain = domain(AbstractionType::Boolean);
        let mut model = Model::new();
        model.insert(x(), Constant::integer(3));

        let f = domain.abstract_of(&[model]).unwrap();
        assert_eq!(f, formula(eq(3)));
        assert!(domain.abstract_of(&[]).unwrap().is_false());
        assert!(domain.concretize(&f).is_err());
    }
}
