//! Quantifier-free formulas in disjunctive normal form.
//!
//! A `Formula` is a set of cubes, a cube is a set of literals, and a literal
//! is a boolean atom or its negation. `true` is the formula holding only the
//! empty cube, `false` is the formula with no cubes. Formulas are kept
//! normalized: no cube contains an atom together with its negation, and no
//! cube is a superset of another. Normalized formulas can be compared with
//! `==`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::lattice::Lattice;
use crate::task::eval::eval_ground;
use crate::task::{Constant, DataType, Expression, Variable};
use crate::Error;

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Literal {
    atom: Expression,
    positive: bool,
}

impl Literal {
    pub fn new(atom: Expression, positive: bool) -> Literal {
        Literal { atom, positive }
    }

    pub fn atom(&self) -> &Expression {
        &self.atom
    }

    pub fn is_positive(&self) -> bool {
        self.positive
    }

    pub fn negate(&self) -> Literal {
        Literal {
            atom: self.atom.clone(),
            positive: !self.positive,
        }
    }

    pub fn to_expression(&self) -> Expression {
        if self.positive {
            self.atom.clone()
        } else {
            Expression::Not(Box::new(self.atom.clone()))
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.positive {
            write!(f, "{}", self.atom)
        } else {
            write!(f, "!{}", self.atom)
        }
    }
}

/// A conjunction of literals.
pub type Cube = BTreeSet<Literal>;

fn is_contradictory(cube: &Cube) -> bool {
    cube.iter()
        .any(|literal| literal.positive && cube.contains(&literal.negate()))
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Formula {
    cubes: BTreeSet<Cube>,
}

impl Formula {
    fn normalize(cubes: BTreeSet<Cube>) -> Formula {
        let cubes: Vec<Cube> = cubes.into_iter().filter(|c| !is_contradictory(c)).collect();
        let cubes = cubes
            .iter()
            .filter(|cube| {
                !cubes
                    .iter()
                    .any(|other| other != *cube && other.is_subset(cube))
            })
            .cloned()
            .collect();
        Formula { cubes }
    }

    /// The formula `true`.
    pub fn top() -> Formula {
        let mut cubes = BTreeSet::new();
        cubes.insert(Cube::new());
        Formula { cubes }
    }

    /// The formula `false`.
    pub fn bottom() -> Formula {
        Formula {
            cubes: BTreeSet::new(),
        }
    }

    pub fn is_true(&self) -> bool {
        self.cubes.contains(&Cube::new())
    }

    pub fn is_false(&self) -> bool {
        self.cubes.is_empty()
    }

    pub fn literal(literal: Literal) -> Formula {
        let mut cube = Cube::new();
        cube.insert(literal);
        Formula::cube(cube)
    }

    pub fn cube(cube: Cube) -> Formula {
        let mut cubes = BTreeSet::new();
        cubes.insert(cube);
        Formula::normalize(cubes)
    }

    /// Convert a boolean expression into a formula.
    ///
    /// Ground atoms are evaluated away; every other comparison or boolean
    /// variable becomes an atom.
    pub fn from_expression(expression: &Expression) -> Result<Formula, Error> {
        Formula::from_expression_polarity(expression, true)
    }

    fn from_expression_polarity(expression: &Expression, positive: bool) -> Result<Formula, Error> {
        if expression.data_type() != DataType::Boolean {
            return Err(Error::Type(format!("{} is not a boolean formula", expression)));
        }
        Ok(match expression {
            Expression::Not(operand) => Formula::from_expression_polarity(operand, !positive)?,
            Expression::And(lhs, rhs) => {
                let lhs = Formula::from_expression_polarity(lhs, positive)?;
                let rhs = Formula::from_expression_polarity(rhs, positive)?;
                if positive {
                    lhs.conjunction(&rhs)
                } else {
                    lhs.disjunction(&rhs)
                }
            }
            Expression::Or(lhs, rhs) => {
                let lhs = Formula::from_expression_polarity(lhs, positive)?;
                let rhs = Formula::from_expression_polarity(rhs, positive)?;
                if positive {
                    lhs.disjunction(&rhs)
                } else {
                    lhs.conjunction(&rhs)
                }
            }
            _ => {
                if expression.variables().is_empty() {
                    match eval_ground(expression)? {
                        Constant::Boolean(value) if value == positive => Formula::top(),
                        Constant::Boolean(_) => Formula::bottom(),
                        constant => {
                            return Err(Error::Type(format!("{} is not a boolean", constant)))
                        }
                    }
                } else {
                    Formula::literal(Literal::new(expression.clone(), positive))
                }
            }
        })
    }

    pub fn conjunction(&self, other: &Formula) -> Formula {
        let mut cubes = BTreeSet::new();
        for lhs in &self.cubes {
            for rhs in &other.cubes {
                cubes.insert(lhs.union(rhs).cloned().collect());
            }
        }
        Formula::normalize(cubes)
    }

    pub fn disjunction(&self, other: &Formula) -> Formula {
        Formula::normalize(self.cubes.union(&other.cubes).cloned().collect())
    }

    /// Returns true if every cube of this formula contains some cube of
    /// `other`. This implies `self ⇒ other`, but not the other way around.
    pub fn implies_syntactically(&self, other: &Formula) -> bool {
        self.cubes
            .iter()
            .all(|cube| other.cubes.iter().any(|o| o.is_subset(cube)))
    }

    pub fn cubes(&self) -> impl Iterator<Item = &Cube> {
        self.cubes.iter()
    }

    pub fn atoms(&self) -> BTreeSet<&Expression> {
        self.cubes
            .iter()
            .flat_map(|cube| cube.iter().map(|literal| literal.atom()))
            .collect()
    }

    pub fn variables(&self) -> BTreeSet<&Variable> {
        self.atoms()
            .into_iter()
            .flat_map(|atom| atom.variables())
            .collect()
    }

    pub fn to_expression(&self) -> Expression {
        let cube_expression = |cube: &Cube| {
            cube.iter()
                .map(|literal| literal.to_expression())
                .reduce(|lhs, rhs| Expression::And(Box::new(lhs), Box::new(rhs)))
                .unwrap_or(Expression::Constant(Constant::Boolean(true)))
        };
        self.cubes
            .iter()
            .map(cube_expression)
            .reduce(|lhs, rhs| Expression::Or(Box::new(lhs), Box::new(rhs)))
            .unwrap_or(Expression::Constant(Constant::Boolean(false)))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_false() {
            return write!(f, "false");
        }
        if self.is_true() {
            return write!(f, "true");
        }
        let cubes: Vec<String> = self
            .cubes
            .iter()
            .map(|cube| {
                let literals: Vec<String> = cube.iter().map(|l| l.to_string()).collect();
                literals.join(" && ")
            })
            .collect();
        write!(f, "({})", cubes.join(") || ("))
    }
}

/// Formulas ordered by syntactic implication.
#[derive(Clone, Debug, Default)]
pub struct FormulaLattice;

impl FormulaLattice {
    pub fn new() -> FormulaLattice {
        FormulaLattice
    }
}

impl Lattice for FormulaLattice {
    type Element = Formula;

    fn top(&self) -> Result<Formula, Error> {
        Ok(Formula::top())
    }

    fn bottom(&self) -> Result<Formula, Error> {
        Ok(Formula::bottom())
    }

    fn join(&self, a: &Formula, b: &Formula) -> Result<Formula, Error> {
        Ok(a.disjunction(b))
    }

    fn meet(&self, a: &Formula, b: &Formula) -> Result<Formula, Error> {
        Ok(a.conjunction(b))
    }

    fn is_included(&self, a: &Formula, b: &Formula) -> Result<bool, Error> {
        Ok(a.implies_syntactically(b))
    }
}
