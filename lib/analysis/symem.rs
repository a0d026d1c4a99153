//! Symbolic memory: the data state is the path formula.
//!
//! Declarations, assignments and assumptions conjoin a constraint to the
//! formula. Variables must already be in SSA form, so an assignment
//! `x@2 := x@1 + 1` becomes the constraint `x@2 == x@1 + 1`.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{
    AnalysisLayer, Capabilities, LabeledOperation, LabeledTransferRelation, MergeOperator,
    ProgramAnalysis, StandardMergeOperatorFactory,
};
use crate::lattice::{Formula, FormulaLattice, Lattice};
use crate::task::{Constant, Expression, Property, Statement, Task, Variable};
use crate::Error;

pub struct SymemAnalysis {
    formulas: FormulaLattice,
    merge_operator: Box<dyn MergeOperator<Formula>>,
}

impl SymemAnalysis {
    /// Create the analysis with the named merge operator, `SEP` or `JOIN`.
    pub fn new(merge_operator: &str) -> Result<SymemAnalysis, Error> {
        Ok(SymemAnalysis {
            formulas: FormulaLattice::new(),
            merge_operator: StandardMergeOperatorFactory::create(
                merge_operator,
                FormulaLattice::new(),
            )?,
        })
    }

    fn constrain(&self, state: &Formula, constraint: &Expression) -> Result<Vec<Formula>, Error> {
        let formula = self
            .formulas
            .meet(state, &Formula::from_expression(constraint)?)?;
        if formula.is_false() {
            Ok(Vec::new())
        } else {
            Ok(vec![formula])
        }
    }
}

impl ProgramAnalysis for SymemAnalysis {
    type State = Formula;

    fn abstract_succ(&self, _: &Formula) -> Result<Vec<Formula>, Error> {
        Err(Error::Unsupported(
            "symbolic memory only steps through labeled operations".to_string(),
        ))
    }

    fn join(&self, a: &Formula, b: &Formula) -> Result<Formula, Error> {
        self.formulas.join(a, b)
    }

    fn should_merge(&self, a: &Formula, b: &Formula) -> Result<bool, Error> {
        self.merge_operator.should_merge(a, b)
    }

    fn merge(&self, a: &Formula, b: &Formula) -> Result<Formula, Error> {
        self.merge_operator.merge(a, b)
    }

    fn stop(&self, state: &Formula, reached: &[&Formula]) -> Result<bool, Error> {
        for r in reached {
            if self.formulas.is_included(state, r)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn widen(&self, state: &Formula, _: &[&Formula]) -> Result<Formula, Error> {
        Ok(state.clone())
    }

    fn target(&self, _: &Formula) -> BTreeSet<Property> {
        BTreeSet::new()
    }

    fn initial_states_for(&self, _: &Task) -> Result<Vec<Formula>, Error> {
        Ok(vec![Formula::top()])
    }

    fn state_formula(&self, state: &Formula) -> Result<Formula, Error> {
        Ok(state.clone())
    }

    fn reset_path(&self, _: &Formula) -> Result<Formula, Error> {
        Ok(Formula::top())
    }

    /// Values fixed by equalities, when the formula is a single cube.
    fn variable_values(&self, state: &Formula) -> BTreeMap<Variable, Constant> {
        let mut values = BTreeMap::new();
        let mut cubes = state.cubes();
        let cube = match (cubes.next(), cubes.next()) {
            (Some(cube), None) => cube,
            _ => return values,
        };
        for literal in cube.iter().filter(|l| l.is_positive()) {
            if let Expression::Cmpeq(lhs, rhs) = literal.atom() {
                match (lhs.as_ref(), rhs.as_ref()) {
                    (Expression::Variable(variable), Expression::Constant(constant))
                    | (Expression::Constant(constant), Expression::Variable(variable)) => {
                        values.insert(variable.clone(), constant.clone());
                    }
                    _ => {}
                }
            }
        }
        values
    }
}

impl LabeledTransferRelation for SymemAnalysis {
    fn abstract_succ_for(
        &self,
        state: &Formula,
        operation: &LabeledOperation,
    ) -> Result<Vec<Formula>, Error> {
        match &operation.statement {
            Statement::Declare(variable) => self.constrain(
                state,
                &Expression::cmpeq(
                    variable.clone().into(),
                    variable.data_type().default_value().into(),
                )?,
            ),
            Statement::Assign {
                variable,
                expression,
            } => self.constrain(
                state,
                &Expression::cmpeq(variable.clone().into(), expression.clone())?,
            ),
            Statement::Assume(condition) => self.constrain(state, condition),
            _ => Ok(vec![state.clone()]),
        }
    }
}

impl AnalysisLayer for SymemAnalysis {
    fn name(&self) -> &'static str {
        "SymemAnalysis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PROVIDES_FORMULA
    }

    fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer> {
        None
    }
}
