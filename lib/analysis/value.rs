//! Constant propagation over SSA variables.
//!
//! A cheaper data analysis than symbolic memory. It only tracks variables
//! holding exactly one known constant, and equality assumptions against
//! constants.

use log::trace;
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{
    AnalysisLayer, Capabilities, LabeledOperation, LabeledTransferRelation, MergeOperator,
    ProgramAnalysis, StandardMergeOperatorFactory,
};
use crate::lattice::{Flat, Formula, Lattice, ValueMap, ValueMapLattice};
use crate::task::eval::eval;
use crate::task::{Constant, Expression, Property, Statement, Task, Variable};
use crate::Error;

pub struct ValueAnalysis {
    values: ValueMapLattice,
    merge_operator: Box<dyn MergeOperator<ValueMap>>,
}

impl ValueAnalysis {
    /// Create the analysis with the named merge operator, `SEP` or `JOIN`.
    pub fn new(merge_operator: &str) -> Result<ValueAnalysis, Error> {
        Ok(ValueAnalysis {
            values: ValueMapLattice::new(),
            merge_operator: StandardMergeOperatorFactory::create(
                merge_operator,
                ValueMapLattice::new(),
            )?,
        })
    }

    fn evaluate(&self, state: &ValueMap, expression: &Expression) -> Result<Flat<Constant>, Error> {
        match eval(expression, &|variable| state.value(variable)) {
            Ok(Some(constant)) => Ok(Flat::Value(constant)),
            Ok(None) => Ok(Flat::Top),
            // the concrete program does not trap, so the result is unknown
            Err(Error::Arithmetic(message)) => {
                trace!("{} in {}", message, expression);
                Ok(Flat::Top)
            }
            Err(e) => Err(e),
        }
    }

    fn assume(&self, state: &ValueMap, condition: &Expression) -> Result<Vec<ValueMap>, Error> {
        match self.evaluate(state, condition)? {
            Flat::Value(Constant::Boolean(false)) | Flat::Bottom => return Ok(Vec::new()),
            Flat::Value(_) => return Ok(vec![state.clone()]),
            Flat::Top => {}
        }

        let mut refined = state.clone();
        if let Expression::Cmpeq(lhs, rhs) = condition {
            for (variable, other) in [(lhs, rhs), (rhs, lhs)] {
                if let Some(variable) = variable.get_variable() {
                    if let Flat::Value(constant) = self.evaluate(state, other)? {
                        refined.set(variable.clone(), Flat::Value(constant));
                    }
                }
            }
        }
        Ok(vec![refined])
    }
}

impl ProgramAnalysis for ValueAnalysis {
    type State = ValueMap;

    fn abstract_succ(&self, _: &ValueMap) -> Result<Vec<ValueMap>, Error> {
        Err(Error::Unsupported(
            "value analysis only steps through labeled operations".to_string(),
        ))
    }

    fn join(&self, a: &ValueMap, b: &ValueMap) -> Result<ValueMap, Error> {
        self.values.join(a, b)
    }

    fn should_merge(&self, a: &ValueMap, b: &ValueMap) -> Result<bool, Error> {
        self.merge_operator.should_merge(a, b)
    }

    fn merge(&self, a: &ValueMap, b: &ValueMap) -> Result<ValueMap, Error> {
        self.merge_operator.merge(a, b)
    }

    fn stop(&self, state: &ValueMap, reached: &[&ValueMap]) -> Result<bool, Error> {
        for r in reached {
            if self.values.is_included(state, r)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn widen(&self, state: &ValueMap, _: &[&ValueMap]) -> Result<ValueMap, Error> {
        Ok(state.clone())
    }

    fn target(&self, _: &ValueMap) -> BTreeSet<Property> {
        BTreeSet::new()
    }

    fn initial_states_for(&self, _: &Task) -> Result<Vec<ValueMap>, Error> {
        Ok(vec![ValueMap::new()])
    }

    fn state_formula(&self, state: &ValueMap) -> Result<Formula, Error> {
        if state.is_bottom() {
            return Ok(Formula::bottom());
        }
        let mut formula = Formula::top();
        for (variable, constant) in state.values() {
            let equality =
                Expression::cmpeq(variable.clone().into(), constant.clone().into())?;
            formula = formula.conjunction(&Formula::from_expression(&equality)?);
        }
        Ok(formula)
    }

    fn reset_path(&self, _: &ValueMap) -> Result<ValueMap, Error> {
        Ok(ValueMap::new())
    }

    fn variable_values(&self, state: &ValueMap) -> BTreeMap<Variable, Constant> {
        state
            .values()
            .map(|(variable, constant)| (variable.clone(), constant.clone()))
            .collect()
    }
}

impl LabeledTransferRelation for ValueAnalysis {
    fn abstract_succ_for(
        &self,
        state: &ValueMap,
        operation: &LabeledOperation,
    ) -> Result<Vec<ValueMap>, Error> {
        if state.is_bottom() {
            return Ok(Vec::new());
        }
        match &operation.statement {
            Statement::Declare(variable) => {
                let mut successor = state.clone();
                successor.set(
                    variable.clone(),
                    Flat::Value(variable.data_type().default_value()),
                );
                Ok(vec![successor])
            }
            Statement::Assign {
                variable,
                expression,
            } => {
                let mut successor = state.clone();
                successor.set(variable.clone(), self.evaluate(state, expression)?);
                Ok(vec![successor])
            }
            Statement::Assume(condition) => self.assume(state, condition),
            _ => Ok(vec![state.clone()]),
        }
    }
}

impl AnalysisLayer for ValueAnalysis {
    fn name(&self) -> &'static str {
        "ValueAnalysis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PROVIDES_FORMULA
    }

    fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{expr_int, expr_var};

    fn step(statement: Statement) -> LabeledOperation {
        LabeledOperation {
            thread: 0,
            operation: None,
            statement,
            big_step: 0,
            step_start: true,
        }
    }

    fn apply(analysis: &ValueAnalysis, state: &ValueMap, statement: Statement) -> Vec<ValueMap> {
        analysis.abstract_succ_for(state, &step(statement)).unwrap()
    }

    #[test]
    fn propagate_constants() {
        let analysis = ValueAnalysis::new("SEP").unwrap();
        let x1 = Variable::integer("x").with_version(1);
        let x2 = Variable::integer("x").with_version(2);

        let state = apply(&analysis, &ValueMap::new(), Statement::Declare(x1.clone()));
        assert_eq!(state[0].value(&x1), Some(Constant::integer(0)));

        let increment = Expression::add(expr_var(&x1), expr_int(3)).unwrap();
        let state = apply(&analysis, &state[0], Statement::assign(x2.clone(), increment));
        assert_eq!(state[0].value(&x2), Some(Constant::integer(3)));

        let formula = analysis.state_formula(&state[0]).unwrap();
        assert_eq!(formula.variables().len(), 2);
    }

    #[test]
    fn unknown_values_become_top() {
        let analysis = ValueAnalysis::new("SEP").unwrap();
        let x = Variable::integer("x").with_version(1);
        let y = Variable::integer("y").with_version(1);

        let state = apply(
            &analysis,
            &ValueMap::new(),
            Statement::assign(x.clone(), Expression::div(expr_var(&y), expr_int(0)).unwrap()),
        );
        assert_eq!(state[0].get(&x), Flat::Top);
    }

    #[test]
    fn assumptions_prune_and_refine() {
        let analysis = ValueAnalysis::new("JOIN").unwrap();
        let x = Variable::integer("x").with_version(1);
        let y = Variable::integer("y").with_version(1);

        let mut state = ValueMap::new();
        state.set(x.clone(), Flat::Value(Constant::integer(1)));

        let false_assumption = Expression::cmplt(expr_var(&x), expr_int(0)).unwrap();
        assert!(apply(&analysis, &state, Statement::Assume(false_assumption)).is_empty());

        let equality = Expression::cmpeq(expr_var(&y), expr_var(&x)).unwrap();
        let refined = apply(&analysis, &state, Statement::Assume(equality));
        assert_eq!(refined[0].value(&y), Some(Constant::integer(1)));

        assert!(apply(&analysis, &ValueMap::Bottom, Statement::Nop).is_empty());
        assert!(analysis.reset_path(&refined[0]).unwrap().values().next().is_none());
    }
}
