//! Static single assignment renaming of the operations a data analysis sees.
//!
//! Every declaration and assignment gives its variable a fresh version, and
//! every read refers to the current version. A variable that was never
//! declared reads as version `NOT_DECLARED_INDEX`, an unconstrained symbol.
//!
//! When states with different versions meet, the wrapped states are first
//! aligned to the pointwise maximum of the versions by assuming
//! `x@max == x@old` for every variable that lags behind.
//!
//! The layer also keeps the renamed constraints of every operation since the
//! last abstraction point, whatever the wrapped data analysis can express.
//! They are part of the state formula, so a path is checked against the
//! operations actually applied.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{
    AnalysisLayer, Capabilities, LabeledOperation, LabeledTransferRelation, PartitionKey,
    ProgramAnalysis, WrappingAnalysis,
};
use crate::lattice::{Formula, Lattice, VersionMap, VersionMapLattice};
use crate::task::{Constant, Expression, Property, Statement, Task, Variable};
use crate::Error;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SsaState<S> {
    versions: VersionMap,
    declared: BTreeSet<Variable>,
    block: Formula,
    wrapped: S,
}

impl<S> SsaState<S> {
    pub fn versions(&self) -> &VersionMap {
        &self.versions
    }

    /// Every variable declared on the way to this state, unversioned.
    pub fn declared(&self) -> &BTreeSet<Variable> {
        &self.declared
    }

    /// The constraints of the operations applied since the last reset.
    pub fn block(&self) -> &Formula {
        &self.block
    }

    pub fn wrapped(&self) -> &S {
        &self.wrapped
    }
}

pub struct SsaAnalysis<A> {
    wrapped: A,
    versions: VersionMapLattice,
}

fn rename_reads(versions: &VersionMap, expression: &Expression) -> Expression {
    expression.rename(&|variable: &Variable| versions.current(variable))
}

/// The constraint a renamed statement puts on its variables.
fn constraint_of(statement: &Statement) -> Result<Formula, Error> {
    match statement {
        Statement::Declare(variable) => Formula::from_expression(&Expression::cmpeq(
            variable.clone().into(),
            variable.data_type().default_value().into(),
        )?),
        Statement::Assign {
            variable,
            expression,
        } => Formula::from_expression(&Expression::cmpeq(
            variable.clone().into(),
            expression.clone(),
        )?),
        Statement::Assume(condition) => Formula::from_expression(condition),
        _ => Ok(Formula::top()),
    }
}

/// Rename a statement against `versions`, bumping the versions it writes.
fn rename(
    versions: &mut VersionMap,
    declared: &mut BTreeSet<Variable>,
    statement: &Statement,
) -> Statement {
    match statement {
        Statement::Declare(variable) => {
            versions.bump(variable);
            declared.insert(variable.base());
            Statement::Declare(versions.current(variable))
        }
        Statement::Assign {
            variable,
            expression,
        } => {
            let expression = rename_reads(versions, expression);
            versions.bump(variable);
            Statement::assign(versions.current(variable), expression)
        }
        Statement::Assume(condition) => Statement::Assume(rename_reads(versions, condition)),
        Statement::Call {
            method,
            arguments,
            result,
        } => Statement::Call {
            method: method.clone(),
            arguments: arguments.iter().map(|a| rename_reads(versions, a)).collect(),
            result: result.clone(),
        },
        Statement::Return(value) => {
            Statement::Return(value.as_ref().map(|v| rename_reads(versions, v)))
        }
        Statement::Broadcast(message) => Statement::Broadcast(rename_reads(versions, message)),
        Statement::BroadcastAndWait(message) => {
            Statement::BroadcastAndWait(rename_reads(versions, message))
        }
        Statement::WaitUntil(condition) => Statement::WaitUntil(rename_reads(versions, condition)),
        Statement::WaitSecs(seconds) => Statement::WaitSecs(rename_reads(versions, seconds)),
        Statement::SignalFailure(_) | Statement::Nop => statement.clone(),
    }
}

impl<A: LabeledTransferRelation> SsaAnalysis<A> {
    pub fn new(wrapped: A) -> SsaAnalysis<A> {
        SsaAnalysis {
            wrapped,
            versions: VersionMapLattice::new(),
        }
    }

    fn wrap(&self, state: &SsaState<A::State>, wrapped: A::State) -> SsaState<A::State> {
        SsaState {
            versions: state.versions.clone(),
            declared: state.declared.clone(),
            block: state.block.clone(),
            wrapped,
        }
    }

    /// Bring `state` up to `target`. Returns the aligned wrapped state, or
    /// `None` if the alignment contradicts it, together with the block
    /// extended by the alignment equalities.
    fn align(
        &self,
        state: &SsaState<A::State>,
        target: &VersionMap,
    ) -> Result<(Option<A::State>, Formula), Error> {
        let mut block = state.block.clone();
        let mut wrapped = vec![state.wrapped.clone()];
        for (variable, version) in target.iter() {
            let old = state.versions.version(variable);
            if old == version {
                continue;
            }
            let equality = Expression::cmpeq(
                variable.with_version(version).into(),
                variable.with_version(old).into(),
            )?;
            block = block.conjunction(&Formula::from_expression(&equality)?);
            let operation = LabeledOperation::synthesized(Statement::Assume(equality));
            let mut next = Vec::new();
            for w in &wrapped {
                next.extend(self.wrapped.abstract_succ_for(w, &operation)?);
            }
            wrapped = next;
        }
        Ok((wrapped.into_iter().next(), block))
    }

    fn combine<F>(
        &self,
        a: &SsaState<A::State>,
        b: &SsaState<A::State>,
        combine: F,
    ) -> Result<SsaState<A::State>, Error>
    where
        F: Fn(&A::State, &A::State) -> Result<A::State, Error>,
    {
        let versions = self.versions.join(&a.versions, &b.versions)?;
        let declared = a.declared.union(&b.declared).cloned().collect();
        let (wrapped, block) = match (self.align(a, &versions)?, self.align(b, &versions)?) {
            ((Some(a), a_block), (Some(b), b_block)) => {
                (combine(&a, &b)?, a_block.disjunction(&b_block))
            }
            ((Some(only), block), (None, _)) | ((None, _), (Some(only), block)) => (only, block),
            ((None, _), (None, _)) => (b.wrapped.clone(), b.block.clone()),
        };
        Ok(SsaState {
            versions,
            declared,
            block,
            wrapped,
        })
    }
}

impl<A: LabeledTransferRelation> ProgramAnalysis for SsaAnalysis<A> {
    type State = SsaState<A::State>;

    fn abstract_succ(&self, state: &Self::State) -> Result<Vec<Self::State>, Error> {
        Ok(self
            .wrapped
            .abstract_succ(&state.wrapped)?
            .into_iter()
            .map(|w| self.wrap(state, w))
            .collect())
    }

    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        self.combine(a, b, |a, b| self.wrapped.join(a, b))
    }

    fn should_merge(&self, a: &Self::State, b: &Self::State) -> Result<bool, Error> {
        self.wrapped.should_merge(&a.wrapped, &b.wrapped)
    }

    fn merge(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, Error> {
        self.combine(a, b, |a, b| self.wrapped.merge(a, b))
    }

    /// A state is covered by a reached state at the same versions, or by a
    /// reached state whose data is unconstrained. The block of the reached
    /// state must be implied as well.
    fn stop(&self, state: &Self::State, reached: &[&Self::State]) -> Result<bool, Error> {
        for r in reached {
            if !r.block.is_true() && !state.block.implies_syntactically(&r.block) {
                continue;
            }
            if !self.wrapped.stop(&state.wrapped, &[&r.wrapped])? {
                continue;
            }
            if state.versions == r.versions || self.wrapped.state_formula(&r.wrapped)?.is_true() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn widen(&self, state: &Self::State, reached: &[&Self::State]) -> Result<Self::State, Error> {
        let wrapped = self
            .wrapped
            .widen(&state.wrapped, &self.unwrap_all(reached))?;
        Ok(self.wrap(state, wrapped))
    }

    fn target(&self, state: &Self::State) -> BTreeSet<Property> {
        self.wrapped.target(&state.wrapped)
    }

    fn initial_states_for(&self, task: &Task) -> Result<Vec<Self::State>, Error> {
        Ok(self
            .wrapped
            .initial_states_for(task)?
            .into_iter()
            .map(|wrapped| SsaState {
                versions: VersionMap::new(),
                declared: BTreeSet::new(),
                block: Formula::top(),
                wrapped,
            })
            .collect())
    }

    fn partition_key(&self, state: &Self::State) -> PartitionKey {
        self.wrapped.partition_key(&state.wrapped)
    }

    fn state_formula(&self, state: &Self::State) -> Result<Formula, Error> {
        Ok(self
            .wrapped
            .state_formula(&state.wrapped)?
            .conjunction(&state.block))
    }

    fn reset_path(&self, state: &Self::State) -> Result<Self::State, Error> {
        Ok(SsaState {
            block: Formula::top(),
            ..self.wrap(state, self.wrapped.reset_path(&state.wrapped)?)
        })
    }

    fn instantiate_predicate(
        &self,
        state: &Self::State,
        predicate: &Expression,
    ) -> Result<Expression, Error> {
        Ok(rename_reads(&state.versions, predicate))
    }

    /// Values of the current instances, keyed by unversioned variables.
    fn variable_values(&self, state: &Self::State) -> BTreeMap<Variable, Constant> {
        self.wrapped
            .variable_values(&state.wrapped)
            .into_iter()
            .filter(|(variable, _)| variable.version() == Some(state.versions.version(variable)))
            .map(|(variable, constant)| (variable.base(), constant))
            .collect()
    }
}

impl<A: LabeledTransferRelation> LabeledTransferRelation for SsaAnalysis<A> {
    fn abstract_succ_for(
        &self,
        state: &Self::State,
        operation: &LabeledOperation,
    ) -> Result<Vec<Self::State>, Error> {
        let mut versions = state.versions.clone();
        let mut declared = state.declared.clone();
        let statement = rename(&mut versions, &mut declared, &operation.statement);

        let block = state.block.conjunction(&constraint_of(&statement)?);
        if block.is_false() {
            return Ok(Vec::new());
        }

        let renamed = LabeledOperation {
            statement,
            ..operation.clone()
        };
        Ok(self
            .wrapped
            .abstract_succ_for(&state.wrapped, &renamed)?
            .into_iter()
            .map(|wrapped| SsaState {
                versions: versions.clone(),
                declared: declared.clone(),
                block: block.clone(),
                wrapped,
            })
            .collect())
    }
}

impl<A: LabeledTransferRelation> WrappingAnalysis for SsaAnalysis<A> {
    type Wrapped = A;

    fn wrapped_analysis(&self) -> &A {
        &self.wrapped
    }

    fn unwrap<'s>(&self, state: &'s Self::State) -> &'s A::State {
        &state.wrapped
    }
}

impl<A: LabeledTransferRelation + AnalysisLayer> AnalysisLayer for SsaAnalysis<A> {
    fn name(&self) -> &'static str {
        "SsaAnalysis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn wrapped_layer(&self) -> Option<&dyn AnalysisLayer> {
        Some(&self.wrapped)
    }
}
