//! Error witnesses: the path to a violation, exported as JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{AccessibilityRelation, ProgramAnalysis, ReachedSet, StateId};
use crate::lattice::{Model, NOT_DECLARED_INDEX};
use crate::task::{Constant, Expression, Property, Task, Variable};
use crate::Error;

/// The values of one actor's variables at one step.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorValues {
    pub name: String,
    pub variables: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorWitnessStep {
    pub id: StateId,
    pub timestamp: usize,
    /// The operations that led into this step.
    pub action: String,
    pub actors: Vec<ActorValues>,
}

/// Inputs a replay must provide to follow the witness.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mock {
    #[serde(rename_all = "camelCase")]
    ReturnValues { function: String, values: Vec<Value> },
    #[serde(rename_all = "camelCase")]
    ActorAssignments {
        actor: String,
        assignments: Vec<BTreeMap<String, Value>>,
    },
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorWitness {
    pub program_name: String,
    pub violations: Vec<String>,
    pub steps: Vec<ErrorWitnessStep>,
    pub mocks: Vec<Mock>,
}

fn json_of(constant: &Constant) -> Value {
    match constant {
        Constant::Integer(value) => match i64::try_from(value) {
            Ok(value) => Value::from(value),
            Err(_) => Value::String(value.to_string()),
        },
        Constant::Boolean(value) => Value::Bool(*value),
        Constant::String(value) => Value::String(value.clone()),
    }
}

/// Values of `state`: what the analysis tracks, completed with the model
/// value of each variable's current instance.
fn values_at<A: ProgramAnalysis>(
    analysis: &A,
    state: &A::State,
    model: &Model,
) -> Result<BTreeMap<Variable, Constant>, Error> {
    let mut values = analysis.variable_values(state);
    let bases: BTreeSet<Variable> = model.keys().map(|variable| variable.base()).collect();
    for base in bases {
        if values.contains_key(&base) {
            continue;
        }
        let instance = analysis.instantiate_predicate(state, &Expression::Variable(base.clone()))?;
        if let Expression::Variable(instance) = instance {
            if instance.version().map_or(true, |v| v == NOT_DECLARED_INDEX) {
                continue;
            }
            if let Some(constant) = model.get(&instance) {
                values.insert(base, constant.clone());
            }
        }
    }
    Ok(values)
}

/// Undeclared variables are inputs to the program. Their model values are
/// what a replay has to assign before it starts.
fn input_mocks(model: &Model) -> Vec<Mock> {
    let mut by_actor: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
    for (variable, constant) in model {
        if variable.version() != Some(NOT_DECLARED_INDEX) {
            continue;
        }
        by_actor
            .entry(variable.actor().to_string())
            .or_default()
            .insert(variable.local_name().to_string(), json_of(constant));
    }
    by_actor
        .into_iter()
        .map(|(actor, assignments)| Mock::ActorAssignments {
            actor,
            assignments: vec![assignments],
        })
        .collect()
}

impl ErrorWitness {
    /// The witness for the path to `target` through the reached states.
    /// `model` satisfies the path formula of `target`.
    pub fn build<A: ProgramAnalysis>(
        analysis: &A,
        task: &Task,
        reached: &ReachedSet<A::State>,
        accessibility: &AccessibilityRelation,
        target: &A::State,
        violations: &BTreeSet<Property>,
        model: &Model,
    ) -> Result<ErrorWitness, Error> {
        let target_id = analysis
            .provenance(target)
            .map(|provenance| provenance.id)
            .ok_or_else(|| {
                Error::Precondition("error witnesses need provenance tracking".to_string())
            })?;

        let by_id: BTreeMap<StateId, &A::State> = reached
            .iter()
            .filter_map(|state| analysis.provenance(state).map(|p| (p.id, state)))
            .collect();

        let mut steps = Vec::new();
        for (timestamp, id) in accessibility.path_to(target_id)?.into_iter().enumerate() {
            let state = by_id
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::InvariantViolation(format!("state {} is not reached", id)))?;

            let label = analysis.transition_label(state);
            let action = if label.is_empty() {
                "initial".to_string()
            } else {
                let transfers: Vec<String> = label
                    .iter()
                    .map(|t| format!("T{}: {}", t.thread, t.statement))
                    .collect();
                transfers.join("; ")
            };

            let mut actors: BTreeMap<String, ActorValues> = BTreeMap::new();
            for (variable, constant) in values_at(analysis, state, model)? {
                let actor = actors
                    .entry(variable.actor().to_string())
                    .or_insert_with(|| ActorValues {
                        name: variable.actor().to_string(),
                        variables: BTreeMap::new(),
                    });
                actor
                    .variables
                    .insert(variable.local_name().to_string(), json_of(&constant));
            }

            steps.push(ErrorWitnessStep {
                id,
                timestamp,
                action,
                actors: actors.into_values().collect(),
            });
        }

        Ok(ErrorWitness {
            program_name: task.name().to_string(),
            violations: violations.iter().map(|p| p.name().to_string()).collect(),
            steps,
            mocks: input_mocks(model),
        })
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<ErrorWitness, Error> {
        Ok(serde_json::from_str(json)?)
    }
}
