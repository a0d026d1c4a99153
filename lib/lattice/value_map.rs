use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::lattice::{Flat, FlatLattice, Lattice};
use crate::task::{Constant, Variable};
use crate::Error;

/// A map from variables to the one constant they are known to hold.
///
/// A variable without an entry may hold any value. `Bottom` describes no
/// state at all.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ValueMap {
    Bottom,
    Values(BTreeMap<Variable, Constant>),
}

impl ValueMap {
    /// The map which knows nothing.
    pub fn new() -> ValueMap {
        ValueMap::Values(BTreeMap::new())
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, ValueMap::Bottom)
    }

    pub fn get(&self, variable: &Variable) -> Flat<Constant> {
        match self {
            ValueMap::Bottom => Flat::Bottom,
            ValueMap::Values(values) => match values.get(variable) {
                Some(constant) => Flat::Value(constant.clone()),
                None => Flat::Top,
            },
        }
    }

    /// The constant the variable holds, if it is known.
    pub fn value(&self, variable: &Variable) -> Option<Constant> {
        self.get(variable).value().cloned()
    }

    /// Set a variable to an abstract value. Setting `Top` removes the entry,
    /// setting `Bottom` makes the whole map bottom.
    pub fn set(&mut self, variable: Variable, value: Flat<Constant>) {
        if let ValueMap::Values(values) = self {
            match value {
                Flat::Value(constant) => {
                    values.insert(variable, constant);
                }
                Flat::Top => {
                    values.remove(&variable);
                }
                Flat::Bottom => *self = ValueMap::Bottom,
            }
        }
    }

    /// The known values, empty for bottom.
    pub fn values(&self) -> impl Iterator<Item = (&Variable, &Constant)> {
        let values = match self {
            ValueMap::Bottom => None,
            ValueMap::Values(values) => Some(values.iter()),
        };
        values.into_iter().flatten()
    }
}

impl Default for ValueMap {
    fn default() -> ValueMap {
        ValueMap::new()
    }
}

impl fmt::Display for ValueMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueMap::Bottom => write!(f, "⊥"),
            ValueMap::Values(values) => {
                let values: Vec<String> = values
                    .iter()
                    .map(|(variable, constant)| format!("{}={}", variable, constant))
                    .collect();
                write!(f, "{{{}}}", values.join(", "))
            }
        }
    }
}

/// The pointwise lifting of the flat constant lattice to variable maps.
#[derive(Clone, Debug, Default)]
pub struct ValueMapLattice {
    values: FlatLattice<Constant>,
}

impl ValueMapLattice {
    pub fn new() -> ValueMapLattice {
        ValueMapLattice {
            values: FlatLattice::new(),
        }
    }
}

impl Lattice for ValueMapLattice {
    type Element = ValueMap;

    fn top(&self) -> Result<ValueMap, Error> {
        Ok(ValueMap::new())
    }

    fn bottom(&self) -> Result<ValueMap, Error> {
        Ok(ValueMap::Bottom)
    }

    fn join(&self, a: &ValueMap, b: &ValueMap) -> Result<ValueMap, Error> {
        match (a, b) {
            (ValueMap::Bottom, _) => Ok(b.clone()),
            (_, ValueMap::Bottom) => Ok(a.clone()),
            (ValueMap::Values(values), _) => {
                let mut result = ValueMap::new();
                for (variable, constant) in values {
                    let joined = self
                        .values
                        .join(&Flat::Value(constant.clone()), &b.get(variable))?;
                    result.set(variable.clone(), joined);
                }
                Ok(result)
            }
        }
    }

    fn meet(&self, a: &ValueMap, b: &ValueMap) -> Result<ValueMap, Error> {
        let (mut result, other) = match (a, b) {
            (ValueMap::Bottom, _) | (_, ValueMap::Bottom) => return Ok(ValueMap::Bottom),
            (_, ValueMap::Values(other)) => (a.clone(), other),
        };
        for (variable, constant) in other {
            let met = self
                .values
                .meet(&result.get(variable), &Flat::Value(constant.clone()))?;
            result.set(variable.clone(), met);
        }
        Ok(result)
    }

    fn is_included(&self, a: &ValueMap, b: &ValueMap) -> Result<bool, Error> {
        match (a, b) {
            (ValueMap::Bottom, _) => Ok(true),
            (_, ValueMap::Bottom) => Ok(false),
            (_, ValueMap::Values(values)) => {
                for (variable, constant) in values {
                    if !self
                        .values
                        .is_included(&a.get(variable), &Flat::Value(constant.clone()))?
                    {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::laws::check_lattice_laws;

    fn map(entries: &[(&str, i64)]) -> ValueMap {
        let mut map = ValueMap::new();
        for (name, value) in entries {
            map.set(Variable::integer(*name), Flat::Value(Constant::integer(*value)));
        }
        map
    }

    #[test]
    fn value_map_lattice_laws() {
        check_lattice_laws(
            &ValueMapLattice::new(),
            &[
                ValueMap::Bottom,
                map(&[]),
                map(&[("x", 1)]),
                map(&[("x", 2)]),
                map(&[("x", 1), ("y", 1)]),
                map(&[("y", 1)]),
            ],
        );
    }

    #[test]
    fn join_forgets_disagreeing_variables() {
        let lattice = ValueMapLattice::new();
        let joined = lattice
            .join(&map(&[("x", 1), ("y", 5)]), &map(&[("x", 2), ("y", 5)]))
            .unwrap();

        assert_eq!(joined, map(&[("y", 5)]));
        assert_eq!(joined.get(&Variable::integer("x")), Flat::Top);
    }

    #[test]
    fn meet_of_conflicting_maps_is_bottom() {
        let lattice = ValueMapLattice::default();
        assert!(lattice
            .meet(&map(&[("x", 1)]), &map(&[("x", 2)]))
            .unwrap()
            .is_bottom());
        assert_eq!(
            lattice.meet(&map(&[("x", 1)]), &map(&[("y", 2)])).unwrap(),
            map(&[("x", 1), ("y", 2)])
        );
    }
}
