use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::lattice::Lattice;
use crate::task::Variable;
use crate::Error;

/// The version of a variable that has not been declared yet.
pub const NOT_DECLARED_INDEX: usize = 0;

/// The version a variable receives with its first declaration.
pub const INITIALLY_DECLARED_INDEX: usize = 1;

/// The current SSA version of every variable.
///
/// Variables are keyed without their version. A variable without an entry is
/// at `NOT_DECLARED_INDEX`, which is never stored.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct VersionMap {
    versions: BTreeMap<Variable, usize>,
}

impl VersionMap {
    pub fn new() -> VersionMap {
        VersionMap::default()
    }

    pub fn version(&self, variable: &Variable) -> usize {
        self.versions
            .get(&variable.base())
            .cloned()
            .unwrap_or(NOT_DECLARED_INDEX)
    }

    /// Bump the version of a variable, returning the new version.
    pub fn bump(&mut self, variable: &Variable) -> usize {
        let version = self.version(variable) + 1;
        self.versions.insert(variable.base(), version);
        version
    }

    /// The variable at its current version.
    pub fn current(&self, variable: &Variable) -> Variable {
        variable.base().with_version(self.version(variable))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, usize)> {
        self.versions.iter().map(|(variable, version)| (variable, *version))
    }
}

/// Version maps ordered pointwise, so join takes the maximum version.
#[derive(Clone, Debug, Default)]
pub struct VersionMapLattice;

impl VersionMapLattice {
    pub fn new() -> VersionMapLattice {
        VersionMapLattice
    }
}

impl Lattice for VersionMapLattice {
    type Element = VersionMap;

    fn top(&self) -> Result<VersionMap, Error> {
        Err(Error::Unsupported("version maps have no top element".to_string()))
    }

    fn bottom(&self) -> Result<VersionMap, Error> {
        Ok(VersionMap::new())
    }

    fn join(&self, a: &VersionMap, b: &VersionMap) -> Result<VersionMap, Error> {
        let mut result = a.clone();
        for (variable, version) in b.iter() {
            if version > result.version(variable) {
                result.versions.insert(variable.clone(), version);
            }
        }
        Ok(result)
    }

    fn meet(&self, a: &VersionMap, b: &VersionMap) -> Result<VersionMap, Error> {
        let versions = a
            .iter()
            .filter_map(|(variable, version)| {
                let other = b.version(variable);
                if other == NOT_DECLARED_INDEX {
                    None
                } else {
                    Some((variable.clone(), version.min(other)))
                }
            })
            .collect();
        Ok(VersionMap { versions })
    }

    fn is_included(&self, a: &VersionMap, b: &VersionMap) -> Result<bool, Error> {
        Ok(a.iter().all(|(variable, version)| version <= b.version(variable)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::laws::check_lattice_laws;

    fn versions(entries: &[(&str, usize)]) -> VersionMap {
        let mut map = VersionMap::new();
        for (name, version) in entries {
            for _ in 0..*version {
                map.bump(&Variable::integer(*name));
            }
        }
        map
    }

    #[test]
    fn version_map_lattice_laws() {
        check_lattice_laws(
            &VersionMapLattice::new(),
            &[
                versions(&[]),
                versions(&[("x", 1)]),
                versions(&[("x", 3)]),
                versions(&[("x", 2), ("y", 1)]),
                versions(&[("y", 4)]),
            ],
        );
    }

    #[test]
    fn bump_and_current() {
        let x = Variable::integer("x");
        let mut map = VersionMap::new();

        assert_eq!(map.version(&x), NOT_DECLARED_INDEX);
        assert_eq!(map.bump(&x), INITIALLY_DECLARED_INDEX);
        assert_eq!(map.bump(&x.with_version(7)), 2);
        assert_eq!(map.current(&x).identifier(), "x@2");
    }

    #[test]
    fn join_takes_maximum() {
        let joined = VersionMapLattice::new()
            .join(&versions(&[("x", 2), ("y", 1)]), &versions(&[("x", 1), ("y", 3)]))
            .unwrap();
        assert_eq!(joined, versions(&[("x", 2), ("y", 3)]));
    }
}
