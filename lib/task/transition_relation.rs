//! The control flow of a script or method.
//!
//! A `TransitionRelation` is a graph over control locations. Every edge is
//! labelled with one or more operations; each of them is an alternative way
//! of moving from the head to the tail location.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::graph::{Edge, Graph, Vertex};
use crate::task::OperationId;
use crate::Error;

pub type LocationId = usize;

/// A control location
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Location {
    index: LocationId,
}

impl Location {
    pub fn new(index: LocationId) -> Location {
        Location { index }
    }
}

impl Vertex for Location {
    fn index(&self) -> usize {
        self.index
    }

    fn dot_label(&self) -> String {
        format!("L{}", self.index)
    }
}

/// An edge between two control locations.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Transition {
    head: LocationId,
    tail: LocationId,
    operations: Vec<OperationId>,
}

impl Transition {
    pub fn operations(&self) -> &[OperationId] {
        &self.operations
    }
}

impl Edge for Transition {
    fn head(&self) -> usize {
        self.head
    }

    fn tail(&self) -> usize {
        self.tail
    }

    fn dot_label(&self) -> String {
        let operations: Vec<String> = self.operations.iter().map(|o| o.to_string()).collect();
        operations.join(", ")
    }
}

/// One way of leaving a location: the operation taken and where it leads.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct TransitionTarget {
    pub operation: OperationId,
    pub target: LocationId,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TransitionRelation {
    graph: Graph<Location, Transition>,
    entry_locations: BTreeSet<LocationId>,
    loop_heads: BTreeSet<LocationId>,
}

impl TransitionRelation {
    pub fn new() -> TransitionRelation {
        TransitionRelation {
            graph: Graph::new(),
            entry_locations: BTreeSet::new(),
            loop_heads: BTreeSet::new(),
        }
    }

    /// Build a relation from its entry locations and `(head, operation, tail)`
    /// triples.
    pub fn from_transitions(
        entry_locations: &[LocationId],
        transitions: &[(LocationId, OperationId, LocationId)],
    ) -> Result<TransitionRelation, Error> {
        let mut relation = TransitionRelation::new();
        for &entry in entry_locations {
            relation.add_entry_location(entry)?;
        }
        for &(head, operation, tail) in transitions {
            relation.add_transition(head, operation, tail)?;
        }
        Ok(relation)
    }

    /// Adds a location, doing nothing if it already exists.
    pub fn add_location(&mut self, index: LocationId) -> Result<(), Error> {
        if !self.graph.has_vertex(index) {
            self.graph.insert_vertex(Location::new(index))?;
        }
        Ok(())
    }

    pub fn add_entry_location(&mut self, index: LocationId) -> Result<(), Error> {
        self.add_location(index)?;
        self.entry_locations.insert(index);
        self.update_loop_heads()
    }

    pub fn add_transition(
        &mut self,
        head: LocationId,
        operation: OperationId,
        tail: LocationId,
    ) -> Result<(), Error> {
        self.add_location(head)?;
        self.add_location(tail)?;
        if self.graph.has_edge(head, tail) {
            let transition = self.graph.edge_mut(head, tail)?;
            if !transition.operations.contains(&operation) {
                transition.operations.push(operation);
            }
        } else {
            self.graph.insert_edge(Transition {
                head,
                tail,
                operations: vec![operation],
            })?;
        }
        self.update_loop_heads()
    }

    fn update_loop_heads(&mut self) -> Result<(), Error> {
        let roots: Vec<LocationId> = self.entry_locations.iter().cloned().collect();
        self.loop_heads = self.graph.compute_loop_heads(&roots)?;
        Ok(())
    }

    pub fn entry_locations(&self) -> &BTreeSet<LocationId> {
        &self.entry_locations
    }

    pub fn has_location(&self, index: LocationId) -> bool {
        self.graph.has_vertex(index)
    }

    pub fn locations(&self) -> Vec<LocationId> {
        self.graph.vertices().iter().map(|v| v.index()).collect()
    }

    /// All ways of leaving the given location.
    pub fn transitions_from(&self, location: LocationId) -> Result<Vec<TransitionTarget>, Error> {
        Ok(self
            .graph
            .edges_out(location)?
            .into_iter()
            .flat_map(|transition| {
                transition
                    .operations
                    .iter()
                    .map(move |&operation| TransitionTarget {
                        operation,
                        target: transition.tail,
                    })
            })
            .collect())
    }

    pub fn has_transitions_from(&self, location: LocationId) -> Result<bool, Error> {
        Ok(!self.graph.successor_indices(location)?.is_empty())
    }

    /// Returns true if the location heads a loop of this relation.
    pub fn is_loop_head(&self, location: LocationId) -> bool {
        self.loop_heads.contains(&location)
    }

    /// Every operation any transition of this relation refers to.
    pub fn operations(&self) -> BTreeSet<OperationId> {
        self.graph
            .edges()
            .into_iter()
            .flat_map(|transition| transition.operations.iter().cloned())
            .collect()
    }

    pub fn graph(&self) -> &Graph<Location, Transition> {
        &self.graph
    }
}

impl Default for TransitionRelation {
    fn default() -> TransitionRelation {
        TransitionRelation::new()
    }
}

impl fmt::Display for TransitionRelation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.graph.dot_graph())
    }
}
