use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{ProgramAnalysis, ReachedSet, StateId};
use crate::graph::{Graph, NullEdge, NullVertex};
use crate::Error;

/// Which reached state was computed from which.
///
/// Vertices are the ids of the reached states. A state that was merged away
/// lives on in the merge result, so an edge from a merged-away predecessor
/// starts at the reached state it was merged into.
#[derive(Clone, Debug)]
pub struct AccessibilityRelation {
    graph: Graph<NullVertex, NullEdge>,
    aliases: BTreeMap<StateId, StateId>,
}

impl AccessibilityRelation {
    pub fn from_reached<A: ProgramAnalysis>(
        analysis: &A,
        reached: &ReachedSet<A::State>,
    ) -> Result<AccessibilityRelation, Error> {
        let provenances: Vec<_> = reached
            .iter()
            .filter_map(|state| analysis.provenance(state))
            .collect();

        let mut graph = Graph::new();
        let mut aliases = BTreeMap::new();
        for provenance in &provenances {
            if !graph.has_vertex(provenance.id) {
                graph.insert_vertex(NullVertex::new(provenance.id))?;
            }
            for &merged in &provenance.merge_of {
                aliases.insert(merged, provenance.id);
            }
        }
        // a reached state is always its own representative
        for provenance in &provenances {
            aliases.insert(provenance.id, provenance.id);
        }

        for provenance in &provenances {
            for predecessor in &provenance.predecessors {
                let head = match aliases.get(predecessor) {
                    Some(&head) => head,
                    None => continue,
                };
                if head != provenance.id && !graph.has_edge(head, provenance.id) {
                    graph.insert_edge(NullEdge::new(head, provenance.id))?;
                }
            }
        }

        Ok(AccessibilityRelation { graph, aliases })
    }

    /// The reached state standing for `id`.
    pub fn resolve(&self, id: StateId) -> Option<StateId> {
        self.aliases.get(&id).cloned()
    }

    pub fn predecessors(&self, id: StateId) -> Result<Vec<StateId>, Error> {
        self.graph.predecessor_indices(id)
    }

    pub fn successors(&self, id: StateId) -> Result<Vec<StateId>, Error> {
        self.graph.successor_indices(id)
    }

    /// A path of reached states from a state without predecessors to `id`,
    /// taking the smallest unvisited predecessor at every step.
    pub fn path_to(&self, id: StateId) -> Result<Vec<StateId>, Error> {
        let mut path = vec![id];
        let mut visited = BTreeSet::new();
        visited.insert(id);

        let mut current = id;
        while let Some(predecessor) = self
            .graph
            .predecessor_indices(current)?
            .into_iter()
            .filter(|p| !visited.contains(p))
            .min()
        {
            path.push(predecessor);
            visited.insert(predecessor);
            current = predecessor;
        }

        path.reverse();
        Ok(path)
    }

    pub fn graph(&self) -> &Graph<NullVertex, NullEdge> {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.graph.num_vertices()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
