// src/dag/graph.rs

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;

use crate::types::JobId;

/// Dependency edges between submitted jobs.
///
/// Edge direction: dependency -> dependent. For a job B submitted with
/// `deps = [A]` we add the edge A -> B, so the outgoing neighbours of a job
/// are exactly the jobs waiting on it. Completion handling walks only those
/// edges instead of rescanning every registered job.
///
/// Neighbour iteration follows insertion order, which keeps dependent
/// re-evaluation deterministic.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    graph: DiGraphMap<JobId, ()>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job(&mut self, id: JobId) {
        self.graph.add_node(id);
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.graph.contains_node(id)
    }

    /// Record that `dependent` must wait for `dependency`.
    ///
    /// Returns `false` if the edge was already present.
    pub fn add_edge(&mut self, dependency: JobId, dependent: JobId) -> bool {
        if self.graph.contains_edge(dependency, dependent) {
            return false;
        }
        self.graph.add_edge(dependency, dependent, ());
        true
    }

    pub fn has_edge(&self, dependency: JobId, dependent: JobId) -> bool {
        self.graph.contains_edge(dependency, dependent)
    }

    /// Whether adding `dependency -> dependent` would close a cycle, i.e.
    /// `dependency` is already reachable from `dependent`.
    pub fn would_create_cycle(&self, dependent: JobId, dependency: JobId) -> bool {
        if !self.contains(dependent) || !self.contains(dependency) {
            return false;
        }
        has_path_connecting(&self.graph, dependent, dependency, None)
    }

    /// Immediate dependencies of a job (incoming edges).
    pub fn dependencies_of(&self, id: JobId) -> Vec<JobId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.graph
            .neighbors_directed(id, Direction::Incoming)
            .collect()
    }

    /// Immediate dependents of a job (outgoing edges).
    pub fn dependents_of(&self, id: JobId) -> Vec<JobId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect()
    }

    /// Drop a job and every edge touching it.
    pub fn remove_job(&mut self, id: JobId) {
        self.graph.remove_node(id);
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}
