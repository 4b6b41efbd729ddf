//! Dependency graph over a decomposition run's subtasks.
//!
//! Edges are inferred from a small set of domain heuristics, not from a
//! real dependency analyzer; callers must not treat the absence of an edge
//! as proof of independence. The graph is built once per run and read-only
//! thereafter.

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::core::subtask::{SplitKind, Subtask, SubtaskId};

/// Directed precedence graph: an edge (from, to) means "from must complete
/// before to may start".
///
/// Unlike a build system's DAG, cycles are representable and tolerated;
/// the layer scheduler breaks them by policy rather than rejecting them.
pub struct DependencyGraph {
    /// The underlying directed graph.
    graph: DiGraph<SubtaskId, ()>,
    /// Index mapping from SubtaskId to NodeIndex for fast lookups.
    node_index: HashMap<SubtaskId, NodeIndex>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    /// Add a node for a subtask id.
    ///
    /// Returns the existing NodeIndex if the id is already present.
    pub fn add_node(&mut self, id: SubtaskId) -> NodeIndex {
        if let Some(&index) = self.node_index.get(&id) {
            return index;
        }
        let index = self.graph.add_node(id.clone());
        self.node_index.insert(id, index);
        index
    }

    /// Add a precedence edge (from must complete before to).
    ///
    /// Duplicate edges are dropped; self-edges are ignored. Cycles are
    /// allowed by design.
    pub fn add_edge(&mut self, from: &SubtaskId, to: &SubtaskId) {
        if from == to {
            return;
        }
        let from_idx = self.add_node(from.clone());
        let to_idx = self.add_node(to.clone());
        if self.graph.find_edge(from_idx, to_idx).is_none() {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    pub fn contains(&self, id: &SubtaskId) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn has_edge(&self, from: &SubtaskId, to: &SubtaskId) -> bool {
        match (self.node_index.get(from), self.node_index.get(to)) {
            (Some(&f), Some(&t)) => self.graph.find_edge(f, t).is_some(),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All node ids in insertion (decomposition) order.
    pub fn nodes(&self) -> Vec<&SubtaskId> {
        self.graph.node_weights().collect()
    }

    /// All edges as (from, to) id pairs in insertion order.
    pub fn edges(&self) -> Vec<(&SubtaskId, &SubtaskId)> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (from, to) = self.graph.edge_endpoints(e)?;
                Some((&self.graph[from], &self.graph[to]))
            })
            .collect()
    }

    /// Number of incoming edges for a node.
    pub fn in_degree(&self, id: &SubtaskId) -> usize {
        self.node_index
            .get(id)
            .map(|&idx| {
                self.graph
                    .neighbors_directed(idx, petgraph::Direction::Incoming)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Ids of nodes that directly depend on the given node.
    pub fn dependents(&self, id: &SubtaskId) -> Vec<&SubtaskId> {
        self.node_index
            .get(id)
            .map(|&idx| {
                self.graph
                    .neighbors_directed(idx, petgraph::Direction::Outgoing)
                    .map(|n| &self.graph[n])
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

/// Build the precedence graph for a decomposition run.
///
/// Two heuristics, applied independently (a pair may match both):
/// - every `database` subtask precedes every non-`database` subtask;
/// - every `endpoint` subtask depends on the first `file` subtask whose
///   target contains the endpoint's target as a substring (no edge when
///   nothing matches).
///
/// Also populates each subtask's `dependencies` set. Deterministic: the
/// same subtask sequence always yields the same edge set.
pub fn build_graph(subtasks: &mut [Subtask]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for task in subtasks.iter() {
        graph.add_node(task.id.clone());
    }

    let database_ids: Vec<SubtaskId> = subtasks
        .iter()
        .filter(|t| t.split_kind == SplitKind::Database)
        .map(|t| t.id.clone())
        .collect();

    // Schema changes precede all code that could touch them.
    for task in subtasks.iter_mut() {
        if task.split_kind == SplitKind::Database {
            continue;
        }
        for db_id in &database_ids {
            graph.add_edge(db_id, &task.id);
            task.add_dependency(db_id.clone());
        }
    }

    // Endpoint handlers follow the first file with a textual affinity match.
    let file_targets: Vec<(SubtaskId, String)> = subtasks
        .iter()
        .filter(|t| t.split_kind == SplitKind::File)
        .map(|t| (t.id.clone(), t.target.clone()))
        .collect();

    for task in subtasks.iter_mut() {
        if task.split_kind != SplitKind::Endpoint {
            continue;
        }
        let matched = file_targets
            .iter()
            .find(|(_, target)| target.contains(task.target.as_str()));
        if let Some((file_id, _)) = matched {
            graph.add_edge(file_id, &task.id);
            task.add_dependency(file_id.clone());
        }
    }

    graph
}
