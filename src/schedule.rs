//! Layer scheduling over the dependency graph.
//!
//! Converts the precedence graph into an ordered sequence of layers, each
//! independently parallelizable, via a Kahn-style topological pass. A
//! residual cycle does not deadlock or error: all remaining nodes are
//! forced into one final layer and a warning is logged so callers can
//! detect heuristic mis-inference.

use std::collections::{HashMap, HashSet};

use crate::core::graph::DependencyGraph;
use crate::core::subtask::SubtaskId;
use crate::flog_warn;

/// An ordered set of subtask ids whose dependencies have all completed by
/// the time the layer is scheduled (cycle fallback excepted).
pub type Layer = Vec<SubtaskId>;

/// Compute the execution layers for a graph.
///
/// Invariant under acyclic input: for every edge (u, v),
/// `layer_index(u) < layer_index(v)`. Every node appears in exactly one
/// layer, cyclic or not.
pub fn topological_layers(graph: &DependencyGraph) -> Vec<Layer> {
    let mut in_degree: HashMap<&SubtaskId, usize> = graph
        .nodes()
        .into_iter()
        .map(|id| (id, graph.in_degree(id)))
        .collect();
    let mut remaining: HashSet<&SubtaskId> = graph.nodes().into_iter().collect();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        // Decomposition order keeps layer contents deterministic.
        let mut layer: Vec<&SubtaskId> = graph
            .nodes()
            .into_iter()
            .filter(|id| remaining.contains(id) && in_degree[id] == 0)
            .collect();

        if layer.is_empty() {
            // Residual cycle: force everything left into one layer rather
            // than deadlocking.
            flog_warn!(
                "topological_layers: cycle detected, forcing {} remaining subtasks into one layer",
                remaining.len()
            );
            layer = graph
                .nodes()
                .into_iter()
                .filter(|id| remaining.contains(id))
                .collect();
        }

        for id in &layer {
            remaining.remove(*id);
            for dependent in graph.dependents(id) {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                }
            }
        }

        layers.push(layer.into_iter().cloned().collect());
    }

    layers
}
