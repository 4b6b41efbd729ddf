//! Core data model: task specs, subtasks, and the dependency graph.

pub mod graph;
pub mod spec;
pub mod subtask;

pub use graph::{build_graph, DependencyGraph};
pub use spec::{DatabaseSpec, Feature, MinGranularity, Priority, TaskSpec};
pub use subtask::{ExecutionResult, ExecutionStatus, SplitKind, SplitPoint, Subtask, SubtaskId};
