//! Subtask data model for the decomposition pipeline.
//!
//! Subtasks are the atomic units of work produced by decomposing a task
//! specification. Each subtask tracks its split axis, inherited payload,
//! dependency set, and estimated duration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::spec::Priority;

/// Unique identifier for a subtask within one decomposition run.
///
/// Derived from the parent id, expansion depth, and sibling index
/// (`{parent}-sub-{depth}-{index}`), so it is stable across identical runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubtaskId(pub String);

impl SubtaskId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Derive a child id from a parent id, depth, and sibling index.
    pub fn derive(parent: &str, depth: usize, index: usize) -> Self {
        Self(format!("{}-sub-{}-{}", parent, depth, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubtaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubtaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Decomposition axis of a split point or subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    File,
    Feature,
    Endpoint,
    Database,
    /// Generic fallback split targeting the task's own id.
    Task,
}

impl SplitKind {
    /// Default complexity weight for this axis.
    pub fn default_weight(&self) -> f64 {
        match self {
            SplitKind::Database => 2.0,
            SplitKind::Feature => 1.5,
            SplitKind::Endpoint => 1.2,
            SplitKind::File => 1.0,
            SplitKind::Task => 1.0,
        }
    }
}

impl std::fmt::Display for SplitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitKind::File => write!(f, "file"),
            SplitKind::Feature => write!(f, "feature"),
            SplitKind::Endpoint => write!(f, "endpoint"),
            SplitKind::Database => write!(f, "database"),
            SplitKind::Task => write!(f, "task"),
        }
    }
}

/// A candidate decomposition axis discovered from a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPoint {
    pub kind: SplitKind,
    pub target: String,
    pub complexity_weight: f64,
}

impl SplitPoint {
    pub fn new(kind: SplitKind, target: &str) -> Self {
        Self {
            kind,
            target: target.to_string(),
            complexity_weight: kind.default_weight(),
        }
    }

    pub fn with_weight(kind: SplitKind, target: &str, weight: f64) -> Self {
        Self {
            kind,
            target: target.to_string(),
            complexity_weight: weight,
        }
    }
}

/// An atomic unit of work produced by applying a split point to a parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Globally unique within one decomposition run.
    pub id: SubtaskId,
    /// Back-reference for lookup only; never owning.
    pub parent_id: Option<SubtaskId>,
    pub split_kind: SplitKind,
    pub target: String,
    pub complexity_weight: f64,
    /// Inherited from the root spec, unmodified.
    pub payload: serde_json::Value,
    /// Populated by the dependency grapher; initially empty.
    pub dependencies: HashSet<SubtaskId>,
    /// Simulation/estimation hint: complexity_weight x 1000.
    pub estimated_duration_ms: u64,
    pub priority: Priority,
}

impl Subtask {
    pub fn new(
        id: SubtaskId,
        parent_id: Option<SubtaskId>,
        split_kind: SplitKind,
        target: &str,
        complexity_weight: f64,
        payload: serde_json::Value,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            parent_id,
            split_kind,
            target: target.to_string(),
            complexity_weight,
            payload,
            dependencies: HashSet::new(),
            estimated_duration_ms: (complexity_weight * 1000.0) as u64,
            priority,
        }
    }

    /// Record a dependency on another subtask.
    ///
    /// Self-dependencies are ignored: a subtask's dependency set never
    /// contains its own id.
    pub fn add_dependency(&mut self, on: SubtaskId) {
        if on != self.id {
            self.dependencies.insert(on);
        }
    }

    pub fn depends_on(&self, other: &SubtaskId) -> bool {
        self.dependencies.contains(other)
    }
}

/// Terminal status of a single subtask invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    Failed,
    TimedOut,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Succeeded => write!(f, "succeeded"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Outcome of one subtask invocation. Produced once per subtask per run
/// and never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub subtask_id: SubtaskId,
    pub status: ExecutionStatus,
    /// Present only on success.
    pub output: Option<serde_json::Value>,
    /// Present on failure or timeout.
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn succeeded(subtask_id: SubtaskId, output: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            subtask_id,
            status: ExecutionStatus::Succeeded,
            output: Some(output),
            error_message: None,
            duration_ms,
        }
    }

    pub fn failed(subtask_id: SubtaskId, error: &str, duration_ms: u64) -> Self {
        Self {
            subtask_id,
            status: ExecutionStatus::Failed,
            output: None,
            error_message: Some(error.to_string()),
            duration_ms,
        }
    }

    pub fn timed_out(subtask_id: SubtaskId, timeout_ms: u64) -> Self {
        Self {
            subtask_id,
            status: ExecutionStatus::TimedOut,
            output: None,
            error_message: Some(format!("timed out after {}ms", timeout_ms)),
            duration_ms: timeout_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }
}
