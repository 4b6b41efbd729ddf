//! Task specification submitted by callers.
//!
//! A `TaskSpec` is the root unit of work for one battle run. It is immutable
//! once submitted; the decomposer only reads it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Scheduling priority, inherited by every subtask of the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// Finest decomposition axis the caller wants.
///
/// `File` stops file-split subtasks from being expanded further;
/// `Unbounded` disables that cutoff and leaves termination to `max_depth`
/// and the split rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MinGranularity {
    #[default]
    File,
    Unbounded,
}

/// A named feature with a complexity weight used for duration estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    /// Defaults to 1.5 when the caller omits it.
    #[serde(default = "Feature::default_weight")]
    pub complexity_weight: f64,
}

impl Feature {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            complexity_weight: Self::default_weight(),
        }
    }

    fn default_weight() -> f64 {
        1.5
    }
}

/// Database portion of a task spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DatabaseSpec {
    #[serde(default)]
    pub tables: Vec<String>,
}

/// Root unit of work submitted by a caller. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Caller-supplied identifier; generated when empty.
    #[serde(default)]
    pub id: String,
    /// Ordered file paths this task touches.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Route identifiers.
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub database: DatabaseSpec,
    /// Opaque caller data, passed through to every subtask unmodified.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Optional path to the VCS repository the battle runs against.
    #[serde(default)]
    pub repo: Option<PathBuf>,
    #[serde(default)]
    pub priority: Priority,
    /// Caller hint that no further splitting is meaningful.
    #[serde(default)]
    pub is_atomic: bool,
}

impl TaskSpec {
    /// Create a spec with the given id and nothing else.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            files: Vec::new(),
            features: Vec::new(),
            endpoints: Vec::new(),
            database: DatabaseSpec::default(),
            payload: serde_json::Value::Null,
            repo: None,
            priority: Priority::Normal,
            is_atomic: false,
        }
    }

    /// Generate an id for specs submitted without one.
    ///
    /// Returns the effective id.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_empty() {
            self.id = format!("task-{}", &Uuid::new_v4().to_string()[..8]);
        }
        &self.id
    }

    /// Validate the spec at decomposition entry.
    ///
    /// Malformed split axes (empty targets, non-finite or negative weights)
    /// are rejected here, before any VCS side effects can occur.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Decomposition("task spec has no id".to_string()));
        }
        if self.files.iter().any(|f| f.is_empty()) {
            return Err(Error::Decomposition(format!(
                "task '{}' contains an empty file path",
                self.id
            )));
        }
        if self.endpoints.iter().any(|e| e.is_empty()) {
            return Err(Error::Decomposition(format!(
                "task '{}' contains an empty endpoint",
                self.id
            )));
        }
        if self.database.tables.iter().any(|t| t.is_empty()) {
            return Err(Error::Decomposition(format!(
                "task '{}' contains an empty table name",
                self.id
            )));
        }
        for feature in &self.features {
            if feature.name.is_empty() {
                return Err(Error::Decomposition(format!(
                    "task '{}' contains an unnamed feature",
                    self.id
                )));
            }
            if !feature.complexity_weight.is_finite() || feature.complexity_weight < 0.0 {
                return Err(Error::Decomposition(format!(
                    "feature '{}' has invalid complexity weight {}",
                    feature.name, feature.complexity_weight
                )));
            }
        }
        Ok(())
    }
}
