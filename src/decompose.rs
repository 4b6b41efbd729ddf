//! Fractal task decomposition.
//!
//! Splits one task specification into a flat set of atomic subtasks via
//! repeated breadth-first expansion. This stage performs no I/O and no
//! blocking calls; it must stay fast even for fan-outs in the tens of
//! thousands of subtasks.

use std::collections::VecDeque;

use crate::core::spec::{Feature, MinGranularity, Priority, TaskSpec};
use crate::core::subtask::{SplitKind, SplitPoint, Subtask, SubtaskId};
use crate::error::Result;
use crate::flog_debug;

/// A queued unit of expansion.
///
/// The root carries the spec's split axes; synthesized children carry only
/// the single target their split point named.
struct Pending {
    id: String,
    parent_id: Option<SubtaskId>,
    split_kind: SplitKind,
    target: String,
    complexity_weight: f64,
    files: Vec<String>,
    features: Vec<Feature>,
    endpoints: Vec<String>,
    tables: Vec<String>,
    is_atomic: bool,
    depth: usize,
}

impl Pending {
    fn root(spec: &TaskSpec) -> Self {
        Self {
            id: spec.id.clone(),
            parent_id: None,
            split_kind: SplitKind::Task,
            target: spec.id.clone(),
            complexity_weight: SplitKind::Task.default_weight(),
            files: spec.files.clone(),
            features: spec.features.clone(),
            endpoints: spec.endpoints.clone(),
            tables: spec.database.tables.clone(),
            is_atomic: spec.is_atomic,
            depth: 0,
        }
    }

    fn child(parent: &Pending, point: &SplitPoint, index: usize) -> Self {
        Self {
            id: SubtaskId::derive(&parent.id, parent.depth, index).0,
            parent_id: Some(SubtaskId::new(&parent.id)),
            split_kind: point.kind,
            target: point.target.clone(),
            complexity_weight: point.complexity_weight,
            files: Vec::new(),
            features: Vec::new(),
            endpoints: Vec::new(),
            tables: Vec::new(),
            is_atomic: false,
            depth: parent.depth + 1,
        }
    }

    /// Ordered split-point rule list: files, then features, then endpoints,
    /// then database tables; a single generic `task` point when none apply.
    fn split_points(&self) -> Vec<SplitPoint> {
        let mut points = Vec::new();
        for file in &self.files {
            points.push(SplitPoint::new(SplitKind::File, file));
        }
        for feature in &self.features {
            points.push(SplitPoint::with_weight(
                SplitKind::Feature,
                &feature.name,
                feature.complexity_weight,
            ));
        }
        for endpoint in &self.endpoints {
            points.push(SplitPoint::new(SplitKind::Endpoint, endpoint));
        }
        for table in &self.tables {
            points.push(SplitPoint::new(SplitKind::Database, table));
        }
        if points.is_empty() {
            points.push(SplitPoint::new(SplitKind::Task, &self.id));
        }
        points
    }

    fn into_subtask(self, payload: &serde_json::Value, priority: Priority) -> Subtask {
        Subtask::new(
            SubtaskId::new(&self.id),
            self.parent_id,
            self.split_kind,
            &self.target,
            self.complexity_weight,
            payload.clone(),
            priority,
        )
    }
}

/// Recursively split a task spec into terminal subtasks.
///
/// Expansion stops for a node when any of:
/// - it has reached `max_depth`;
/// - the spec marked it atomic;
/// - `min_granularity` is `File` and the node is itself a file split;
/// - it yields one or zero split points (cannot usefully split further).
///
/// Always terminates and always yields at least one subtask for a valid
/// spec. Every emitted id is unique within the run.
pub fn decompose(
    spec: &TaskSpec,
    max_depth: usize,
    min_granularity: MinGranularity,
) -> Result<Vec<Subtask>> {
    spec.validate()?;

    let mut subtasks = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(Pending::root(spec));

    while let Some(task) = queue.pop_front() {
        let file_cutoff =
            min_granularity == MinGranularity::File && task.split_kind == SplitKind::File;
        if task.depth >= max_depth || task.is_atomic || file_cutoff {
            subtasks.push(task.into_subtask(&spec.payload, spec.priority));
            continue;
        }

        let points = task.split_points();
        if points.len() <= 1 {
            subtasks.push(task.into_subtask(&spec.payload, spec.priority));
            continue;
        }

        for (index, point) in points.iter().enumerate() {
            queue.push_back(Pending::child(&task, point, index));
        }
    }

    flog_debug!(
        "decompose: task={} depth<={} yielded {} subtasks",
        spec.id,
        max_depth,
        subtasks.len()
    );
    Ok(subtasks)
}
