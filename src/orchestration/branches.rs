//! Branch pool sizing, naming, and subtask assignment.

use serde::{Deserialize, Serialize};

use crate::core::subtask::SubtaskId;

/// Lower bound on the working-branch pool, applied before the configured
/// maximum.
const WORKING_BRANCH_FLOOR: usize = 4;

/// Role of a branch within a battle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchType {
    Working,
    Staging,
}

impl std::fmt::Display for BranchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchType::Working => write!(f, "work"),
            BranchType::Staging => write!(f, "staging"),
        }
    }
}

/// Mapping from one working branch to its assigned subtasks, in
/// decomposition order. Computed once per battle run and immutable during
/// execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchAssignment {
    pub branch: String,
    pub subtask_ids: Vec<SubtaskId>,
}

/// Working-branch count: `ceil(sqrt(subtask_count))` clamped to
/// `[4, max_working_branches]`, with the configured maximum authoritative
/// when it is below the floor.
pub fn working_branch_count(subtask_count: usize, max_working_branches: usize) -> usize {
    let sqrt = (subtask_count as f64).sqrt().ceil() as usize;
    sqrt.max(WORKING_BRANCH_FLOOR).min(max_working_branches.max(1))
}

/// Render a branch name from the configured template.
///
/// Placeholders: `{taskId}`, `{type}`, `{index}`.
pub fn render_branch_name(
    template: &str,
    task_id: &str,
    branch_type: BranchType,
    index: usize,
) -> String {
    template
        .replace("{taskId}", task_id)
        .replace("{type}", &branch_type.to_string())
        .replace("{index}", &index.to_string())
}

/// Distribute subtasks across working branches round-robin by
/// decomposition order: branch `i` receives subtask `j` where
/// `j mod branch_count == i`. Even and stateless, not cost-aware.
pub fn assign_round_robin(
    subtask_ids: &[SubtaskId],
    branches: &[String],
) -> Vec<BranchAssignment> {
    let mut assignments: Vec<BranchAssignment> = branches
        .iter()
        .map(|branch| BranchAssignment {
            branch: branch.clone(),
            subtask_ids: Vec::new(),
        })
        .collect();

    if assignments.is_empty() {
        return assignments;
    }

    for (index, id) in subtask_ids.iter().enumerate() {
        assignments[index % branches.len()]
            .subtask_ids
            .push(id.clone());
    }

    assignments
}
