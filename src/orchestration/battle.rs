//! Battle orchestration: the full decompose -> graph -> layer -> execute
//! -> promote pipeline over a pool of version-control branches.
//!
//! One battle run owns the repository's branch namespace for its duration;
//! concurrent runs against the same repository must be serialized by the
//! caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, ExecutionConfig};
use crate::core::graph::build_graph;
use crate::core::spec::{MinGranularity, TaskSpec};
use crate::core::subtask::{ExecutionResult, ExecutionStatus, Subtask, SubtaskId};
use crate::decompose::decompose;
use crate::error::{Error, Result};
use crate::executor::{ParallelExecutor, SimulatedWorker, SubtaskWorker};
use crate::metrics::{MetricSample, MetricsSink, NullSink};
use crate::orchestration::branches::{
    assign_round_robin, render_branch_name, working_branch_count, BranchAssignment, BranchType,
};
use crate::schedule::topological_layers;
use crate::vcs::VcsOps;
use crate::{flog, flog_debug, flog_error};

/// Default expansion depth when the caller supplies no override.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Lifecycle phase of one battle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    Idle,
    BranchesCreated,
    SubtasksAssigned,
    Executing,
    Promoting,
    Completed,
    Failed,
}

impl BattlePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BattlePhase::Completed | BattlePhase::Failed)
    }
}

impl std::fmt::Display for BattlePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BattlePhase::Idle => write!(f, "idle"),
            BattlePhase::BranchesCreated => write!(f, "branches_created"),
            BattlePhase::SubtasksAssigned => write!(f, "subtasks_assigned"),
            BattlePhase::Executing => write!(f, "executing"),
            BattlePhase::Promoting => write!(f, "promoting"),
            BattlePhase::Completed => write!(f, "completed"),
            BattlePhase::Failed => write!(f, "failed"),
        }
    }
}

/// A record of a phase transition with timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseHistoryEntry {
    pub phase: BattlePhase,
    pub entered_at: DateTime<Utc>,
}

/// Enforces the battle phase ordering.
///
/// idle -> branches_created -> subtasks_assigned -> executing ->
/// promoting -> completed, with `failed` reachable from every
/// non-terminal phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTracker {
    phase: BattlePhase,
    history: Vec<PhaseHistoryEntry>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: BattlePhase::Idle,
            history: vec![PhaseHistoryEntry {
                phase: BattlePhase::Idle,
                entered_at: Utc::now(),
            }],
        }
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn history(&self) -> &[PhaseHistoryEntry] {
        &self.history
    }

    pub fn can_transition(&self, target: BattlePhase) -> bool {
        if target == BattlePhase::Failed {
            return !self.phase.is_terminal();
        }
        matches!(
            (self.phase, target),
            (BattlePhase::Idle, BattlePhase::BranchesCreated)
                | (BattlePhase::BranchesCreated, BattlePhase::SubtasksAssigned)
                | (BattlePhase::SubtasksAssigned, BattlePhase::Executing)
                | (BattlePhase::Executing, BattlePhase::Promoting)
                | (BattlePhase::Promoting, BattlePhase::Completed)
        )
    }

    pub fn transition(&mut self, target: BattlePhase) -> Result<()> {
        if !self.can_transition(target) {
            return Err(Error::InvalidPhaseTransition {
                from: self.phase.to_string(),
                to: target.to_string(),
            });
        }
        self.phase = target;
        self.history.push(PhaseHistoryEntry {
            phase: target,
            entered_at: Utc::now(),
        });
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Overall status reported for a battle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    Running,
    Completed,
    Failed,
}

/// Submission-interface overrides merged over the loaded config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub max_depth: Option<usize>,
    pub min_granularity: Option<MinGranularity>,
    pub max_workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub base_branch: Option<String>,
}

/// Aggregate record of one full orchestration. Created at the start of a
/// run, finalized at the end, never reused across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleRun {
    /// Equals the root task spec's id.
    pub battle_id: String,
    pub working_branches: Vec<String>,
    pub staging_branches: Vec<String>,
    pub assignments: Vec<BranchAssignment>,
    pub subtask_count: usize,
    pub results: HashMap<SubtaskId, ExecutionResult>,
    pub duration_ms: u64,
    pub status: BattleStatus,
}

impl BattleRun {
    fn new(battle_id: &str, subtask_count: usize) -> Self {
        Self {
            battle_id: battle_id.to_string(),
            working_branches: Vec::new(),
            staging_branches: Vec::new(),
            assignments: Vec::new(),
            subtask_count,
            results: HashMap::new(),
            duration_ms: 0,
            status: BattleStatus::Running,
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.count_status(ExecutionStatus::Succeeded)
    }

    pub fn failed_count(&self) -> usize {
        self.count_status(ExecutionStatus::Failed)
    }

    pub fn timed_out_count(&self) -> usize {
        self.count_status(ExecutionStatus::TimedOut)
    }

    fn count_status(&self, status: ExecutionStatus) -> usize {
        self.results.values().filter(|r| r.status == status).count()
    }
}

/// Run-summary object returned through the submission interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSummary {
    pub battle_id: String,
    pub subtask_count: usize,
    pub working_branches: Vec<String>,
    pub staging_branches: Vec<String>,
    pub duration_ms: u64,
    pub status: BattleStatus,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BattleSummary {
    pub fn from_run(run: &BattleRun) -> Self {
        Self {
            battle_id: run.battle_id.clone(),
            subtask_count: run.subtask_count,
            working_branches: run.working_branches.clone(),
            staging_branches: run.staging_branches.clone(),
            duration_ms: run.duration_ms,
            status: run.status,
            succeeded: run.succeeded_count(),
            failed: run.failed_count(),
            timed_out: run.timed_out_count(),
            error: None,
        }
    }

    /// Summary for a run that aborted on a graph or VCS fault.
    pub fn failed(battle_id: &str, error: &Error) -> Self {
        Self {
            battle_id: battle_id.to_string(),
            subtask_count: 0,
            working_branches: Vec::new(),
            staging_branches: Vec::new(),
            duration_ms: 0,
            status: BattleStatus::Failed,
            succeeded: 0,
            failed: 0,
            timed_out: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Drives the whole pipeline for one task spec.
///
/// The VCS, the subtask-execution capability, and the metrics sink are all
/// injected; configuration is an explicit value, never process state.
pub struct BattleOrchestrator {
    config: Config,
    vcs: Arc<dyn VcsOps>,
    worker: Arc<dyn SubtaskWorker>,
    metrics: Arc<dyn MetricsSink>,
}

impl BattleOrchestrator {
    /// Orchestrator with the simulated worker and no metrics sink.
    pub fn new(config: Config, vcs: Arc<dyn VcsOps>) -> Self {
        Self {
            config,
            vcs,
            worker: Arc::new(SimulatedWorker::new()),
            metrics: Arc::new(NullSink),
        }
    }

    pub fn with_worker(mut self, worker: Arc<dyn SubtaskWorker>) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Decompose a spec and compute its layer plan without touching the
    /// repository. Used by the dry-run surface and as phase one of
    /// `execute_battle`.
    pub fn plan(
        &self,
        spec: &TaskSpec,
        options: &RunOptions,
    ) -> Result<(Vec<Subtask>, Vec<Vec<SubtaskId>>)> {
        let max_depth = options.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let min_granularity = options.min_granularity.unwrap_or_default();

        let decompose_start = Instant::now();
        let mut subtasks = decompose(spec, max_depth, min_granularity)?;
        self.metrics.record(MetricSample::new(
            "decompose.duration",
            decompose_start.elapsed().as_millis() as f64,
        ));
        self.metrics.record(MetricSample::new(
            "decompose.subtaskCount",
            subtasks.len() as f64,
        ));

        let graph = build_graph(&mut subtasks);
        let layers = topological_layers(&graph);
        flog_debug!(
            "plan: battle={} subtasks={} edges={} layers={}",
            spec.id,
            subtasks.len(),
            graph.edge_count(),
            layers.len()
        );
        Ok((subtasks, layers))
    }

    /// Execute a full battle run.
    ///
    /// Decomposition faults abort before any VCS side effect. A VCS fault
    /// halts the remaining steps immediately and surfaces the command
    /// error; branches already created are left in place.
    pub async fn execute_battle(&self, spec: &TaskSpec, options: &RunOptions) -> Result<BattleRun> {
        let start = Instant::now();
        let (subtasks, layers) = self.plan(spec, options)?;

        let mut run = BattleRun::new(&spec.id, subtasks.len());
        let mut tracker = PhaseTracker::new();
        flog!("battle {} started: {} subtasks", spec.id, subtasks.len());

        let outcome = self
            .drive(spec, options, &subtasks, &layers, &mut run, &mut tracker)
            .await;
        run.duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                run.status = BattleStatus::Completed;
                tracker.transition(BattlePhase::Completed)?;
                self.metrics
                    .record(MetricSample::new("battle.duration", run.duration_ms as f64));
                self.metrics.record(MetricSample::new(
                    "battle.branchesCreated",
                    (run.working_branches.len() + run.staging_branches.len()) as f64,
                ));
                self.metrics.record(MetricSample::new(
                    "battle.subtasksCompleted",
                    run.succeeded_count() as f64,
                ));
                flog!(
                    "battle {} completed in {}ms: {}/{} subtasks succeeded",
                    run.battle_id,
                    run.duration_ms,
                    run.succeeded_count(),
                    run.subtask_count
                );
                Ok(run)
            }
            Err(err) => {
                run.status = BattleStatus::Failed;
                let _ = tracker.transition(BattlePhase::Failed);
                flog_error!("battle {} failed: {}", run.battle_id, err);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        spec: &TaskSpec,
        options: &RunOptions,
        subtasks: &[Subtask],
        layers: &[Vec<SubtaskId>],
        run: &mut BattleRun,
        tracker: &mut PhaseTracker,
    ) -> Result<()> {
        let base_branch = options
            .base_branch
            .clone()
            .unwrap_or_else(|| self.config.git.default_base_branch.clone());
        let template = &self.config.branching.naming_template;

        // Branch pools: working count derives from the fan-out, staging
        // count comes straight from config.
        let working_count =
            working_branch_count(subtasks.len(), self.config.branching.max_working_branches);
        let staging_count = self.config.branching.max_staging_branches.max(1);

        for index in 0..working_count {
            let name = render_branch_name(template, &spec.id, BranchType::Working, index);
            self.vcs.create_branch(&name, &base_branch)?;
            run.working_branches.push(name);
        }
        for index in 0..staging_count {
            let name = render_branch_name(template, &spec.id, BranchType::Staging, index);
            self.vcs.create_branch(&name, &base_branch)?;
            run.staging_branches.push(name);
        }
        tracker.transition(BattlePhase::BranchesCreated)?;

        let subtask_ids: Vec<SubtaskId> = subtasks.iter().map(|t| t.id.clone()).collect();
        run.assignments = assign_round_robin(&subtask_ids, &run.working_branches);
        tracker.transition(BattlePhase::SubtasksAssigned)?;

        // One shared pipeline over the whole layer sequence; branch
        // assignments shape promotion only.
        tracker.transition(BattlePhase::Executing)?;
        let exec_config = ExecutionConfig {
            max_workers: options
                .max_workers
                .unwrap_or(self.config.execution.max_workers),
            batch_size: options
                .batch_size
                .unwrap_or(self.config.execution.batch_size),
            subtask_timeout_ms: options
                .timeout_ms
                .unwrap_or(self.config.execution.subtask_timeout_ms),
        };
        let executor = ParallelExecutor::new(Arc::clone(&self.worker), &exec_config);
        let by_id: HashMap<SubtaskId, Subtask> = subtasks
            .iter()
            .map(|t| (t.id.clone(), t.clone()))
            .collect();
        run.results = executor.run_layers(layers, &by_id).await;

        // Promotion: working -> staging round-robin, then staging -> base
        // in turn, each as its own synthetic commit.
        tracker.transition(BattlePhase::Promoting)?;
        for (index, working) in run.working_branches.iter().enumerate() {
            let staging = &run.staging_branches[index % run.staging_branches.len()];
            self.vcs.squash_merge(working, staging)?;
            self.vcs.commit(&format!(
                "Squash {} into {} [{}]",
                working, staging, run.battle_id
            ))?;
        }
        for staging in &run.staging_branches {
            self.vcs.squash_merge(staging, &base_branch)?;
            self.vcs.commit(&format!(
                "Promote {} into {} [{}]",
                staging, base_branch, run.battle_id
            ))?;
        }

        Ok(())
    }
}
