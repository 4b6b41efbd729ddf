pub mod config;
pub mod core;
pub mod decompose;
pub mod error;
pub mod executor;
pub mod log;
pub mod metrics;
pub mod orchestration;
pub mod schedule;
pub mod vcs;

pub use crate::config::Config;
pub use crate::core::{
    build_graph, DependencyGraph, ExecutionResult, ExecutionStatus, MinGranularity, Priority,
    SplitKind, SplitPoint, Subtask, SubtaskId, TaskSpec,
};
pub use crate::decompose::decompose;
pub use crate::error::{Error, Result};
pub use crate::executor::{ParallelExecutor, SimulatedWorker, SubtaskWorker};
pub use crate::orchestration::{
    BattleOrchestrator, BattleRun, BattleStatus, BattleSummary, RunOptions,
};
pub use crate::schedule::{topological_layers, Layer};
pub use crate::vcs::{GitVcs, VcsOps};
