//! Battle orchestration: branch pools and the run pipeline.

pub mod battle;
pub mod branches;

pub use battle::{
    BattleOrchestrator, BattlePhase, BattleRun, BattleStatus, BattleSummary, PhaseTracker,
    RunOptions, DEFAULT_MAX_DEPTH,
};
pub use branches::{
    assign_round_robin, render_branch_name, working_branch_count, BranchAssignment, BranchType,
};
