//! Full battle runs against real temporary repositories.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use async_trait::async_trait;
use fray::config::Config;
use fray::error::Error;
use fray::executor::{SimulatedWorker, SubtaskWorker};
use fray::metrics::MemorySink;
use fray::orchestration::{BattleOrchestrator, RunOptions};
use fray::vcs::GitVcs;
use fray::{BattleStatus, Subtask};

use crate::fixtures::{file_fanout_spec, scenario_spec, TestRepo};

fn orchestrator_for(repo: &TestRepo) -> BattleOrchestrator {
    let vcs = Arc::new(GitVcs::new(&repo.path).expect("repo should open"));
    BattleOrchestrator::new(Config::default(), vcs)
        .with_worker(Arc::new(SimulatedWorker::with_scale(0.0)))
}

#[tokio::test]
async fn test_full_battle_completes_against_real_repo() {
    let repo = TestRepo::new();
    let orchestrator = orchestrator_for(&repo);
    let spec = scenario_spec(&repo.path);

    let run = orchestrator
        .execute_battle(&spec, &RunOptions::default())
        .await
        .expect("battle should complete");

    assert_eq!(run.status, BattleStatus::Completed);
    assert_eq!(run.subtask_count, 3);
    assert_eq!(run.succeeded_count(), 3);

    // clamp(ceil(sqrt(3)), 4, 16) = 4 working branches, 2 staging from config
    assert_eq!(run.working_branches.len(), 4);
    assert_eq!(run.staging_branches.len(), 2);
    for branch in run.working_branches.iter().chain(&run.staging_branches) {
        assert!(repo.branch_exists(branch), "missing branch {}", branch);
    }

    // Promotion leaves the checkout on the base branch
    assert_eq!(repo.current_branch(), "main");
    // Nothing was committed to the working branches, so no squash commits
    assert_eq!(repo.commit_count("main"), 1);
}

#[tokio::test]
async fn test_nine_subtasks_use_four_working_branches() {
    let repo = TestRepo::new();
    let orchestrator = orchestrator_for(&repo);
    let spec = file_fanout_spec("t9", 9, &repo.path);

    let run = orchestrator
        .execute_battle(&spec, &RunOptions::default())
        .await
        .expect("battle should complete");

    // Boundary case: ceil(sqrt(9)) = 3 but the floor of 4 applies
    assert_eq!(run.subtask_count, 9);
    assert_eq!(run.working_branches.len(), 4);

    // Round-robin: 9 subtasks over 4 branches is 3/2/2/2
    let sizes: Vec<usize> = run
        .assignments
        .iter()
        .map(|a| a.subtask_ids.len())
        .collect();
    assert_eq!(sizes, vec![3, 2, 2, 2]);
}

#[tokio::test]
async fn test_battle_emits_metrics() {
    let repo = TestRepo::new();
    let sink = Arc::new(MemorySink::new());
    let vcs = Arc::new(GitVcs::new(&repo.path).unwrap());
    let orchestrator = BattleOrchestrator::new(Config::default(), vcs)
        .with_worker(Arc::new(SimulatedWorker::with_scale(0.0)))
        .with_metrics(sink.clone());

    orchestrator
        .execute_battle(&scenario_spec(&repo.path), &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(sink.last_value("decompose.subtaskCount"), Some(3.0));
    assert_eq!(sink.last_value("battle.branchesCreated"), Some(6.0));
    assert_eq!(sink.last_value("battle.subtasksCompleted"), Some(3.0));
    assert!(sink.last_value("battle.duration").is_some());
}

#[tokio::test]
async fn test_battle_fails_on_existing_branch() {
    let repo = TestRepo::new();
    // Occupy the first working-branch name so creation fails
    repo.create_branch("battle/t1/work-0");

    let orchestrator = orchestrator_for(&repo);
    let err = orchestrator
        .execute_battle(&scenario_spec(&repo.path), &RunOptions::default())
        .await
        .expect_err("battle should fail");

    assert!(matches!(err, Error::Vcs { .. }));
    let text = format!("{}", err);
    assert!(text.contains("create-branch"));
    assert!(text.contains("battle/t1/work-0"));

    // Halted before any staging branch was created; no rollback either
    assert!(!repo.branch_exists("battle/t1/staging-0"));
}

/// Worker that commits its subtask's target as a file onto the working
/// branch the subtask was assigned to. Run serially (batch_size = 1) so
/// checkouts do not race.
struct CommittingWorker {
    repo: PathBuf,
    branch_count: usize,
}

impl CommittingWorker {
    fn git(&self, args: &[&str]) -> fray::Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()?;
        if !output.status.success() {
            return Err(Error::SubtaskExecution(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SubtaskWorker for CommittingWorker {
    async fn execute(&self, subtask: &Subtask) -> fray::Result<serde_json::Value> {
        // Round-robin assignment is by sibling index, recoverable from the id
        let index: usize = subtask
            .id
            .as_str()
            .rsplit('-')
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::SubtaskExecution("unparseable subtask id".to_string()))?;
        let branch = format!("battle/t1/work-{}", index % self.branch_count);
        let filename = format!("{}.out", subtask.target.replace('/', "_"));

        self.git(&["checkout", &branch])?;
        std::fs::write(self.repo.join(&filename), format!("{}\n", subtask.id))?;
        self.git(&["add", "."])?;
        self.git(&["commit", "-m", &format!("work on {}", subtask.target)])?;

        Ok(serde_json::json!({"completed": true, "branch": branch}))
    }
}

#[tokio::test]
async fn test_battle_promotes_committed_work_to_base() {
    let repo = TestRepo::new();
    let vcs = Arc::new(GitVcs::new(&repo.path).unwrap());
    let worker = CommittingWorker {
        repo: repo.path.clone(),
        branch_count: 4,
    };
    let orchestrator =
        BattleOrchestrator::new(Config::default(), vcs).with_worker(Arc::new(worker));

    // Serialize subtasks so the worker's checkouts do not interleave
    let options = RunOptions {
        batch_size: Some(1),
        max_workers: Some(1),
        ..Default::default()
    };

    let run = orchestrator
        .execute_battle(&scenario_spec(&repo.path), &options)
        .await
        .expect("battle should complete");

    assert_eq!(run.status, BattleStatus::Completed);
    assert_eq!(run.succeeded_count(), 3);

    // Each subtask's output file was squash-promoted through staging to main
    assert_eq!(repo.current_branch(), "main");
    assert!(repo.path.join("a.js.out").exists());
    assert!(repo.path.join("b.js.out").exists());
    assert!(repo.path.join("users.out").exists());
    // Initial commit plus one squash commit per non-empty staging branch
    assert!(repo.commit_count("main") > 1);
}
