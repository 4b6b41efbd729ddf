//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Creating temporary git repositories
//! - Predefined task specs

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use fray::core::spec::DatabaseSpec;
use fray::TaskSpec;

/// A test repository with a temporary directory and initialized git.
pub struct TestRepo {
    /// The temporary directory containing the repo.
    pub temp_dir: TempDir,
    /// Path to the repository root.
    pub path: PathBuf,
}

impl TestRepo {
    /// Create a new test repository with an initial commit on `main`.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().to_path_buf();

        Command::new("git")
            .args(["init"])
            .current_dir(&path)
            .output()
            .expect("Failed to init git");

        Command::new("git")
            .args(["config", "user.email", "test@test.com"])
            .current_dir(&path)
            .output()
            .expect("Failed to set user.email");

        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(&path)
            .output()
            .expect("Failed to set user.name");

        std::fs::write(path.join("README.md"), "# Test Repository\n")
            .expect("Failed to write README");

        Command::new("git")
            .args(["add", "."])
            .current_dir(&path)
            .output()
            .expect("Failed to git add");

        Command::new("git")
            .args(["commit", "-m", "Initial commit"])
            .current_dir(&path)
            .output()
            .expect("Failed to git commit");

        // Normalize the default branch name across git versions
        Command::new("git")
            .args(["branch", "-M", "main"])
            .current_dir(&path)
            .output()
            .expect("Failed to rename default branch");

        Self { temp_dir, path }
    }

    /// Check whether a local branch exists.
    pub fn branch_exists(&self, name: &str) -> bool {
        let output = Command::new("git")
            .args(["rev-parse", "--verify", &format!("refs/heads/{}", name)])
            .current_dir(&self.path)
            .output()
            .expect("Failed to run rev-parse");
        output.status.success()
    }

    /// Create a branch from the current HEAD.
    pub fn create_branch(&self, name: &str) {
        let output = Command::new("git")
            .args(["branch", name])
            .current_dir(&self.path)
            .output()
            .expect("Failed to create branch");
        assert!(
            output.status.success(),
            "git branch {} failed: {}",
            name,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// Name of the currently checked-out branch.
    pub fn current_branch(&self) -> String {
        let output = Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(&self.path)
            .output()
            .expect("Failed to read current branch");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Commit a file onto a branch, leaving the checkout on that branch.
    pub fn commit_file_on(&self, branch: &str, filename: &str, content: &str) {
        self.git(&["checkout", branch]);
        let file_path = self.path.join(filename);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
        self.git(&["add", "."]);
        self.git(&["commit", "-m", &format!("add {}", filename)]);
    }

    /// Number of commits reachable from a branch.
    pub fn commit_count(&self, branch: &str) -> usize {
        let output = Command::new("git")
            .args(["rev-list", "--count", branch])
            .current_dir(&self.path)
            .output()
            .expect("Failed to count commits");
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .unwrap_or(0)
    }

    fn git(&self, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// The end-to-end scenario spec: two files and one database table.
pub fn scenario_spec(repo: &Path) -> TaskSpec {
    let mut spec = TaskSpec::new("t1");
    spec.files = vec!["a.js".to_string(), "b.js".to_string()];
    spec.database = DatabaseSpec {
        tables: vec!["users".to_string()],
    };
    spec.repo = Some(repo.to_path_buf());
    spec
}

/// A spec that decomposes into exactly `n` file subtasks.
pub fn file_fanout_spec(id: &str, n: usize, repo: &Path) -> TaskSpec {
    let mut spec = TaskSpec::new(id);
    spec.files = (0..n).map(|i| format!("src/file_{}.js", i)).collect();
    spec.repo = Some(repo.to_path_buf());
    spec
}
