//! Version-control command boundary.
//!
//! The orchestrator issues exactly four operation shapes: checkout,
//! create-branch, squash-merge, and commit. Any error from the underlying
//! command is fatal to the current run and surfaced with its operation and
//! branch context; there is no automatic rollback.

use std::path::{Path, PathBuf};

use git2::{build::CheckoutBuilder, BranchType, Repository, Signature};

use crate::{flog_debug, Error, Result};

/// The fixed VCS operation vocabulary.
///
/// `squash_merge` stages the source branch's tree onto the target (the
/// moral equivalent of `git merge --squash`); the following `commit` turns
/// the staged state into a single synthetic commit.
pub trait VcsOps: Send + Sync {
    fn checkout(&self, branch: &str) -> Result<()>;
    fn create_branch(&self, name: &str, from: &str) -> Result<()>;
    fn squash_merge(&self, source: &str, target: &str) -> Result<()>;
    fn commit(&self, message: &str) -> Result<()>;
}

/// git2-backed implementation operating on a local repository.
pub struct GitVcs {
    repo_path: PathBuf,
}

impl GitVcs {
    pub fn new(repo_path: &Path) -> Result<Self> {
        flog_debug!("GitVcs::new path={}", repo_path.display());
        let _ = Repository::discover(repo_path)?;
        Ok(Self {
            repo_path: repo_path.to_path_buf(),
        })
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::discover(&self.repo_path)?)
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Shorthand name of the currently checked-out branch.
    pub fn current_branch(&self) -> Result<String> {
        let repo = self.repo()?;
        let head = repo.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }
}

impl VcsOps for GitVcs {
    fn checkout(&self, branch: &str) -> Result<()> {
        flog_debug!("GitVcs::checkout branch={}", branch);
        let repo = self.repo()?;
        let refname = format!("refs/heads/{}", branch);
        let obj = repo
            .revparse_single(&refname)
            .map_err(|e| Error::vcs("checkout", branch, e))?;
        repo.checkout_tree(&obj, Some(CheckoutBuilder::new().force()))
            .map_err(|e| Error::vcs("checkout", branch, e))?;
        repo.set_head(&refname)
            .map_err(|e| Error::vcs("checkout", branch, e))?;
        Ok(())
    }

    fn create_branch(&self, name: &str, from: &str) -> Result<()> {
        flog_debug!("GitVcs::create_branch name={} from={}", name, from);
        let repo = self.repo()?;
        let commit = repo
            .find_branch(from, BranchType::Local)
            .and_then(|b| b.get().peel_to_commit())
            .map_err(|e| Error::vcs("create-branch", from, e))?;
        // Branch creation never moves HEAD, so the checkout stays on the
        // base branch.
        repo.branch(name, &commit, false)
            .map_err(|e| Error::vcs("create-branch", name, e))?;
        Ok(())
    }

    fn squash_merge(&self, source: &str, target: &str) -> Result<()> {
        flog_debug!("GitVcs::squash_merge source={} target={}", source, target);
        self.checkout(target)?;

        let repo = self.repo()?;
        let source_commit = repo
            .find_branch(source, BranchType::Local)
            .and_then(|b| b.get().peel_to_commit())
            .map_err(|e| Error::vcs("squash-merge", source, e))?;
        let target_commit = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| Error::vcs("squash-merge", target, e))?;

        // Three-way merge without recording the source as a parent; the
        // staged result becomes a single synthetic commit.
        let mut merged = repo
            .merge_commits(&target_commit, &source_commit, None)
            .map_err(|e| Error::vcs("squash-merge", target, e))?;
        if merged.has_conflicts() {
            return Err(Error::Vcs {
                op: "squash-merge",
                branch: target.to_string(),
                message: format!("merge of '{}' produced conflicts", source),
            });
        }

        let tree_id = merged
            .write_tree_to(&repo)
            .map_err(|e| Error::vcs("squash-merge", target, e))?;
        let tree = repo
            .find_tree(tree_id)
            .map_err(|e| Error::vcs("squash-merge", target, e))?;
        let mut index = repo
            .index()
            .map_err(|e| Error::vcs("squash-merge", target, e))?;
        index
            .read_tree(&tree)
            .and_then(|_| index.write())
            .map_err(|e| Error::vcs("squash-merge", target, e))?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<()> {
        flog_debug!("GitVcs::commit message={}", message);
        let repo = self.repo()?;
        let branch = repo
            .head()
            .ok()
            .and_then(|h| h.shorthand().map(|s| s.to_string()))
            .unwrap_or_else(|| "HEAD".to_string());

        let commit_inner = || -> std::result::Result<(), git2::Error> {
            let mut index = repo.index()?;
            let tree_id = index.write_tree()?;
            let tree = repo.find_tree(tree_id)?;
            let sig = repo
                .signature()
                .or_else(|_| Signature::now("Fray", "fray@localhost"))?;
            let parent = repo.head()?.peel_to_commit()?;

            // A squash that changed nothing produces no commit.
            if parent.tree_id() == tree_id {
                return Ok(());
            }

            repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?;
            repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
            Ok(())
        };

        commit_inner().map_err(|e| Error::vcs("commit", &branch, e))
    }
}
