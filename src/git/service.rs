//! Repository state queries and mutations for one workspace root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::GitError;

use super::runner::{GitInvocation, GitRunner};
use super::status::{ChangeSet, FileStatus, StatusSnapshot, parse_name_list, parse_name_status};

/// Phrases git uses when a commit has nothing to record.
const NOTHING_TO_COMMIT: [&str; 3] = [
    "nothing to commit",
    "nothing added to commit",
    "no changes added to commit",
];

/// Result of a commit attempt that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    NothingToCommit,
}

/// Query/command facade over the repository at `root`.
///
/// Holds no state of its own: every call re-reads the working tree.
#[derive(Clone)]
pub struct RepositoryService {
    root: PathBuf,
    runner: Arc<dyn GitRunner>,
}

impl RepositoryService {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn GitRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The same runner bound to another root.
    pub fn rebind(&self, root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::clone(&self.runner))
    }

    async fn git(&self, invocation: GitInvocation) -> Result<String, GitError> {
        self.runner.run(&self.root, &invocation).await
    }

    /// Fail with `NotARepository` unless `root` is inside a work tree.
    ///
    /// `diff` outside a repository falls back to `--no-index` mode and
    /// reports a usage error instead, so queries check first.
    async fn ensure_repository(&self) -> Result<(), GitError> {
        self.git(GitInvocation::command(["rev-parse", "--git-dir"]))
            .await
            .map(|_| ())
    }

    /// Changes recorded in the index.
    pub async fn get_staged_changes(&self) -> Result<ChangeSet, GitError> {
        self.ensure_repository().await?;
        self.staged_view().await
    }

    /// Unstaged changes to tracked files plus untracked files.
    pub async fn get_all_changes(&self) -> Result<ChangeSet, GitError> {
        self.ensure_repository().await?;
        self.working_view().await
    }

    /// Both views from one status pass.
    pub async fn snapshot(&self) -> Result<StatusSnapshot, GitError> {
        self.ensure_repository().await?;
        let staged = self.staged_view().await?;
        let working = self.working_view().await?;
        Ok(StatusSnapshot { staged, working })
    }

    async fn staged_view(&self) -> Result<ChangeSet, GitError> {
        let diff = self.git(GitInvocation::query(["diff", "--cached"])).await?;
        let names = self
            .git(GitInvocation::query(["diff", "--cached", "--name-only", "-z"]))
            .await?;
        let statuses = self
            .git(GitInvocation::query(["diff", "--cached", "--name-status", "-z"]))
            .await?;

        let changed_files = parse_name_list(&names);
        let staged_files = parse_name_status(&statuses);
        debug!(files = staged_files.len(), "collected staged changes");

        Ok(ChangeSet {
            has_changes: !diff.trim().is_empty(),
            diff,
            changed_files,
            staged_files,
            modified_files: Vec::new(),
        })
    }

    async fn working_view(&self) -> Result<ChangeSet, GitError> {
        let diff = self.git(GitInvocation::query(["diff"])).await?;
        let names = self
            .git(GitInvocation::query(["diff", "--name-only", "-z"]))
            .await?;
        let statuses = self
            .git(GitInvocation::query(["diff", "--name-status", "-z"]))
            .await?;
        let untracked = self
            .git(GitInvocation::query([
                "ls-files",
                "--others",
                "--exclude-standard",
                "-z",
            ]))
            .await?;

        let untracked = parse_name_list(&untracked);
        let mut changed_files = parse_name_list(&names);
        changed_files.extend(untracked.iter().cloned());

        let mut modified_files = parse_name_status(&statuses);
        modified_files.extend(untracked.iter().map(|path| FileStatus::untracked(path)));
        debug!(
            files = modified_files.len(),
            untracked = untracked.len(),
            "collected working tree changes"
        );

        Ok(ChangeSet {
            has_changes: !diff.trim().is_empty() || !untracked.is_empty(),
            diff,
            changed_files,
            staged_files: Vec::new(),
            modified_files,
        })
    }

    /// Merged staged + working-tree status.
    pub async fn get_full_status(&self) -> Result<ChangeSet, GitError> {
        Ok(self.snapshot().await?.merged())
    }

    /// Stage a single repository-relative path.
    pub async fn stage_file(&self, path: &str) -> Result<(), GitError> {
        self.git(GitInvocation::command(["add", "--", path])).await?;
        info!(path, "staged file");
        Ok(())
    }

    /// Stage every change, including untracked files and deletions.
    pub async fn stage_all_changes(&self) -> Result<(), GitError> {
        self.git(GitInvocation::command(["add", "-A"])).await?;
        info!("staged all changes");
        Ok(())
    }

    /// Commit the index with `message`.
    pub async fn commit_changes(&self, message: &str) -> Result<CommitOutcome, GitError> {
        match self.git(GitInvocation::command(["commit", "-m", message])).await {
            Ok(_) => {
                info!("created commit");
                Ok(CommitOutcome::Committed)
            }
            Err(GitError::CommandFailed { ref detail, .. })
                if NOTHING_TO_COMMIT.iter().any(|p| detail.contains(p)) =>
            {
                debug!("git reported nothing to commit");
                Ok(CommitOutcome::NothingToCommit)
            }
            Err(e) => Err(e),
        }
    }

    /// Staged diff text, for display.
    pub async fn staged_diff(&self) -> Result<String, GitError> {
        self.ensure_repository().await?;
        self.git(GitInvocation::query(["diff", "--cached"])).await
    }
}
