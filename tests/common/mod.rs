//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use git2::{Oid, Repository, Signature};
use tokio::sync::{Notify, mpsc};

use commitpilot::config::Settings;
use commitpilot::error::{SummarizeError, WorkbenchError};
use commitpilot::git::SystemGit;
use commitpilot::llm::{CommitMessageResult, CommitType, Summarizer};
use commitpilot::session::{Orchestrator, OutboundMessage, SessionContext, Workbench};

/// Whether a `git` binary is available; tests that shell out skip without it.
pub fn git_available() -> bool {
    commitpilot::git::check_git_installed().is_ok()
}

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        {
            let mut config = repo.config().expect("Failed to open repo config");
            config.set_str("user.name", "Test User").expect("Failed to set user.name");
            config
                .set_str("user.email", "test@example.com")
                .expect("Failed to set user.email");
            config.set_bool("commit.gpgsign", false).expect("Failed to set commit.gpgsign");
        }
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Get the test signature for commits.
    fn signature(&self) -> Signature<'_> {
        Signature::now("Test User", "test@example.com").expect("Failed to create signature")
    }

    /// Write a file relative to the repository root, creating parent dirs.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write test file");
    }

    /// Stage a path in the index.
    pub fn stage(&self, relative: &str) {
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(relative)).expect("Failed to add file");
        index.write().expect("Failed to write index");
    }

    /// Commit the current index. Returns the commit OID.
    pub fn commit_index(&self, message: &str) -> Oid {
        let sig = self.signature();
        let mut index = self.repo.index().expect("Failed to get index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Write, stage and commit one file.
    pub fn commit_file(&self, relative: &str, content: &str, message: &str) -> Oid {
        self.write(relative, content);
        self.stage(relative);
        self.commit_index(message)
    }

    /// Message of the HEAD commit.
    pub fn head_message(&self) -> Option<String> {
        let head = self.repo.head().ok()?.peel_to_commit().ok()?;
        head.message().map(str::to_string)
    }

    /// Number of commits reachable from HEAD.
    pub fn commit_count(&self) -> usize {
        let Ok(mut walk) = self.repo.revwalk() else {
            return 0;
        };
        if walk.push_head().is_err() {
            return 0;
        }
        walk.count()
    }
}

pub fn sample_message() -> CommitMessageResult {
    CommitMessageResult {
        summary: "feat(notes): add release notes".to_string(),
        description: "Adds notes for the upcoming release.".to_string(),
        commit_type: CommitType::Feat,
    }
}

/// Summarizer double that records its inputs and returns a fixed reply.
pub struct RecordingSummarizer {
    pub reply: Result<CommitMessageResult, String>,
    pub calls: AtomicUsize,
    pub last_files: std::sync::Mutex<Vec<String>>,
    pub last_diff: std::sync::Mutex<String>,
}

impl RecordingSummarizer {
    pub fn ok(message: CommitMessageResult) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(message),
            calls: AtomicUsize::new(0),
            last_files: std::sync::Mutex::new(Vec::new()),
            last_diff: std::sync::Mutex::new(String::new()),
        })
    }

    pub fn malformed() -> Arc<Self> {
        Arc::new(Self {
            reply: Err("not JSON".to_string()),
            calls: AtomicUsize::new(0),
            last_files: std::sync::Mutex::new(Vec::new()),
            last_diff: std::sync::Mutex::new(String::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_files(&self) -> Vec<String> {
        self.last_files.lock().unwrap().clone()
    }

    pub fn last_diff(&self) -> String {
        self.last_diff.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn generate_commit_message(
        &self,
        diff: &str,
        changed_files: &[String],
    ) -> Result<CommitMessageResult, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_files.lock().unwrap() = changed_files.to_vec();
        *self.last_diff.lock().unwrap() = diff.to_string();
        self.reply
            .clone()
            .map_err(SummarizeError::MalformedResponse)
    }

    fn reconfigure(&self, _settings: &Settings) {}
}

/// Summarizer double that parks inside the call until released.
pub struct ParkedSummarizer {
    pub entered: Notify,
    pub release: Notify,
}

impl ParkedSummarizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl Summarizer for ParkedSummarizer {
    async fn generate_commit_message(
        &self,
        _diff: &str,
        _changed_files: &[String],
    ) -> Result<CommitMessageResult, SummarizeError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(sample_message())
    }

    fn reconfigure(&self, _settings: &Settings) {}
}

/// Workbench double that accepts everything.
pub struct NullWorkbench;

#[async_trait]
impl Workbench for NullWorkbench {
    async fn open_file(&self, _path: &Path) -> Result<(), WorkbenchError> {
        Ok(())
    }

    async fn open_document(&self, _content: &str) -> Result<(), WorkbenchError> {
        Ok(())
    }
}

/// Orchestrator over a real repository, system git and the given summarizer.
pub fn orchestrator_for(
    repo: &TestRepo,
    summarizer: Arc<dyn Summarizer>,
) -> (Orchestrator, mpsc::UnboundedReceiver<OutboundMessage>) {
    let runner = Arc::new(SystemGit::new(Duration::from_secs(30)));
    let context = SessionContext::with_services(repo.path(), runner, summarizer);
    Orchestrator::new(context, Settings::default(), Arc::new(NullWorkbench))
}

/// Collect every message queued so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}
