//! Commit workflow: collect changes, summarize, present, commit.
//!
//! The [`Orchestrator`] owns the transient session state (generation phase,
//! draft message, last status) and exposes it two ways: a typed async API
//! used by the terminal subcommands, and [`Orchestrator::handle`], which
//! dispatches host messages and reports results through the [`Outbox`].

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::{RwLock as TreeLock, mpsc};
use tracing::{debug, info, warn};

use crate::config::{Settings, SettingsUpdate};
use crate::error::SessionError;
use crate::git::{ChangeSet, CommitOutcome};
use crate::llm::CommitMessageResult;

use super::context::SessionContext;
use super::protocol::{CommitMessageView, GitStatusView, InboundMessage, OutboundMessage};
use super::workbench::Workbench;

/// Sending half of the outbound message stream.
pub type Outbox = mpsc::UnboundedSender<OutboundMessage>;

pub const STATUS_ANALYZING: &str = "Analyzing changes...";
pub const STATUS_NO_CHANGES: &str = "No changes found to commit.";
pub const STATUS_GENERATING: &str = "Generating AI commit message...";
pub const STATUS_COMMITTED: &str = "Changes committed successfully.";
pub const STATUS_NOTHING_TO_COMMIT: &str = "Nothing to commit. Stage some changes first.";

/// Where the generation workflow currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    CollectingChanges,
    Summarizing,
    Presenting(CommitMessageResult),
    Error(String),
}

impl Phase {
    /// A generation is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::CollectingChanges | Phase::Summarizing)
    }
}

/// Result of a generation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// Neither the index nor the working tree has changes.
    NoChanges,
    Generated(CommitMessageResult),
}

#[derive(Debug, Default)]
struct SessionState {
    phase: Phase,
    draft: Option<String>,
    last_status: Option<ChangeSet>,
}

/// Resets a busy phase to `Idle` if generation exits without settling it.
struct GenerationGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.phase.is_busy() {
            debug!("generation abandoned; resetting phase");
            state.phase = Phase::Idle;
        }
    }
}

pub struct Orchestrator {
    context: RwLock<SessionContext>,
    settings: Mutex<Settings>,
    state: Mutex<SessionState>,
    /// Read guards for status queries, the write guard for stage/commit.
    tree_lock: TreeLock<()>,
    workbench: Arc<dyn Workbench>,
    outbox: Outbox,
}

impl Orchestrator {
    pub fn new(
        context: SessionContext,
        settings: Settings,
        workbench: Arc<dyn Workbench>,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (outbox, receiver) = mpsc::unbounded_channel();
        let orchestrator = Self {
            context: RwLock::new(context),
            settings: Mutex::new(settings),
            state: Mutex::new(SessionState::default()),
            tree_lock: TreeLock::new(()),
            workbench,
            outbox,
        };
        (orchestrator, receiver)
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self) -> SessionContext {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queue a message for the host.
    pub fn notify(&self, message: OutboundMessage) {
        if self.outbox.send(message).is_err() {
            debug!("outbound receiver closed; dropping message");
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.state().phase = phase;
    }

    pub fn phase(&self) -> Phase {
        self.state().phase.clone()
    }

    /// Message staged for the next commit, if any.
    pub fn draft(&self) -> Option<String> {
        self.state().draft.clone()
    }

    pub fn last_status(&self) -> Option<ChangeSet> {
        self.state().last_status.clone()
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.context().workspace_root
    }

    fn begin_generation(&self) -> Result<GenerationGuard<'_>, SessionError> {
        let mut state = self.state();
        if state.phase.is_busy() {
            return Err(SessionError::GenerationInProgress);
        }
        state.phase = Phase::CollectingChanges;
        Ok(GenerationGuard { state: &self.state })
    }

    /// Generate a commit message for the pending changes.
    ///
    /// Staged changes win; without any, the working tree (including
    /// untracked files) is summarized. Every call queries the repository
    /// again, so this is also the regenerate path.
    pub async fn generate(&self) -> Result<GenerateOutcome, SessionError> {
        let _guard = self.begin_generation()?;
        self.notify(OutboundMessage::status(STATUS_ANALYZING, true));

        let result = self.run_generation().await;

        let mut state = self.state();
        match &result {
            Ok(GenerateOutcome::Generated(message)) => {
                state.draft = Some(message.full_message());
                state.phase = Phase::Presenting(message.clone());
            }
            Ok(GenerateOutcome::NoChanges) => state.phase = Phase::Idle,
            Err(e) => state.phase = Phase::Error(e.to_string()),
        }
        result
    }

    async fn run_generation(&self) -> Result<GenerateOutcome, SessionError> {
        let context = self.context();
        let snapshot = {
            let _read = self.tree_lock.read().await;
            context.repository.snapshot().await?
        };
        let full = snapshot.merged();
        let has_changes = full.has_changes;
        self.state().last_status = Some(full);

        if !has_changes {
            info!("no changes to summarize");
            return Ok(GenerateOutcome::NoChanges);
        }

        let (diff, files) = if snapshot.staged.staged_files.is_empty() {
            (snapshot.working.diff.as_str(), snapshot.working.modified_paths())
        } else {
            (snapshot.staged.diff.as_str(), snapshot.staged.staged_paths())
        };

        self.set_phase(Phase::Summarizing);
        self.notify(OutboundMessage::status(STATUS_GENERATING, true));
        debug!(files = files.len(), "summarizing changes");

        let message = context.summarizer.generate_commit_message(diff, &files).await?;
        Ok(GenerateOutcome::Generated(message))
    }

    /// Commit the index with `message`.
    ///
    /// The trimmed message becomes the draft before git runs and is kept
    /// unless the commit succeeds.
    pub async fn commit(&self, message: &str) -> Result<CommitOutcome, SessionError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.state().draft = Some(message.to_string());

        let context = self.context();
        let outcome = {
            let _write = self.tree_lock.write().await;
            context.repository.commit_changes(message).await?
        };

        if outcome == CommitOutcome::Committed {
            let mut state = self.state();
            state.draft = None;
            if !state.phase.is_busy() {
                state.phase = Phase::Idle;
            }
        }
        Ok(outcome)
    }

    /// Stage one path and return the refreshed status.
    pub async fn stage_file(&self, path: &str) -> Result<ChangeSet, SessionError> {
        self.stage_path(path).await?;
        self.refresh_status().await
    }

    /// Stage everything and return the refreshed status.
    pub async fn stage_all(&self) -> Result<ChangeSet, SessionError> {
        self.stage_everything().await?;
        self.refresh_status().await
    }

    async fn stage_path(&self, path: &str) -> Result<(), SessionError> {
        let context = self.context();
        let _write = self.tree_lock.write().await;
        Ok(context.repository.stage_file(path).await?)
    }

    async fn stage_everything(&self) -> Result<(), SessionError> {
        let context = self.context();
        let _write = self.tree_lock.write().await;
        Ok(context.repository.stage_all_changes().await?)
    }

    /// Query the full status and cache it.
    pub async fn refresh_status(&self) -> Result<ChangeSet, SessionError> {
        let context = self.context();
        let status = {
            let _read = self.tree_lock.read().await;
            context.repository.get_full_status().await?
        };
        self.state().last_status = Some(status.clone());
        Ok(status)
    }

    /// Staged diff text of the current workspace.
    pub async fn staged_diff(&self) -> Result<String, SessionError> {
        let context = self.context();
        let _read = self.tree_lock.read().await;
        Ok(context.repository.staged_diff().await?)
    }

    /// Acknowledge a failed generation.
    pub fn dismiss_error(&self) {
        let mut state = self.state();
        if matches!(state.phase, Phase::Error(_)) {
            state.phase = Phase::Idle;
        }
    }

    /// Apply a settings update and re-derive provider selection.
    ///
    /// Returns true if the credential changed.
    pub fn configure(&self, update: SettingsUpdate) -> bool {
        let (settings, credential_changed) = {
            let mut current = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = current.apply(update);
            (current.clone(), changed)
        };
        self.context().summarizer.reconfigure(&settings);
        info!(credential_changed, "settings updated");
        credential_changed
    }

    /// Bind the session to another workspace root, dropping per-root state.
    ///
    /// The new root gets a summarizer built from the current settings.
    pub fn replace_context(&self, root: impl Into<PathBuf>) -> Result<(), SessionError> {
        let root = root.into();
        let next = self.context().rebind(root.clone(), &self.settings())?;
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = next;

        let mut state = self.state();
        state.draft = None;
        state.last_status = None;
        if !state.phase.is_busy() {
            state.phase = Phase::Idle;
        }
        info!(root = %root.display(), "workspace changed");
        Ok(())
    }

    /// Dispatch one host message. Results and failures go to the outbox.
    pub async fn handle(&self, message: InboundMessage) {
        debug!(kind = message.kind(), "handling message");
        match message {
            InboundMessage::GenerateCommitMessage => self.on_generate().await,
            InboundMessage::RegenerateCommitMessage => self.on_regenerate().await,
            InboundMessage::GetGitStatus => self.on_get_git_status().await,
            InboundMessage::Refresh => self.on_refresh().await,
            InboundMessage::StageFile { file_path } => self.on_stage_file(&file_path).await,
            InboundMessage::StageAllChanges => self.on_stage_all().await,
            InboundMessage::CommitChanges { message } => self.on_commit(&message).await,
            InboundMessage::OpenFile { file_path } => self.on_open_file(&file_path).await,
            InboundMessage::OpenInEditor { content } => self.on_open_in_editor(&content).await,
            InboundMessage::Configure(update) => self.on_configure(update),
            InboundMessage::WorkspaceChanged { root } => self.on_workspace_changed(root).await,
            InboundMessage::DismissError => self.dismiss_error(),
        }
    }

    async fn on_generate(&self) {
        match self.generate().await {
            Ok(GenerateOutcome::NoChanges) => {
                self.notify(OutboundMessage::status(STATUS_NO_CHANGES, false));
            }
            Ok(GenerateOutcome::Generated(message)) => {
                self.notify(OutboundMessage::CommitMessage {
                    data: CommitMessageView::from(&message),
                });
            }
            Err(e) if e.is_not_configured() => {
                self.notify(OutboundMessage::ShowApiKeySetup {
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!(error = %e, "generation failed");
                self.notify(OutboundMessage::error(format!(
                    "Failed to generate commit message: {e}"
                )));
            }
        }
    }

    async fn on_regenerate(&self) {
        debug!(had_draft = self.draft().is_some(), "regenerating");
        self.on_generate().await;
    }

    async fn on_get_git_status(&self) {
        match self.refresh_status().await {
            Ok(status) => self.publish_status(&status),
            Err(e) => self.notify(OutboundMessage::error(format!(
                "Failed to get git status: {e}"
            ))),
        }
    }

    async fn on_refresh(&self) {
        self.on_get_git_status().await;
    }

    // A failed refresh after a successful stage is a status failure.
    async fn on_stage_file(&self, path: &str) {
        match self.stage_path(path).await {
            Ok(()) => self.on_get_git_status().await,
            Err(e) => self.notify(OutboundMessage::error(format!(
                "Failed to stage {path}: {e}"
            ))),
        }
    }

    async fn on_stage_all(&self) {
        match self.stage_everything().await {
            Ok(()) => self.on_get_git_status().await,
            Err(e) => self.notify(OutboundMessage::error(format!(
                "Failed to stage changes: {e}"
            ))),
        }
    }

    async fn on_commit(&self, message: &str) {
        match self.commit(message).await {
            Ok(CommitOutcome::Committed) => {
                self.notify(OutboundMessage::CommitSuccess);
                self.notify(OutboundMessage::status(STATUS_COMMITTED, false));
                self.on_get_git_status().await;
            }
            Ok(CommitOutcome::NothingToCommit) => {
                self.notify(OutboundMessage::status(STATUS_NOTHING_TO_COMMIT, false));
            }
            Err(e @ SessionError::EmptyMessage) => {
                self.notify(OutboundMessage::error(e.to_string()));
            }
            Err(e) => self.notify(OutboundMessage::error(format!(
                "Failed to commit changes: {e}"
            ))),
        }
    }

    async fn on_open_file(&self, file_path: &str) {
        let result = match workspace_path(&self.workspace_root(), file_path) {
            Ok(path) => self.workbench.open_file(&path).await.map_err(SessionError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.notify(OutboundMessage::error(format!("Failed to open file: {e}")));
        }
    }

    async fn on_open_in_editor(&self, content: &str) {
        if let Err(e) = self.workbench.open_document(content).await {
            self.notify(OutboundMessage::error(format!(
                "Failed to open in editor: {e}"
            )));
        }
    }

    fn on_configure(&self, update: SettingsUpdate) {
        let credential_changed = self.configure(update);
        if !credential_changed {
            self.notify(OutboundMessage::status("Settings updated.", false));
        } else if self.settings().has_credential() {
            self.notify(OutboundMessage::status("API key updated.", false));
        } else {
            self.notify(OutboundMessage::ShowApiKeySetup {
                message: crate::error::SummarizeError::NotConfigured.to_string(),
            });
        }
    }

    async fn on_workspace_changed(&self, root: PathBuf) {
        if let Err(e) = self.replace_context(root) {
            self.notify(OutboundMessage::error(format!(
                "Failed to switch workspace: {e}"
            )));
            return;
        }
        self.on_get_git_status().await;
    }

    fn publish_status(&self, status: &ChangeSet) {
        self.notify(OutboundMessage::GitStatus {
            data: GitStatusView::from(status),
        });
    }
}

/// Resolve a host-supplied path against the workspace root.
///
/// Only plain relative paths are accepted; absolute paths and `..`
/// components are rejected.
pub fn workspace_path(root: &Path, relative: &str) -> Result<PathBuf, SessionError> {
    let candidate = Path::new(relative);
    let plain = !relative.trim().is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !plain {
        return Err(SessionError::InvalidPath(relative.to_string()));
    }
    Ok(root.join(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::{GitError, SummarizeError};
    use crate::git::runner::MockGitRunner;
    use crate::git::GitInvocation;
    use crate::llm::client::MockSummarizer;
    use crate::llm::{CommitType, Summarizer};
    use crate::session::context::SummarizerFactory;
    use crate::session::workbench::MockWorkbench;

    fn message() -> CommitMessageResult {
        CommitMessageResult {
            summary: "feat(git): add status view".to_string(),
            description: "Shows staged and modified files.".to_string(),
            commit_type: CommitType::Feat,
        }
    }

    /// Runner answering status queries from a table and recording mutations.
    fn runner_with(staged: &'static str, working: &'static str, untracked: &'static str) -> MockGitRunner {
        let mut runner = MockGitRunner::new();
        runner.expect_run().returning(move |_, inv: &GitInvocation| {
            let out = match inv.args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                ["diff", "--cached"] if !staged.is_empty() => "diff --git a/s b/s\n+s\n",
                ["diff", "--cached", "--name-only", "-z"] => staged,
                ["diff", "--cached", "--name-status", "-z"] if !staged.is_empty() => "M\ts.txt\n",
                ["diff"] if !working.is_empty() => "diff --git a/w b/w\n+w\n",
                ["diff", "--name-only", "-z"] => working,
                ["diff", "--name-status", "-z"] if !working.is_empty() => "M\tw.txt\n",
                ["ls-files", ..] => untracked,
                _ => "",
            };
            Ok(out.to_string())
        });
        runner
    }

    fn orchestrator(
        runner: MockGitRunner,
        summarizer: MockSummarizer,
        workbench: MockWorkbench,
    ) -> (Orchestrator, mpsc::UnboundedReceiver<OutboundMessage>) {
        let context = SessionContext::with_services("/repo", Arc::new(runner), Arc::new(summarizer));
        Orchestrator::new(context, Settings::default(), Arc::new(workbench))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_generate_prefers_staged_changes() {
        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_generate_commit_message()
            .withf(|diff, files| diff.contains("a/s") && files == ["s.txt".to_string()])
            .times(1)
            .returning(|_, _| Ok(message()));

        let (orch, _rx) = orchestrator(
            runner_with("s.txt\n", "w.txt\n", ""),
            summarizer,
            MockWorkbench::new(),
        );

        let outcome = orch.generate().await.unwrap();
        assert_eq!(outcome, GenerateOutcome::Generated(message()));
        assert_eq!(orch.phase(), Phase::Presenting(message()));
        assert_eq!(
            orch.draft().as_deref(),
            Some("feat(git): add status view\n\nShows staged and modified files.")
        );
    }

    #[tokio::test]
    async fn test_generate_falls_back_to_working_tree_with_untracked() {
        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_generate_commit_message()
            .withf(|diff, files| {
                diff.contains("a/w") && files == ["w.txt".to_string(), "new.txt".to_string()]
            })
            .times(1)
            .returning(|_, _| Ok(message()));

        let (orch, _rx) = orchestrator(
            runner_with("", "w.txt\n", "new.txt\n"),
            summarizer,
            MockWorkbench::new(),
        );
        assert!(matches!(orch.generate().await.unwrap(), GenerateOutcome::Generated(_)));
    }

    #[tokio::test]
    async fn test_generate_without_changes_skips_summarizer() {
        let mut summarizer = MockSummarizer::new();
        summarizer.expect_generate_commit_message().never();

        let (orch, mut rx) = orchestrator(runner_with("", "", ""), summarizer, MockWorkbench::new());
        orch.handle(InboundMessage::GenerateCommitMessage).await;

        assert_eq!(orch.phase(), Phase::Idle);
        assert_eq!(
            drain(&mut rx),
            vec![
                OutboundMessage::status(STATUS_ANALYZING, true),
                OutboundMessage::status(STATUS_NO_CHANGES, false),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_response_leaves_retryable_error() {
        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_generate_commit_message()
            .times(2)
            .returning(|_, _| Err(SummarizeError::MalformedResponse("no JSON".into())));

        let (orch, mut rx) = orchestrator(
            runner_with("s.txt\n", "", ""),
            summarizer,
            MockWorkbench::new(),
        );
        orch.handle(InboundMessage::GenerateCommitMessage).await;

        assert!(matches!(orch.phase(), Phase::Error(_)));
        assert!(!orch.phase().is_busy());
        let messages = drain(&mut rx);
        assert!(matches!(
            messages.last(),
            Some(OutboundMessage::Error { message }) if message.starts_with("Failed to generate commit message:")
        ));

        // Not stuck: the next attempt reaches the summarizer again.
        assert!(orch.generate().await.is_err());
    }

    #[tokio::test]
    async fn test_not_configured_shows_setup() {
        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_generate_commit_message()
            .returning(|_, _| Err(SummarizeError::NotConfigured));

        let (orch, mut rx) = orchestrator(
            runner_with("s.txt\n", "", ""),
            summarizer,
            MockWorkbench::new(),
        );
        orch.handle(InboundMessage::GenerateCommitMessage).await;

        assert!(matches!(
            drain(&mut rx).last(),
            Some(OutboundMessage::ShowApiKeySetup { .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_rejected_while_busy() {
        let (orch, _rx) = orchestrator(MockGitRunner::new(), MockSummarizer::new(), MockWorkbench::new());
        orch.set_phase(Phase::Summarizing);

        let result = orch.generate().await;
        assert!(matches!(result, Err(SessionError::GenerationInProgress)));
        assert_eq!(orch.phase(), Phase::Summarizing);
    }

    #[tokio::test]
    async fn test_abandoned_generation_resets_phase() {
        let (orch, _rx) = orchestrator(MockGitRunner::new(), MockSummarizer::new(), MockWorkbench::new());
        {
            let _guard = orch.begin_generation().unwrap();
            assert!(orch.phase().is_busy());
        }
        assert_eq!(orch.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_empty_commit_never_reaches_git() {
        let mut runner = MockGitRunner::new();
        runner.expect_run().never();

        let (orch, mut rx) = orchestrator(runner, MockSummarizer::new(), MockWorkbench::new());
        assert!(matches!(orch.commit("  \n\t").await, Err(SessionError::EmptyMessage)));

        orch.handle(InboundMessage::CommitChanges {
            message: String::new(),
        })
        .await;
        assert_eq!(
            drain(&mut rx),
            vec![OutboundMessage::error("Commit message cannot be empty")]
        );
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_draft() {
        let mut runner = MockGitRunner::new();
        runner.expect_run().returning(|_, _| {
            Err(GitError::CommandFailed {
                command: "commit".into(),
                code: Some(1),
                detail: "hook failed".into(),
            })
        });

        let (orch, _rx) = orchestrator(runner, MockSummarizer::new(), MockWorkbench::new());
        assert!(orch.commit("  fix: keep me  ").await.is_err());
        assert_eq!(orch.draft().as_deref(), Some("fix: keep me"));
    }

    #[tokio::test]
    async fn test_commit_success_clears_draft_and_reports() {
        let commits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&commits);
        let mut runner = MockGitRunner::new();
        runner.expect_run().returning(move |_, inv| {
            if inv.starts_with(&["commit", "-m", "fix: x"]) {
                counter.fetch_add(1, Ordering::SeqCst);
                return Ok("[main 1a2b3c] fix: x\n".into());
            }
            Ok(String::new())
        });

        let (orch, mut rx) = orchestrator(runner, MockSummarizer::new(), MockWorkbench::new());
        orch.handle(InboundMessage::CommitChanges {
            message: "fix: x".to_string(),
        })
        .await;

        assert_eq!(commits.load(Ordering::SeqCst), 1);
        assert_eq!(orch.draft(), None);
        let messages = drain(&mut rx);
        assert_eq!(messages[0], OutboundMessage::CommitSuccess);
        assert!(matches!(messages.last(), Some(OutboundMessage::GitStatus { .. })));
    }

    #[tokio::test]
    async fn test_stage_file_refreshes_status() {
        let adds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&adds);
        let mut runner = MockGitRunner::new();
        runner.expect_run().returning(move |_, inv| {
            Ok(match inv.args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                ["add", "--", "w.txt"] => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ""
                }
                ["diff", "--cached"] => "diff --git a/w.txt b/w.txt\n+w\n",
                ["diff", "--cached", "--name-only", "-z"] => "w.txt\n",
                ["diff", "--cached", "--name-status", "-z"] => "M\tw.txt\n",
                _ => "",
            }
            .to_string())
        });

        let (orch, mut rx) = orchestrator(runner, MockSummarizer::new(), MockWorkbench::new());
        orch.handle(InboundMessage::StageFile {
            file_path: "w.txt".to_string(),
        })
        .await;

        assert_eq!(adds.load(Ordering::SeqCst), 1);
        assert_eq!(orch.last_status().unwrap().staged_files.len(), 1);
        match drain(&mut rx).as_slice() {
            [OutboundMessage::GitStatus { data }] => {
                assert_eq!(data.staged, vec!["w.txt"]);
                assert_eq!(data.staged_count, 1);
            }
            other => panic!("Expected one gitStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_failure_reports_error() {
        let mut runner = MockGitRunner::new();
        runner
            .expect_run()
            .returning(|_, _| Err(GitError::NotARepository("fatal: not a git repository".into())));

        let (orch, mut rx) = orchestrator(runner, MockSummarizer::new(), MockWorkbench::new());
        orch.handle(InboundMessage::GetGitStatus).await;

        assert!(matches!(
            drain(&mut rx).as_slice(),
            [OutboundMessage::Error { message }] if message.starts_with("Failed to get git status:")
        ));
    }

    #[tokio::test]
    async fn test_open_file_resolves_against_root() {
        let mut workbench = MockWorkbench::new();
        workbench
            .expect_open_file()
            .withf(|path| path == Path::new("/repo/src/lib.rs"))
            .times(1)
            .returning(|_| Ok(()));

        let (orch, mut rx) = orchestrator(MockGitRunner::new(), MockSummarizer::new(), workbench);
        orch.handle(InboundMessage::OpenFile {
            file_path: "src/lib.rs".to_string(),
        })
        .await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_open_file_rejects_escaping_paths() {
        let mut workbench = MockWorkbench::new();
        workbench.expect_open_file().never();

        let (orch, mut rx) = orchestrator(MockGitRunner::new(), MockSummarizer::new(), workbench);
        for bad in ["../secrets.txt", "/etc/passwd", "src/../../x", ""] {
            orch.handle(InboundMessage::OpenFile {
                file_path: bad.to_string(),
            })
            .await;
        }
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 4);
        assert!(messages.iter().all(|m| matches!(m, OutboundMessage::Error { .. })));
    }

    #[tokio::test]
    async fn test_configure_reconfigures_summarizer() {
        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_reconfigure()
            .withf(|settings| settings.api_key.as_deref() == Some("sk-or-v1-new"))
            .times(1)
            .return_const(());

        let (orch, mut rx) = orchestrator(MockGitRunner::new(), summarizer, MockWorkbench::new());
        orch.handle(InboundMessage::Configure(SettingsUpdate {
            api_key: Some("sk-or-v1-new".to_string()),
            ..Default::default()
        }))
        .await;

        assert_eq!(
            drain(&mut rx),
            vec![OutboundMessage::status("API key updated.", false)]
        );
    }

    #[tokio::test]
    async fn test_workspace_change_drops_session_state() {
        let mut runner = MockGitRunner::new();
        runner
            .expect_run()
            .withf(|root, _| root == Path::new("/other"))
            .returning(|_, _| Ok(String::new()));

        let (orch, _rx) = orchestrator(runner, MockSummarizer::new(), MockWorkbench::new());
        orch.state().draft = Some("stale".to_string());

        orch.handle(InboundMessage::WorkspaceChanged {
            root: PathBuf::from("/other"),
        })
        .await;

        assert_eq!(orch.workspace_root(), PathBuf::from("/other"));
        assert_eq!(orch.draft(), None);
        assert!(!orch.last_status().unwrap().has_changes);
    }

    #[tokio::test]
    async fn test_refresh_failure_after_stage_is_a_status_error() {
        let mut runner = MockGitRunner::new();
        runner.expect_run().returning(|_, inv| {
            if inv.starts_with(&["add"]) {
                return Ok(String::new());
            }
            Err(GitError::CommandFailed {
                command: inv.name().to_string(),
                code: Some(128),
                detail: "fatal: index file corrupt".into(),
            })
        });

        let (orch, mut rx) = orchestrator(runner, MockSummarizer::new(), MockWorkbench::new());
        orch.handle(InboundMessage::StageFile {
            file_path: "w.txt".to_string(),
        })
        .await;
        orch.handle(InboundMessage::StageAllChanges).await;

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);
        for message in messages {
            match message {
                OutboundMessage::Error { message } => {
                    assert!(message.starts_with("Failed to get git status: "), "{message}");
                }
                other => panic!("Expected error, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_workspace_change_builds_new_summarizer() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let factory: SummarizerFactory = Arc::new(
            move |settings: &Settings| -> Result<Arc<dyn Summarizer>, SummarizeError> {
                counter.fetch_add(1, Ordering::SeqCst);
                let key = settings.api_key.clone();
                let mut summarizer = MockSummarizer::new();
                summarizer.expect_reconfigure().return_const(());
                summarizer
                    .expect_generate_commit_message()
                    .returning(move |_, _| match &key {
                        Some(_) => Ok(message()),
                        None => Err(SummarizeError::NotConfigured),
                    });
                Ok(Arc::new(summarizer))
            },
        );
        let context = SessionContext::with_factory(
            "/repo",
            Arc::new(runner_with("", "w.txt\n", "")),
            factory,
            &Settings::default(),
        )
        .unwrap();
        let (orch, _rx) = Orchestrator::new(context, Settings::default(), Arc::new(MockWorkbench::new()));

        orch.configure(SettingsUpdate {
            api_key: Some("sk-live".to_string()),
            ..Default::default()
        });
        orch.replace_context("/other").unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(
            orch.generate().await.unwrap(),
            GenerateOutcome::Generated(message())
        );
    }

    #[tokio::test]
    async fn test_dismiss_error_returns_to_idle() {
        let (orch, _rx) = orchestrator(MockGitRunner::new(), MockSummarizer::new(), MockWorkbench::new());
        orch.set_phase(Phase::Error("boom".into()));
        orch.handle(InboundMessage::DismissError).await;
        assert_eq!(orch.phase(), Phase::Idle);
    }

    #[test]
    fn test_workspace_path() {
        let root = Path::new("/repo");
        assert_eq!(workspace_path(root, "./a/b.txt").unwrap(), PathBuf::from("/repo/./a/b.txt"));
        assert!(matches!(
            workspace_path(root, "a/../../b"),
            Err(SessionError::InvalidPath(_))
        ));
    }
}
