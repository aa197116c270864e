//! Error types for commitpilot modules using thiserror.

use thiserror::Error;

/// Errors from running the `git` binary.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("This workspace is not a Git repository: {0}")]
    NotARepository(String),

    #[error("git {command} failed{}: {detail}", code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    CommandFailed {
        command: String,
        code: Option<i32>,
        detail: String,
    },

    #[error("git executable not found. Install git and make sure it is on PATH")]
    GitNotInstalled,

    #[error("Failed to spawn git process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("git command timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors from the summarization provider.
#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error(
        "API key not configured. Set COMMITPILOT_API_KEY (or send a `configure` message with an apiKey)"
    )]
    NotConfigured,

    #[error("Provider returned a malformed commit message: {0}")]
    MalformedResponse(String),

    #[error("Provider request failed: {0}")]
    ProviderError(String),
}

/// Errors from opening files or documents in an editor.
#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("No editor configured. Set VISUAL or EDITOR")]
    NoEditor,

    #[error("Failed to prepare document: {0}")]
    Io(#[source] std::io::Error),

    #[error("Failed to launch editor '{editor}': {source}")]
    Spawn {
        editor: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the commit orchestrator.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    #[error("Commit message cannot be empty")]
    EmptyMessage,

    #[error("A commit message is already being generated")]
    GenerationInProgress,

    #[error("Invalid file path '{0}': must be relative to the workspace root")]
    InvalidPath(String),

    #[error(transparent)]
    Workbench(#[from] WorkbenchError),
}

impl SessionError {
    /// Whether this failure should drive the "setup required" presentation.
    pub fn is_not_configured(&self) -> bool {
        matches!(self, SessionError::Summarize(SummarizeError::NotConfigured))
    }
}
