//! commitpilot - generate conventional commit messages from pending git changes.
//!
//! # Overview
//!
//! commitpilot reads the repository's staged, unstaged and untracked state
//! through the system `git` binary, asks a chat-completion model to summarize
//! the diff, and applies the result back by staging and committing. A host
//! (editor extension or other front-end) drives it over a JSON-lines protocol;
//! the terminal subcommands drive the same orchestrator directly.

pub mod config;
pub mod error;
pub mod git;
pub mod llm;
pub mod session;

// Re-export commonly used types
pub use config::{Settings, SettingsUpdate};
pub use error::{GitError, SessionError, SummarizeError, WorkbenchError};
pub use git::{ChangeSet, CommitOutcome, FileState, FileStatus, RepositoryService};
pub use llm::{CommitMessageResult, CommitType, Summarizer};
pub use session::{GenerateOutcome, InboundMessage, Orchestrator, OutboundMessage, Phase, SessionContext};
