//! Messages exchanged with the presentation host.
//!
//! Both directions are JSON objects tagged by a camelCase `type` field. The
//! `serve` subcommand carries one message per line.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::SettingsUpdate;
use crate::git::{ChangeSet, FileStatus};
use crate::llm::{CommitMessageResult, CommitType};

/// Requests from the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundMessage {
    GenerateCommitMessage,
    RegenerateCommitMessage,
    GetGitStatus,
    Refresh,
    StageFile {
        #[serde(rename = "filePath")]
        file_path: String,
    },
    StageAllChanges,
    CommitChanges {
        message: String,
    },
    OpenFile {
        #[serde(rename = "filePath")]
        file_path: String,
    },
    OpenInEditor {
        content: String,
    },
    Configure(SettingsUpdate),
    WorkspaceChanged {
        root: PathBuf,
    },
    DismissError,
}

impl InboundMessage {
    /// Parse one protocol line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Wire name of the message, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::GenerateCommitMessage => "generateCommitMessage",
            InboundMessage::RegenerateCommitMessage => "regenerateCommitMessage",
            InboundMessage::GetGitStatus => "getGitStatus",
            InboundMessage::Refresh => "refresh",
            InboundMessage::StageFile { .. } => "stageFile",
            InboundMessage::StageAllChanges => "stageAllChanges",
            InboundMessage::CommitChanges { .. } => "commitChanges",
            InboundMessage::OpenFile { .. } => "openFile",
            InboundMessage::OpenInEditor { .. } => "openInEditor",
            InboundMessage::Configure(_) => "configure",
            InboundMessage::WorkspaceChanged { .. } => "workspaceChanged",
            InboundMessage::DismissError => "dismissError",
        }
    }
}

/// Notifications to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Status { message: String, loading: bool },
    Error { message: String },
    GitStatus { data: GitStatusView },
    CommitMessage { data: CommitMessageView },
    CommitSuccess,
    ShowApiKeySetup { message: String },
}

impl OutboundMessage {
    pub fn status(message: impl Into<String>, loading: bool) -> Self {
        OutboundMessage::Status {
            message: message.into(),
            loading,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutboundMessage::Error {
            message: message.into(),
        }
    }

    /// Serialize as one protocol line, without the trailing newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Full status as the host renders it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatusView {
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub has_changes: bool,
    pub staged_count: usize,
    pub modified_count: usize,
    pub staged_files: Vec<FileStatus>,
    pub modified_files: Vec<FileStatus>,
}

impl From<&ChangeSet> for GitStatusView {
    fn from(status: &ChangeSet) -> Self {
        Self {
            staged: status.staged_paths(),
            modified: status.modified_paths(),
            has_changes: status.has_changes,
            staged_count: status.staged_files.len(),
            modified_count: status.modified_files.len(),
            staged_files: status.staged_files.clone(),
            modified_files: status.modified_files.clone(),
        }
    }
}

/// A generated message as the host renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMessageView {
    pub summary: String,
    pub description: String,
    #[serde(rename = "type")]
    pub commit_type: CommitType,
    pub full_message: String,
}

impl From<&CommitMessageResult> for CommitMessageView {
    fn from(result: &CommitMessageResult) -> Self {
        Self {
            summary: result.summary.clone(),
            description: result.description.clone(),
            commit_type: result.commit_type,
            full_message: result.full_message(),
        }
    }
}
