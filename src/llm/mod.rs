//! Commit message summarization over a chat-completion API.

pub mod client;
pub mod json;
pub mod prompt;
pub mod provider;

pub use client::{
    ChatCompletionClient, CommitMessageResult, CommitType, Summarizer, parse_commit_message,
};
pub use json::extract_json;
pub use provider::{Endpoint, Provider};
