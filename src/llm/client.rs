//! Chat-completion client that turns a diff into a commit message.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::SummarizeError;

use super::json::extract_json;
use super::prompt::{SYSTEM_INSTRUCTION, build_user_prompt};
use super::provider::Endpoint;

/// Sampling temperature for generation.
pub const TEMPERATURE: f32 = 0.3;

/// Conventional-commit type accepted from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Feat,
    Fix,
    Docs,
    Style,
    Refactor,
    Test,
    Chore,
}

impl CommitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitType::Feat => "feat",
            CommitType::Fix => "fix",
            CommitType::Docs => "docs",
            CommitType::Style => "style",
            CommitType::Refactor => "refactor",
            CommitType::Test => "test",
            CommitType::Chore => "chore",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessageResult {
    /// `type(scope): text`, targeted at 50 characters.
    pub summary: String,
    /// Body text; may be empty.
    pub description: String,
    pub commit_type: CommitType,
}

impl CommitMessageResult {
    /// Summary and body separated by a blank line, body omitted when empty.
    pub fn full_message(&self) -> String {
        let description = self.description.trim();
        if description.is_empty() {
            self.summary.clone()
        } else {
            format!("{}\n\n{}", self.summary, description)
        }
    }
}

/// Shape the model is asked to produce. Every field is optional here so
/// missing pieces get a precise error instead of a serde message.
#[derive(Debug, Deserialize)]
struct RawCommitMessage {
    summary: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    commit_type: Option<String>,
}

/// Parse the model's reply text into a commit message.
pub fn parse_commit_message(content: &str) -> Result<CommitMessageResult, SummarizeError> {
    let json = extract_json(content);
    let raw: RawCommitMessage = serde_json::from_str(&json)
        .map_err(|e| SummarizeError::MalformedResponse(format!("reply is not valid JSON: {e}")))?;

    let summary = raw
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SummarizeError::MalformedResponse("missing summary".to_string()))?;

    let type_name = raw
        .commit_type
        .ok_or_else(|| SummarizeError::MalformedResponse("missing type".to_string()))?;
    let commit_type = serde_json::from_value(serde_json::Value::String(type_name.trim().to_lowercase()))
        .map_err(|_| SummarizeError::MalformedResponse(format!("unknown commit type '{type_name}'")))?;

    Ok(CommitMessageResult {
        summary,
        description: raw.description.unwrap_or_default(),
        commit_type,
    })
}

/// Seam between the orchestrator and the remote model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Generate a commit message for `diff` touching `changed_files`.
    async fn generate_commit_message(
        &self,
        diff: &str,
        changed_files: &[String],
    ) -> Result<CommitMessageResult, SummarizeError>;

    /// Re-derive provider selection from updated settings.
    fn reconfigure(&self, settings: &Settings);
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// [`Summarizer`] backed by an OpenAI-compatible `/chat/completions` API.
pub struct ChatCompletionClient {
    http: reqwest::Client,
    endpoint: RwLock<Option<Endpoint>>,
}

impl ChatCompletionClient {
    pub fn new(settings: &Settings) -> Result<Self, SummarizeError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SummarizeError::ProviderError(format!("failed to build HTTP client: {e}")))?;

        let client = Self {
            http,
            endpoint: RwLock::new(None),
        };
        client.reconfigure(settings);
        Ok(client)
    }

    fn current_endpoint(&self) -> Option<Endpoint> {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Summarizer for ChatCompletionClient {
    async fn generate_commit_message(
        &self,
        diff: &str,
        changed_files: &[String],
    ) -> Result<CommitMessageResult, SummarizeError> {
        let endpoint = self.current_endpoint().ok_or(SummarizeError::NotConfigured)?;
        let user_prompt = build_user_prompt(diff, changed_files);

        let request = ChatRequest {
            model: &endpoint.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: endpoint.max_tokens,
        };

        debug!(
            provider = %endpoint.provider,
            model = %endpoint.model,
            files = changed_files.len(),
            prompt_bytes = user_prompt.len(),
            "requesting commit message"
        );

        let mut builder = self
            .http
            .post(endpoint.completions_url())
            .bearer_auth(&endpoint.api_key)
            .json(&request);
        for (name, value) in endpoint.provider.extra_headers() {
            builder = builder.header(*name, *value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SummarizeError::ProviderError(describe_transport_error(&e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SummarizeError::ProviderError(format!("failed to read response: {e}")))?;

        if !(200..300).contains(&status) {
            warn!(status, "provider returned an error status");
            return Err(SummarizeError::ProviderError(summarize_http_error(status, &body)));
        }

        let envelope: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            SummarizeError::ProviderError(format!("unreadable response envelope: {e}"))
        })?;

        let content = envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SummarizeError::MalformedResponse("no content in reply".to_string()))?;

        let result = parse_commit_message(&content)?;
        info!(commit_type = %result.commit_type, "generated commit message");
        Ok(result)
    }

    fn reconfigure(&self, settings: &Settings) {
        let endpoint = Endpoint::from_settings(settings);
        match &endpoint {
            Some(e) => debug!(provider = %e.provider, model = %e.model, "summarizer configured"),
            None => debug!("summarizer has no credential"),
        }
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = endpoint;
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("could not connect to provider: {err}")
    } else {
        format!("request failed: {err}")
    }
}

/// Human-readable summary of a non-2xx provider response.
fn summarize_http_error(status: u16, body: &str) -> String {
    let detail = provider_message(body);
    match status {
        401 => format!("invalid API key (HTTP 401): {detail}"),
        403 => format!("access denied (HTTP 403): {detail}"),
        404 => format!("model or endpoint not found (HTTP 404): {detail}"),
        429 => format!("rate limited (HTTP 429): {detail}"),
        500..=599 => format!("provider server error (HTTP {status}): {detail}"),
        _ => format!("HTTP {status}: {detail}"),
    }
}

/// Pull `error.message` out of an OpenAI-style error body, else the raw text.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(300).collect::<String>().trim().to_string())
}
