//! Runtime settings: credential, model, token budget and timeouts.
//!
//! Settings are read from the environment once at startup, can be overridden
//! by CLI flags, and can be hot-updated through the `configure` protocol
//! message. Invalid numeric values fall back to their defaults with a warning.

use std::env;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Primary credential variable.
pub const API_KEY_ENV: &str = "COMMITPILOT_API_KEY";
/// Fallback credential variable.
pub const FALLBACK_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const MODEL_ENV: &str = "COMMITPILOT_MODEL";
pub const MAX_TOKENS_ENV: &str = "COMMITPILOT_MAX_TOKENS";
pub const API_BASE_ENV: &str = "COMMITPILOT_API_BASE";
pub const GIT_TIMEOUT_ENV: &str = "COMMITPILOT_GIT_TIMEOUT";
pub const REQUEST_TIMEOUT_ENV: &str = "COMMITPILOT_REQUEST_TIMEOUT";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 150;
const DEFAULT_GIT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Settings consumed by the git runner and the summarization client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    /// Overrides the provider's base URL (proxies, tests).
    pub api_base: Option<String>,
    pub git_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_base: None,
            git_timeout: Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    /// Load settings from the environment.
    ///
    /// The credential is taken from `COMMITPILOT_API_KEY`, then `OPENAI_API_KEY`.
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        Self {
            api_key: non_empty_var(API_KEY_ENV).or_else(|| non_empty_var(FALLBACK_API_KEY_ENV)),
            model: non_empty_var(MODEL_ENV).unwrap_or(defaults.model),
            max_tokens: parse_var(MAX_TOKENS_ENV, u64::from(DEFAULT_MAX_TOKENS))
                .try_into()
                .unwrap_or(DEFAULT_MAX_TOKENS),
            api_base: non_empty_var(API_BASE_ENV),
            git_timeout: Duration::from_secs(parse_var(GIT_TIMEOUT_ENV, DEFAULT_GIT_TIMEOUT_SECS)),
            request_timeout: Duration::from_secs(parse_var(
                REQUEST_TIMEOUT_ENV,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
        }
    }

    /// Whether a usable credential is present.
    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Apply a partial update. Returns true if the credential changed.
    pub fn apply(&mut self, update: SettingsUpdate) -> bool {
        let mut credential_changed = false;

        if let Some(key) = update.api_key {
            let key = Some(key.trim().to_string()).filter(|k| !k.is_empty());
            credential_changed = key != self.api_key;
            self.api_key = key;
        }
        if let Some(model) = update.model.filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
        if let Some(max_tokens) = update.max_tokens.filter(|t| *t > 0) {
            self.max_tokens = max_tokens;
        }

        credential_changed
    }
}

/// Partial settings update carried by the `configure` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a positive integer variable, warning and falling back on bad values.
fn parse_var(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(v) if !v.is_empty() => match v.trim().parse::<u64>() {
            Ok(n) if n > 0 => n,
            _ => {
                warn!("Invalid {} value '{}', using default {}", name, v, default);
                default
            }
        },
        _ => default,
    }
}
