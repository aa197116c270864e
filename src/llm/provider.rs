//! Chat-completion provider selection.

use std::fmt;

use crate::config::Settings;

/// Credential prefix issued by the aggregator gateway.
pub const AGGREGATOR_KEY_PREFIX: &str = "sk-or-";

const DIRECT_BASE_URL: &str = "https://api.openai.com/v1";
const AGGREGATOR_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Model used on the aggregator when the configured id has no vendor prefix.
pub const AGGREGATOR_DEFAULT_MODEL: &str = "x-ai/grok-4-fast:free";

const ATTRIBUTION_REFERER: &str = env!("CARGO_PKG_REPOSITORY");
const ATTRIBUTION_TITLE: &str = "CommitPilot";

/// Which chat-completion service a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// The vendor's own API.
    Direct,
    /// A multi-vendor gateway; requests carry attribution headers.
    Aggregator,
}

impl Provider {
    /// Classify a credential. Aggregator keys are recognized by prefix.
    pub fn from_credential(api_key: &str) -> Self {
        if api_key.trim_start().starts_with(AGGREGATOR_KEY_PREFIX) {
            Provider::Aggregator
        } else {
            Provider::Direct
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Direct => DIRECT_BASE_URL,
            Provider::Aggregator => AGGREGATOR_BASE_URL,
        }
    }

    /// Extra headers sent with every request.
    pub fn extra_headers(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Provider::Direct => &[],
            Provider::Aggregator => &[
                ("HTTP-Referer", ATTRIBUTION_REFERER),
                ("X-Title", ATTRIBUTION_TITLE),
            ],
        }
    }

    /// Model id to request, adjusted for the provider's naming scheme.
    pub fn resolve_model(&self, configured: &str) -> String {
        match self {
            Provider::Aggregator if !configured.contains('/') => {
                AGGREGATOR_DEFAULT_MODEL.to_string()
            }
            _ => configured.to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Direct => "direct",
            Provider::Aggregator => "aggregator",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved request target for one credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Endpoint {
    /// Derive the endpoint from settings, or `None` without a credential.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())?;
        let provider = Provider::from_credential(api_key);
        let base_url = settings
            .api_base
            .as_deref()
            .unwrap_or(provider.default_base_url())
            .trim_end_matches('/')
            .to_string();

        Some(Self {
            provider,
            base_url,
            api_key: api_key.to_string(),
            model: provider.resolve_model(&settings.model),
            max_tokens: settings.max_tokens,
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

// Keep the credential out of logs.
impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}
