//! Model backends.
//!
//! Every backend implements [`ModelBackend`], a single "submit prompt, get
//! text or a typed failure" capability. Concrete adapters (Anthropic,
//! OpenAI, Gemini) are feature-gated; [`StaticBackend`] needs no network.
//!
//! Retry policy belongs to the adapters: each HTTP adapter retries rate
//! limited calls with exponential backoff before reporting a failure.
//!
//! ## Security
//!
//! Adapters hold keys in [`ApiCredential`], which redacts itself in
//! `Debug`/`Display` output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;
mod static_backend;

#[cfg(feature = "anthropic")]
mod anthropic;
#[cfg(feature = "gemini")]
mod gemini;
#[cfg(any(feature = "anthropic", feature = "openai", feature = "gemini"))]
mod http;
#[cfg(feature = "openai")]
mod openai;

pub use factory::{BackendFactory, BackendRegistry};
pub use secrets::{ApiCredential, CredentialSource};
pub use static_backend::{StaticBackend, StaticBackendFactory};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicBackend, AnthropicBackendFactory};
#[cfg(feature = "gemini")]
pub use gemini::{GeminiBackend, GeminiBackendFactory};
#[cfg(feature = "openai")]
pub use openai::{OpenAiBackend, OpenAiBackendFactory};

/// Errors from model backends.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Empty completion from {0}")]
    EmptyCompletion(String),
}

impl ProviderError {
    /// Whether the adapter should retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// Generation settings for one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Model identifier; selects the backend variant
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature, 0.0 to 1.0
    pub temperature: f32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// Token usage from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Text produced by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,

    /// Model that actually served the request
    pub model: String,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
            model: String::new(),
        }
    }
}

/// The single capability every backend provides.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Submit a prompt and return generated text, or a failure.
    async fn submit(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<Completion, ProviderError>;
}

/// A backend bound to its name and generation settings.
#[derive(Clone)]
pub struct RegisteredBackend {
    pub name: String,
    pub backend: Arc<dyn ModelBackend>,
    pub config: CompletionConfig,
}

impl std::fmt::Debug for RegisteredBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredBackend")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

/// Named backends, keyed and iterated by name.
#[derive(Debug, Clone, Default)]
pub struct BackendSet {
    backends: BTreeMap<String, RegisteredBackend>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend, replacing any existing one with the same name.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        backend: Arc<dyn ModelBackend>,
        config: CompletionConfig,
    ) {
        let name = name.into();
        self.backends.insert(
            name.clone(),
            RegisteredBackend {
                name,
                backend,
                config,
            },
        );
    }

    pub fn with(
        mut self,
        name: impl Into<String>,
        backend: Arc<dyn ModelBackend>,
        config: CompletionConfig,
    ) -> Self {
        self.insert(name, backend, config);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredBackend> {
        self.backends.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredBackend> {
        self.backends.values()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_only_rate_limits_retry() {
        assert!(ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(!ProviderError::AuthError.is_retryable());
        assert!(!ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn test_backend_set_keyed_by_name() {
        let set = BackendSet::new()
            .with("gpt4", Arc::new(StaticBackend::new("b")), CompletionConfig::default())
            .with("claude", Arc::new(StaticBackend::new("a")), CompletionConfig::default());

        assert_eq!(set.len(), 2);
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["claude", "gpt4"]);
        assert!(set.get("gemini").is_none());
    }
}
