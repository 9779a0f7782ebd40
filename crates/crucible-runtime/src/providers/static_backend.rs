//! Canned-response backend for offline runs.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

use super::{BackendFactory, Completion, CompletionConfig, ModelBackend, ProviderError, TokenUsage};

const DEFAULT_RESPONSE: &str = "ASSESSMENT: The situation is severe and resources are limited.\n\
DECISION: Immediately deploy available teams to the highest-risk site and evacuate residents in danger.\n\
REASONING: Because lives are at immediate risk, therefore rescue takes priority. \
Given that resources are limited, we coordinate with local responders.\n\
CONSEQUENCES: Lower-priority sites wait longer; recovery planning starts once the area is secure.";

/// Returns the same text for every prompt, optionally after a delay.
#[derive(Debug, Clone)]
pub struct StaticBackend {
    response: String,
    delay: Option<Duration>,
}

impl StaticBackend {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            delay: None,
        }
    }

    /// Sleep before answering, to simulate latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Builds from settings: `response` (text) and `delay_ms` (integer).
    pub fn from_settings(settings: &JsonValue) -> Self {
        let backend = Self::new(settings["response"].as_str().unwrap_or(DEFAULT_RESPONSE));
        match settings["delay_ms"].as_u64() {
            Some(ms) => backend.with_delay(Duration::from_millis(ms)),
            None => backend,
        }
    }
}

impl Default for StaticBackend {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE)
    }
}

#[async_trait]
impl ModelBackend for StaticBackend {
    async fn submit(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<Completion, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Completion {
            text: self.response.clone(),
            usage: TokenUsage {
                prompt_tokens: (prompt.len() / 4) as u32,
                completion_tokens: (self.response.len() / 4) as u32,
            },
            model: config.model.clone(),
        })
    }
}

/// Factory for `provider: static`.
pub struct StaticBackendFactory;

impl BackendFactory for StaticBackendFactory {
    fn provider_type(&self) -> &'static str {
        "static"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelBackend>, ProviderError> {
        self.validate_settings(settings)?;
        Ok(Arc::new(StaticBackend::from_settings(settings)))
    }

    fn validate_settings(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        if !settings["response"].is_null() && !settings["response"].is_string() {
            return Err(ProviderError::NotConfigured(
                "static backend 'response' must be a string".to_string(),
            ));
        }
        if !settings["delay_ms"].is_null() && !settings["delay_ms"].is_u64() {
            return Err(ProviderError::NotConfigured(
                "static backend 'delay_ms' must be a non-negative integer".to_string(),
            ));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Canned responses without network access"
    }
}
