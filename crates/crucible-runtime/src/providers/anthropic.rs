//! Anthropic Messages API adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::http::{self, RetryPolicy};
use super::secrets::{ApiCredential, CredentialSource, ANTHROPIC_API_KEY_ENV};
use super::{BackendFactory, Completion, CompletionConfig, ModelBackend, ProviderError, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Claude models via `POST /messages`.
pub struct AnthropicBackend {
    credential: ApiCredential,
    base_url: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Anthropic API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Settings: `api_key` (falls back to `ANTHROPIC_API_KEY`), `base_url`,
    /// `max_retries`, `retry_min_delay_ms`.
    pub fn from_settings(settings: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_settings_or_env(
            settings,
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;
        Ok(Self {
            credential,
            base_url: settings["base_url"]
                .as_str()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            retry: RetryPolicy::from_settings(settings),
        })
    }

    async fn send_once(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<Completion, ProviderError> {
        let request = MessagesRequest {
            model: &config.model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = http::client()?
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(http::send_error)?;

        let body: MessagesResponse = http::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let text = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyCompletion("anthropic".to_string()));
        }

        Ok(Completion {
            text,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
            },
            model: body.model,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    async fn submit(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<Completion, ProviderError> {
        http::with_retry("anthropic", self.retry, || self.send_once(prompt, config)).await
    }
}

/// Factory for `provider: anthropic`.
pub struct AnthropicBackendFactory;

impl BackendFactory for AnthropicBackendFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelBackend>, ProviderError> {
        http::validate_base_url(settings)?;
        Ok(Arc::new(AnthropicBackend::from_settings(settings)?))
    }

    fn validate_settings(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(settings, ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in settings or {}",
                ANTHROPIC_API_KEY_ENV
            )));
        }
        http::validate_base_url(settings)
    }

    fn description(&self) -> &'static str {
        "Anthropic Claude via the Messages API"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = MessagesRequest {
            model: "claude-3-opus-20240229",
            max_tokens: 1024,
            temperature: 0.7,
            messages: vec![Message {
                role: "user",
                content: "Situation report",
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "claude-3-opus-20240229");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "Situation report");
    }

    #[test]
    fn test_response_parsing() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{
                "id": "msg_1",
                "type": "message",
                "model": "claude-3-opus-20240229",
                "content": [{"type": "text", "text": "DECISION: evacuate"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 12, "output_tokens": 4}
            }"#,
        )
        .unwrap();
        assert_eq!(body.content[0].text.as_deref(), Some("DECISION: evacuate"));
        assert_eq!(body.usage.output_tokens, 4);
    }

    #[test]
    fn test_key_not_in_debug_output() {
        let secret = "sk-ant-crucible-secret";
        let backend = AnthropicBackend::new(secret);
        let debug = format!("{:?}", backend);
        assert!(!debug.contains(secret));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_settings() {
        let backend = AnthropicBackend::from_settings(&serde_json::json!({
            "api_key": "k",
            "base_url": "https://proxy.example.com/v1/"
        }))
        .unwrap();
        assert_eq!(backend.base_url, "https://proxy.example.com/v1");
        assert_eq!(backend.credential.source(), CredentialSource::Config);
    }

    #[test]
    fn test_factory_rejects_bad_base_url() {
        let result = AnthropicBackendFactory.validate_settings(&serde_json::json!({
            "api_key": "k",
            "base_url": "not-a-url"
        }));
        assert!(result.is_err());
    }
}
