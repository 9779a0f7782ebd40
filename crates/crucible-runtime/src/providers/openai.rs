//! OpenAI Chat Completions adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::http::{self, RetryPolicy};
use super::secrets::{ApiCredential, CredentialSource, OPENAI_API_KEY_ENV};
use super::{BackendFactory, Completion, CompletionConfig, ModelBackend, ProviderError, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// GPT models via `POST /chat/completions`.
pub struct OpenAiBackend {
    credential: ApiCredential,
    base_url: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, "OpenAI API key"),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Settings: `api_key` (falls back to `OPENAI_API_KEY`), `base_url` for
    /// compatible gateways, `max_retries`, `retry_min_delay_ms`.
    pub fn from_settings(settings: &JsonValue) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_settings_or_env(settings, OPENAI_API_KEY_ENV, "OpenAI API key")?;
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
        let request = ChatRequest {
            model: &config.model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = http::client()?
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(http::send_error)?;

        let body: ChatResponse = http::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyCompletion("openai".to_string()))?;

        let usage = body.usage.unwrap_or_default();
        Ok(Completion {
            text,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
            model: body.model,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn submit(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<Completion, ProviderError> {
        http::with_retry("openai", self.retry, || self.send_once(prompt, config)).await
    }
}

/// Factory for `provider: openai`.
pub struct OpenAiBackendFactory;

impl BackendFactory for OpenAiBackendFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelBackend>, ProviderError> {
        http::validate_base_url(settings)?;
        Ok(Arc::new(OpenAiBackend::from_settings(settings)?))
    }

    fn validate_settings(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(settings, OPENAI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "OpenAI API key required: set 'api_key' in settings or {}",
                OPENAI_API_KEY_ENV
            )));
        }
        http::validate_base_url(settings)
    }

    fn description(&self) -> &'static str {
        "OpenAI GPT via Chat Completions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let body: ChatResponse = serde_json::from_str(
            r#"{
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "model": "gpt-4-turbo-preview",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "ASSESSMENT: ok"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
            }"#,
        )
        .unwrap();
        assert_eq!(body.choices[0].message.content.as_deref(), Some("ASSESSMENT: ok"));
        assert_eq!(body.usage.unwrap().prompt_tokens, 9);
    }

    #[test]
    fn test_null_content_parses() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#,
        )
        .unwrap();
        assert!(body.choices[0].message.content.is_none());
        assert!(body.usage.is_none());
    }

    #[test]
    fn test_key_not_in_debug_output() {
        let secret = "sk-openai-crucible-secret";
        let debug = format!("{:?}", OpenAiBackend::new(secret));
        assert!(!debug.contains(secret));
    }

    #[test]
    fn test_factory_type() {
        assert_eq!(OpenAiBackendFactory.provider_type(), "openai");
        let backend = OpenAiBackend::from_settings(&serde_json::json!({"api_key": "k"})).unwrap();
        assert_eq!(backend.base_url, DEFAULT_BASE_URL);
    }
}
