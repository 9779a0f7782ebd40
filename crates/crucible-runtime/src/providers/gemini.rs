//! Google Gemini `generateContent` adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::http::{self, RetryPolicy};
use super::secrets::{ApiCredential, CredentialSource, GOOGLE_API_KEY_ENV};
use super::{BackendFactory, Completion, CompletionConfig, ModelBackend, ProviderError, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini models via `POST /models/{model}:generateContent`.
pub struct GeminiBackend {
    credential: ApiCredential,
    base_url: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, "Google API key"),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Settings: `api_key` (falls back to `GOOGLE_API_KEY`), `base_url`,
    /// `max_retries`, `retry_min_delay_ms`.
    pub fn from_settings(settings: &JsonValue) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_settings_or_env(settings, GOOGLE_API_KEY_ENV, "Google API key")?;
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
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: config.max_tokens,
                temperature: config.temperature,
            },
        };

        let response = http::client()?
            .post(format!("{}/models/{}:generateContent", self.base_url, config.model))
            .header("x-goog-api-key", self.credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(http::send_error)?;

        let body: GenerateResponse = http::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyCompletion("gemini".to_string()))?;

        let usage = body.usage_metadata.unwrap_or_default();
        Ok(Completion {
            text,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
            },
            model: config.model.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn submit(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<Completion, ProviderError> {
        http::with_retry("gemini", self.retry, || self.send_once(prompt, config)).await
    }
}

/// Factory for `provider: gemini`.
pub struct GeminiBackendFactory;

impl BackendFactory for GeminiBackendFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelBackend>, ProviderError> {
        http::validate_base_url(settings)?;
        Ok(Arc::new(GeminiBackend::from_settings(settings)?))
    }

    fn validate_settings(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(settings, GOOGLE_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Google API key required: set 'api_key' in settings or {}",
                GOOGLE_API_KEY_ENV
            )));
        }
        http::validate_base_url(settings)
    }

    fn description(&self) -> &'static str {
        "Google Gemini via generateContent"
    }
}
