//! Shared HTTP plumbing for the network adapters: one pooled client,
//! status-code mapping, and the rate-limit retry policy.

use backon::{ExponentialBuilder, Retryable};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

use super::ProviderError;

static CLIENT: OnceLock<Result<reqwest::Client, String>> = OnceLock::new();

/// Process-wide HTTP client. Per-request timeouts are enforced by the
/// dispatcher, so the client itself only bounds connection setup.
pub(crate) fn client() -> Result<&'static reqwest::Client, ProviderError> {
    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| ProviderError::HttpError(format!("Failed to build HTTP client: {}", e)))
}

/// How rate-limited calls are retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Reads `max_retries` and `retry_min_delay_ms` from backend settings.
    pub fn from_settings(settings: &JsonValue) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: settings["max_retries"]
                .as_u64()
                .map(|n| n as usize)
                .unwrap_or(defaults.max_retries),
            min_delay: settings["retry_min_delay_ms"]
                .as_u64()
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_delay),
            max_delay: defaults.max_delay,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Run `op`, retrying only rate-limit failures with exponential backoff.
pub(crate) async fn with_retry<T, F, Fut>(
    provider: &'static str,
    policy: RetryPolicy,
    op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    op.retry(policy.backoff())
        .when(ProviderError::is_retryable)
        .notify(|err: &ProviderError, delay: Duration| {
            warn!(provider, error = %err, delay = ?delay, "Rate limited, backing off");
        })
        .await
}

/// Map a transport error.
pub(crate) fn send_error(e: reqwest::Error) -> ProviderError {
    ProviderError::HttpError(e.to_string())
}

/// Turn non-success statuses into typed errors; pass successes through.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderError::RateLimited { retry_after });
    }

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ProviderError::AuthError);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::ApiError {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pull `error.message` out of a JSON error body, or return the raw body.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Validate an optional `base_url` setting.
pub(crate) fn validate_base_url(settings: &JsonValue) -> Result<(), ProviderError> {
    if let Some(url) = settings["base_url"].as_str() {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ProviderError::NotConfigured(
                "base_url must start with http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"type": "invalid_request", "message": "bad model"}}"#),
            "bad model"
        );
        assert_eq!(error_message("  gateway down \n"), "gateway down");
    }

    #[test]
    fn test_policy_from_settings() {
        let policy = RetryPolicy::from_settings(&serde_json::json!({
            "max_retries": 1,
            "retry_min_delay_ms": 10
        }));
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.min_delay, Duration::from_millis(10));
        assert_eq!(RetryPolicy::from_settings(&serde_json::json!({})), RetryPolicy::default());
    }

    #[test]
    fn test_base_url_validation() {
        assert!(validate_base_url(&serde_json::json!({"base_url": "ftp://x"})).is_err());
        assert!(validate_base_url(&serde_json::json!({"base_url": "https://x"})).is_ok());
        assert!(validate_base_url(&serde_json::json!({})).is_ok());
    }

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_rate_limits_are_retried() {
        let calls = AtomicUsize::new(0);
        let result = with_retry("test", fast_policy(3), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProviderError::RateLimited { retry_after: None })
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_retry("test", fast_policy(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::AuthError)
        })
        .await;

        assert!(matches!(result, Err(ProviderError::AuthError)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
