//! Concurrent fan-out of one prompt to many backends.
//!
//! Every backend call runs independently with its own timeout and circuit.
//! The result always holds exactly one entry per requested backend; a
//! failing or slow backend becomes a [`BackendOutcome::Failed`] entry and
//! never affects its siblings. No retries happen here.

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::providers::{BackendSet, ProviderError, RegisteredBackend, TokenUsage};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};

/// Result of one backend call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BackendOutcome {
    Completed {
        text: String,
        #[serde(with = "duration_secs_f64")]
        latency: Duration,
        usage: TokenUsage,
    },
    Failed {
        reason: String,
        #[serde(with = "duration_secs_f64")]
        latency: Duration,
    },
}

mod duration_secs_f64 {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

impl BackendOutcome {
    fn failed(reason: impl Into<String>, latency: Duration) -> Self {
        BackendOutcome::Failed {
            reason: reason.into(),
            latency,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            BackendOutcome::Completed { text, .. } => Some(text),
            BackendOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BackendOutcome::Failed { .. })
    }

    pub fn latency(&self) -> Duration {
        match self {
            BackendOutcome::Completed { latency, .. } | BackendOutcome::Failed { latency, .. } => {
                *latency
            }
        }
    }
}

/// Backend name to outcome.
pub type DispatchResult = BTreeMap<String, BackendOutcome>;

/// Sends prompts to a fixed set of backends.
pub struct Dispatcher {
    backends: BackendSet,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl Dispatcher {
    pub fn new(backends: BackendSet, timeout: Duration) -> Self {
        Self::with_circuit_breaker(backends, timeout, CircuitBreakerConfig::default())
    }

    pub fn with_circuit_breaker(
        backends: BackendSet,
        timeout: Duration,
        breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            backends,
            timeout,
            breaker: CircuitBreaker::new(breaker),
        }
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Send `prompt` to every backend and wait for all of them.
    pub async fn dispatch(&self, prompt: &str) -> DispatchResult {
        let calls = self.backends.iter().map(|backend| async move {
            (backend.name.clone(), self.call(backend, prompt).await)
        });
        join_all(calls).await.into_iter().collect()
    }

    /// Send `prompt` to the named backends only. Unknown names get a
    /// failed entry.
    pub async fn dispatch_to<'a, I>(&self, prompt: &str, names: I) -> DispatchResult
    where
        I: IntoIterator<Item = &'a str>,
    {
        let calls = names.into_iter().map(|name| async move {
            (name.to_string(), self.submit_one(name, prompt).await)
        });
        join_all(calls).await.into_iter().collect()
    }

    /// Send `prompt` to one backend by name.
    pub async fn submit_one(&self, name: &str, prompt: &str) -> BackendOutcome {
        match self.backends.get(name) {
            Some(backend) => self.call(backend, prompt).await,
            None => {
                tracing::warn!(backend = %name, "Dispatch to unknown backend");
                BackendOutcome::failed(format!("unknown backend '{}'", name), Duration::ZERO)
            }
        }
    }

    async fn call(&self, backend: &RegisteredBackend, prompt: &str) -> BackendOutcome {
        let name = backend.name.as_str();
        if self.breaker.is_open(name) {
            tracing::warn!(backend = %name, "Circuit open, skipping backend");
            return BackendOutcome::failed("circuit open", Duration::ZERO);
        }

        let started = Instant::now();
        let result =
            tokio::time::timeout(self.timeout, backend.backend.submit(prompt, &backend.config))
                .await;
        let latency = started.elapsed();

        match result {
            Ok(Ok(completion)) => {
                self.breaker.record_success(name);
                tracing::debug!(
                    backend = %name,
                    latency_ms = latency.as_millis() as u64,
                    tokens = completion.usage.total(),
                    "Backend responded"
                );
                BackendOutcome::Completed {
                    text: completion.text,
                    latency,
                    usage: completion.usage,
                }
            }
            Ok(Err(e)) => {
                self.breaker.record_failure(name);
                tracing::warn!(backend = %name, error = %e, "Backend call failed");
                BackendOutcome::failed(e.to_string(), latency)
            }
            Err(_) => {
                self.breaker.record_failure(name);
                tracing::warn!(backend = %name, timeout = ?self.timeout, "Backend call timed out");
                BackendOutcome::failed(ProviderError::Timeout(self.timeout).to_string(), latency)
            }
        }
    }
}
