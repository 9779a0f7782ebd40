//! Circuit breaker to stop calling a backend that keeps failing.
//!
//! When a backend fails repeatedly its circuit opens and the dispatcher
//! reports "circuit open" for it without making the call, until a recovery
//! timeout lets a trial call through.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time before a trial call is allowed, e.g. "30s"
    #[serde(with = "crate::config::human_duration")]
    pub recovery_timeout: Duration,

    /// Successes needed in half-open state to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of one backend's circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Calls are skipped
    Open { opened_at: Instant },

    /// Trial calls are allowed
    HalfOpen { successes: u32 },
}

/// Per-backend circuit breaker.
///
/// Each backend has its own circuit so one failing provider never
/// short-circuits the others.
pub struct CircuitBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether calls to `backend` should be skipped right now.
    ///
    /// An open circuit whose recovery timeout has passed moves to half-open
    /// and lets the call through.
    pub fn is_open(&self, backend: &str) -> bool {
        let states = self.states.read();
        match states.get(backend) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(backend);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, backend: &str) {
        let mut states = self.states.write();
        match states.get(backend).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(backend.to_string(), CircuitState::Closed { failures: 0 });
                    tracing::info!(backend, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        backend.to_string(),
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { failures }) if failures > 0 => {
                states.insert(backend.to_string(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, backend: &str) {
        let mut states = self.states.write();
        let current = states
            .get(backend)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 });

        match current {
            CircuitState::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.config.failure_threshold {
                    states.insert(
                        backend.to_string(),
                        CircuitState::Open {
                            opened_at: Instant::now(),
                        },
                    );
                    tracing::warn!(backend, failures, "Circuit opened after repeated failures");
                } else {
                    states.insert(backend.to_string(), CircuitState::Closed { failures });
                }
            }
            CircuitState::HalfOpen { .. } => {
                states.insert(
                    backend.to_string(),
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(backend, "Circuit reopened after failed recovery attempt");
            }
            CircuitState::Open { .. } => {}
        }
    }

    fn transition_to_half_open(&self, backend: &str) {
        let mut states = self.states.write();
        if matches!(states.get(backend), Some(CircuitState::Open { .. })) {
            states.insert(backend.to_string(), CircuitState::HalfOpen { successes: 0 });
            tracing::info!(backend, "Circuit half-open, allowing trial call");
        }
    }

    pub fn state(&self, backend: &str) -> CircuitState {
        self.states
            .read()
            .get(backend)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Reset all circuits to closed.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, recovery_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout,
            success_threshold: 1,
        })
    }

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::default();
        assert!(!cb.is_open("claude"));
        assert_eq!(cb.state("claude"), CircuitState::Closed { failures: 0 });
    }

    #[test]
    fn test_circuit_opens_after_failures() {
        let cb = breaker(2, Duration::from_secs(60));

        cb.record_failure("claude");
        assert!(!cb.is_open("claude"));

        cb.record_failure("claude");
        assert!(cb.is_open("claude"));
    }

    #[test]
    fn test_single_failure_threshold() {
        let cb = breaker(1, Duration::from_secs(60));
        cb.record_failure("gemini");
        assert!(cb.is_open("gemini"));
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::default();

        cb.record_failure("gpt4");
        cb.record_failure("gpt4");
        cb.record_success("gpt4");

        cb.record_failure("gpt4");
        cb.record_failure("gpt4");
        assert!(!cb.is_open("gpt4"));
    }

    #[test]
    fn test_backends_are_independent() {
        let cb = breaker(2, Duration::from_secs(60));

        cb.record_failure("claude");
        cb.record_failure("claude");

        assert!(cb.is_open("claude"));
        assert!(!cb.is_open("gpt4"));
    }

    #[test]
    fn test_recovery_after_timeout() {
        let cb = breaker(1, Duration::ZERO);
        cb.record_failure("claude");

        // Zero timeout: the next check moves straight to half-open
        assert!(!cb.is_open("claude"));
        assert_eq!(cb.state("claude"), CircuitState::HalfOpen { successes: 0 });

        cb.record_success("claude");
        assert_eq!(cb.state("claude"), CircuitState::Closed { failures: 0 });
    }

    #[test]
    fn test_failed_trial_reopens() {
        let cb = breaker(1, Duration::ZERO);
        cb.record_failure("claude");
        assert!(!cb.is_open("claude"));

        cb.record_failure("claude");
        assert!(matches!(cb.state("claude"), CircuitState::Open { .. }));
    }

    #[test]
    fn test_config_parses_human_durations() {
        let config: CircuitBreakerConfig =
            serde_yaml::from_str("failure_threshold: 5\nrecovery_timeout: 1m 30s\n").unwrap();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout, Duration::from_secs(90));
        assert_eq!(config.success_threshold, 2);
    }
}
