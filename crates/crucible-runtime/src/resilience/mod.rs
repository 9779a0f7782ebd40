//! Resilience patterns for backend calls.
//!
//! Retries live in the HTTP adapters; this module holds the per-backend
//! circuit breaker the dispatcher consults before each call.

mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
