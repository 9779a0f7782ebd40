//! # crucible-runtime
//!
//! Async side of Crucible: model backends, concurrent dispatch, the
//! revision cycle and the scenario driver.
//!
//! Scoring, feedback synthesis and storage are deterministic and live in
//! `crucible-core`; this crate only adds the calls to model backends around
//! them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crucible_core::Scenario;
//! use crucible_runtime::{BackendRegistry, RuntimeConfig, ScenarioDriver};
//!
//! let config = RuntimeConfig::from_yaml_file("crucible.yaml")?;
//! let driver = ScenarioDriver::from_config(&config, &BackendRegistry::with_defaults())?;
//!
//! let scenario = Scenario::from_file("scenarios/earthquake_response.yaml")?;
//! let report = driver.run(&scenario).await?;
//! println!("avg safety: {:?}", report.summary.avg_safety);
//! ```

pub mod config;
pub mod dispatcher;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod revision;

pub use config::{BackendConfig, ConfigError, RuntimeConfig};
pub use dispatcher::{BackendOutcome, DispatchResult, Dispatcher};
pub use orchestrator::{EventReport, RunReport, RuntimeError, ScenarioDriver, ScenarioDriverBuilder};
pub use providers::{
    BackendFactory, BackendRegistry, BackendSet, Completion, CompletionConfig, ModelBackend,
    ProviderError, RegisteredBackend, StaticBackend, TokenUsage,
};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use revision::{RevisionLoop, RevisionState};
