//! Scenario driver.
//!
//! Replays a scenario's events strictly in order. For each event that
//! requires action:
//! 1. Build the prompt from the event and the context so far
//! 2. Fan out to every backend and wait for all of them
//! 3. Score each returned response and build its feedback
//! 4. Run the revision cycles for this event concurrently
//! 5. Append the finished records to the feedback log
//!
//! Only then is the event's context update merged, so a response is never
//! scored against facts introduced by its own event.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crucible_core::{
    load_engine, EvaluationError, Evaluator, FeedbackStore, FeedbackSynthesizer, FeedbackTrends,
    MetricScorer, RunSummary, RunningContext, Scenario, StoreError, SummaryBuilder,
};

use crate::config::{ConfigError, RuntimeConfig};
use crate::dispatcher::{BackendOutcome, DispatchResult, Dispatcher};
use crate::prompts::build_event_prompt;
use crate::providers::{BackendRegistry, BackendSet};
use crate::resilience::CircuitBreakerConfig;
use crate::revision::{RevisionLoop, RevisionState};

/// Errors that end a scenario run.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Driver not configured: {0}")]
    NotConfigured(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Evaluation setup failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Failed to store record (scenario {scenario_id}, event {event_id}, backend {backend}): {source}")]
    Store {
        scenario_id: String,
        event_id: String,
        backend: String,
        #[source]
        source: StoreError,
    },
}

/// What happened for one event.
#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    pub event_id: String,
    pub event_type: String,
    pub severity_level: u8,
    pub required_action: bool,

    /// Dispatch outcome per backend; empty for context-only events
    pub outcomes: DispatchResult,
}

/// Everything a run produced, for the reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario_name: String,
    pub scenario_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub trends: FeedbackTrends,
    pub events: Vec<EventReport>,

    /// Feedback log written during the run
    pub log_path: PathBuf,
}

impl RunReport {
    /// `<scenario_id>_results.json`
    pub fn file_name(&self) -> String {
        format!("{}_results.json", self.scenario_id)
    }
}

/// Drives scenarios through dispatch, scoring, revision and storage.
pub struct ScenarioDriver {
    dispatcher: Dispatcher,
    scorer: MetricScorer,
    synthesizer: FeedbackSynthesizer,
    output_dir: PathBuf,
}

impl ScenarioDriver {
    pub fn builder() -> ScenarioDriverBuilder {
        ScenarioDriverBuilder::new()
    }

    /// Driver for `config`, creating backends through `registry`.
    pub fn from_config(
        config: &RuntimeConfig,
        registry: &BackendRegistry,
    ) -> Result<Self, RuntimeError> {
        let backends = config.build_backends(registry)?;
        Self::with_backends(config, backends)
    }

    /// Driver for `config` using an already-built backend set.
    pub fn with_backends(config: &RuntimeConfig, backends: BackendSet) -> Result<Self, RuntimeError> {
        let (scorer, synthesizer) =
            load_engine(config.scoring.as_deref(), config.thresholds.as_deref())?;
        ScenarioDriverBuilder::new()
            .config(config.clone())
            .backends(backends)
            .scorer(scorer)
            .synthesizer(synthesizer)
            .build()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run every event of `scenario`.
    ///
    /// Backend and revision failures are recorded and the run continues; a
    /// feedback log write failure ends the run. Records already written stay
    /// in the log.
    pub async fn run(&self, scenario: &Scenario) -> Result<RunReport, RuntimeError> {
        let started_at = Utc::now();
        let scenario_id = scenario.id();
        let store = FeedbackStore::for_scenario(&self.output_dir, &scenario.name)
            .map_err(EvaluationError::from)?;

        let mut evaluator = Evaluator::new(&scenario_id, &self.scorer, &self.synthesizer, store);
        let revision = RevisionLoop::new(&self.dispatcher);
        let mut context = RunningContext::new();
        let mut summary = SummaryBuilder::new();
        let mut events = Vec::with_capacity(scenario.events.len());

        tracing::info!(
            scenario = %scenario.name,
            events = scenario.events.len(),
            backends = self.dispatcher.backends().len(),
            log = %evaluator.store_path().display(),
            "Starting scenario"
        );

        for (idx, event) in scenario.events.iter().enumerate() {
            let event_id = format!("{:02}_{}", idx + 1, event.event_type);

            if !event.required_action {
                tracing::debug!(event_id = %event_id, "Context-only event");
                summary.record_context_only_event();
                context.merge(&event.context_update);
                events.push(EventReport {
                    event_id,
                    event_type: event.event_type.clone(),
                    severity_level: event.severity_level,
                    required_action: false,
                    outcomes: DispatchResult::new(),
                });
                continue;
            }

            tracing::info!(
                event_id = %event_id,
                severity = event.severity_level,
                "Dispatching event"
            );
            summary.record_evaluated_event();

            let prompt = build_event_prompt(event, &context);
            let outcomes = self.dispatcher.dispatch(&prompt).await;

            let mut pending = Vec::new();
            for (backend, outcome) in &outcomes {
                match outcome {
                    BackendOutcome::Completed { text, latency, .. } => {
                        summary.record_response(backend, *latency);
                        pending.push(evaluator.evaluate(&event_id, backend, text, &context));
                    }
                    BackendOutcome::Failed { reason, .. } => {
                        tracing::debug!(event_id = %event_id, backend = %backend, reason = %reason, "No response to score");
                        summary.record_dispatch_failure(backend);
                    }
                }
            }

            let finished = join_all(pending.into_iter().map(|record| revision.revise(record))).await;
            for (state, record) in finished {
                debug_assert!(state == RevisionState::Scored || state.is_terminal());
                summary.record_evaluation(&record);
                let backend = record.backend.clone();
                evaluator
                    .record(record)
                    .map_err(|source| RuntimeError::Store {
                        scenario_id: scenario_id.clone(),
                        event_id: event_id.clone(),
                        backend,
                        source,
                    })?;
            }

            context.merge(&event.context_update);
            events.push(EventReport {
                event_id,
                event_type: event.event_type.clone(),
                severity_level: event.severity_level,
                required_action: true,
                outcomes,
            });
        }

        let summary = summary.build();
        tracing::info!(
            scenario = %scenario.name,
            records = summary.records,
            dispatch_failures = summary.dispatch_failures,
            avg_response_time_secs = ?summary.avg_response_time_secs,
            avg_safety = ?summary.avg_safety,
            avg_ethics = ?summary.avg_ethics,
            "Scenario complete"
        );

        Ok(RunReport {
            scenario_name: scenario.name.clone(),
            scenario_id,
            started_at,
            finished_at: Utc::now(),
            summary,
            trends: evaluator.trends(),
            events,
            log_path: evaluator.store_path().to_path_buf(),
        })
    }
}

/// Builder for [`ScenarioDriver`].
pub struct ScenarioDriverBuilder {
    backends: Option<BackendSet>,
    config: RuntimeConfig,
    scorer: Option<MetricScorer>,
    synthesizer: Option<FeedbackSynthesizer>,
}

impl ScenarioDriverBuilder {
    pub fn new() -> Self {
        Self {
            backends: None,
            config: RuntimeConfig::default(),
            scorer: None,
            synthesizer: None,
        }
    }

    pub fn backends(mut self, backends: BackendSet) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Timeout, circuit breaker and output directory come from `config`.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = config;
        self
    }

    pub fn scorer(mut self, scorer: MetricScorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn synthesizer(mut self, synthesizer: FeedbackSynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn build(self) -> Result<ScenarioDriver, RuntimeError> {
        let backends = self
            .backends
            .ok_or_else(|| RuntimeError::NotConfigured("no backends set".to_string()))?;
        if backends.is_empty() {
            return Err(RuntimeError::NotConfigured(
                "backend set is empty".to_string(),
            ));
        }

        Ok(ScenarioDriver {
            dispatcher: Dispatcher::with_circuit_breaker(
                backends,
                self.config.request_timeout,
                self.config.circuit_breaker,
            ),
            scorer: self.scorer.unwrap_or_default(),
            synthesizer: self.synthesizer.unwrap_or_default(),
            output_dir: self.config.output_dir,
        })
    }
}

impl Default for ScenarioDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
