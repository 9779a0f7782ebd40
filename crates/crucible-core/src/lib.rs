//! # crucible-core
//!
//! Deterministic evaluation engine for crisis-scenario model responses.
//!
//! This crate scores responses and manages their feedback records. It never
//! calls a model; dispatch and revision live in `crucible-runtime`.
//!
//! ## Pipeline
//!
//! 1. **Score**: [`MetricScorer`] maps a response and the running context to
//!    ten independent scores in [0, 1]
//! 2. **Synthesize**: [`FeedbackSynthesizer`] flags dimensions below their
//!    thresholds and builds a revision prompt
//! 3. **Record**: [`Evaluator`] appends completed records to the
//!    [`FeedbackStore`] and its in-memory history
//! 4. **Analyze**: [`TrendAnalyzer`] computes frequency counts, mean,
//!    standard deviation and slope per metric
//!
//! ## Example
//!
//! ```rust,ignore
//! use crucible_core::{Evaluator, FeedbackStore, FeedbackSynthesizer, MetricScorer, RunningContext};
//!
//! let scorer = MetricScorer::default();
//! let synthesizer = FeedbackSynthesizer::default();
//! let store = FeedbackStore::for_scenario("results", "Earthquake Response")?;
//! let mut evaluator = Evaluator::new("earthquake_response", &scorer, &synthesizer, store);
//!
//! let record = evaluator.evaluate("01_initial_report", "claude", response, &RunningContext::new());
//! evaluator.record(record.without_revision())?;
//! println!("{:?}", evaluator.trends());
//! ```

pub mod evaluator;
pub mod feedback;
pub mod response;
pub mod scenario;
pub mod scoring;
pub mod store;
pub mod summary;
pub mod trends;
pub mod types;

// Re-export main types at crate root
pub use evaluator::Evaluator;
pub use feedback::{FeedbackSynthesizer, Threshold, ThresholdTable};
pub use response::{ResponseSection, StructuredResponse};
pub use scenario::{Scenario, ScenarioError};
pub use scoring::{
    LexiconClassifier, MetricScorer, Scorer, ScoringConfig, ScoringConfigError, TextClassifier,
};
pub use store::{feedback_file_name, FeedbackStore, StoreError};
pub use summary::{BackendSummary, RunSummary, SummaryBuilder};
pub use trends::{FeedbackTrends, MetricTrend, TrendAnalyzer};
pub use types::{
    ContextUpdate, ContextValue, EnhancedMetrics, FeedbackData, MetricKind, RevisionStatus,
    RunningContext, SimulationEvent,
};

use std::path::Path;
use thiserror::Error;

/// Errors that can occur while setting up or running an evaluation
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Scoring configuration error: {0}")]
    ScoringConfig(#[from] ScoringConfigError),

    #[error("Feedback store error: {0}")]
    Store(#[from] StoreError),
}

/// Build the scorer and synthesizer, applying optional YAML overrides.
///
/// # Arguments
///
/// * `scoring` - Path to a [`ScoringConfig`] file; defaults when `None`
/// * `thresholds` - Path to a [`ThresholdTable`] file; defaults when `None`
pub fn load_engine(
    scoring: Option<&Path>,
    thresholds: Option<&Path>,
) -> Result<(MetricScorer, FeedbackSynthesizer), EvaluationError> {
    let scoring = match scoring {
        Some(path) => ScoringConfig::from_yaml_file(path)?,
        None => ScoringConfig::default(),
    };
    let thresholds = match thresholds {
        Some(path) => ThresholdTable::from_yaml_file(path)?,
        None => ThresholdTable::default(),
    };
    Ok((
        MetricScorer::new(&scoring),
        FeedbackSynthesizer::new(thresholds),
    ))
}
