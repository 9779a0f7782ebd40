//! The evaluator owns one scenario's feedback history.
//!
//! It scores responses, synthesizes feedback, and appends completed records
//! to the durable log and the in-memory history, in that order. The history
//! is only ever appended to.

use chrono::Utc;
use std::path::Path;

use crate::feedback::FeedbackSynthesizer;
use crate::scoring::MetricScorer;
use crate::store::{FeedbackStore, StoreError};
use crate::trends::{FeedbackTrends, TrendAnalyzer};
use crate::types::{FeedbackData, RevisionStatus, RunningContext};

/// Per-scenario evaluation state.
pub struct Evaluator<'a> {
    scenario_id: String,
    scorer: &'a MetricScorer,
    synthesizer: &'a FeedbackSynthesizer,
    store: FeedbackStore,
    history: Vec<FeedbackData>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        scenario_id: impl Into<String>,
        scorer: &'a MetricScorer,
        synthesizer: &'a FeedbackSynthesizer,
        store: FeedbackStore,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            scorer,
            synthesizer,
            store,
            history: Vec::new(),
        }
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    /// Score a response and build its feedback. The returned record is
    /// pending revision and has not been stored.
    pub fn evaluate(
        &self,
        event_id: &str,
        backend: &str,
        response: &str,
        context: &RunningContext,
    ) -> FeedbackData {
        let metrics = self.scorer.score(response, context);
        let (improvement_areas, feedback_prompt) = self.synthesizer.synthesize(&metrics, response);

        FeedbackData {
            scenario_id: self.scenario_id.clone(),
            event_id: event_id.to_string(),
            backend: backend.to_string(),
            original_response: response.to_string(),
            metrics,
            improvement_areas,
            feedback_prompt,
            revised_response: None,
            revision: RevisionStatus::Pending,
            timestamp: Utc::now(),
        }
    }

    /// Persist a completed record, then add it to the history.
    ///
    /// Records still pending revision are refused. On any store failure the
    /// history is left unchanged.
    pub fn record(&mut self, record: FeedbackData) -> Result<(), StoreError> {
        self.store.append(&record)?;
        self.history.push(record);
        Ok(())
    }

    pub fn history(&self) -> &[FeedbackData] {
        &self.history
    }

    /// Trends over this run's history.
    pub fn trends(&self) -> FeedbackTrends {
        TrendAnalyzer::new().analyze(&self.history)
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }
}
