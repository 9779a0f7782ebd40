//! Run-level summary statistics.
//!
//! Collected while a scenario runs and serialized for reporting consumers.
//! Averages are `None` when nothing was measured.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{FeedbackData, RevisionStatus};

/// Aggregates for one backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSummary {
    /// Calls that returned text
    pub responses: usize,

    /// Calls that failed, timed out, or were refused by the circuit breaker
    pub dispatch_failures: usize,

    /// Records stored for this backend
    pub records: usize,

    pub revisions_attempted: usize,
    pub revisions_succeeded: usize,
    pub revisions_failed: usize,

    pub avg_response_time_secs: Option<f64>,
    pub avg_safety: Option<f64>,
    pub avg_ethics: Option<f64>,
}

/// Aggregates for a whole scenario run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub events_total: usize,

    /// Events that were dispatched and scored
    pub events_evaluated: usize,

    /// Events that only updated the context
    pub events_context_only: usize,

    pub records: usize,
    pub dispatch_failures: usize,

    pub avg_response_time_secs: Option<f64>,
    pub avg_safety: Option<f64>,
    pub avg_ethics: Option<f64>,

    pub backends: BTreeMap<String, BackendSummary>,
}

#[derive(Debug, Default)]
struct Accumulator {
    responses: usize,
    failures: usize,
    latency_secs: Vec<f64>,
    safety: Vec<f64>,
    ethics: Vec<f64>,
    revisions_attempted: usize,
    revisions_succeeded: usize,
    revisions_failed: usize,
}

impl Accumulator {
    fn record(&mut self, record: &FeedbackData) {
        self.safety.push(record.metrics.safety_consideration);
        self.ethics.push(record.metrics.ethical_alignment);
        match &record.revision {
            RevisionStatus::Revised => {
                self.revisions_attempted += 1;
                self.revisions_succeeded += 1;
            }
            RevisionStatus::Failed { .. } => {
                self.revisions_attempted += 1;
                self.revisions_failed += 1;
            }
            RevisionStatus::NotNeeded | RevisionStatus::Pending => {}
        }
    }

    fn summary(&self) -> BackendSummary {
        BackendSummary {
            responses: self.responses,
            dispatch_failures: self.failures,
            records: self.safety.len(),
            revisions_attempted: self.revisions_attempted,
            revisions_succeeded: self.revisions_succeeded,
            revisions_failed: self.revisions_failed,
            avg_response_time_secs: mean(&self.latency_secs),
            avg_safety: mean(&self.safety),
            avg_ethics: mean(&self.ethics),
        }
    }
}

/// Incrementally builds a [`RunSummary`].
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    events_total: usize,
    events_evaluated: usize,
    events_context_only: usize,
    overall: Accumulator,
    backends: BTreeMap<String, Accumulator>,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An event that was dispatched to backends.
    pub fn record_evaluated_event(&mut self) {
        self.events_total += 1;
        self.events_evaluated += 1;
    }

    /// An event that only merged context.
    pub fn record_context_only_event(&mut self) {
        self.events_total += 1;
        self.events_context_only += 1;
    }

    /// A backend call that returned text after `latency`.
    pub fn record_response(&mut self, backend: &str, latency: Duration) {
        let secs = latency.as_secs_f64();
        self.overall.responses += 1;
        self.overall.latency_secs.push(secs);
        let entry = self.backend(backend);
        entry.responses += 1;
        entry.latency_secs.push(secs);
    }

    /// A backend call that produced no text.
    pub fn record_dispatch_failure(&mut self, backend: &str) {
        self.overall.failures += 1;
        self.backend(backend).failures += 1;
    }

    /// A stored evaluation record.
    pub fn record_evaluation(&mut self, record: &FeedbackData) {
        self.overall.record(record);
        self.backend(&record.backend).record(record);
    }

    fn backend(&mut self, name: &str) -> &mut Accumulator {
        self.backends.entry(name.to_string()).or_default()
    }

    pub fn build(&self) -> RunSummary {
        let overall = self.overall.summary();
        RunSummary {
            events_total: self.events_total,
            events_evaluated: self.events_evaluated,
            events_context_only: self.events_context_only,
            records: overall.records,
            dispatch_failures: overall.dispatch_failures,
            avg_response_time_secs: overall.avg_response_time_secs,
            avg_safety: overall.avg_safety,
            avg_ethics: overall.avg_ethics,
            backends: self
                .backends
                .iter()
                .map(|(name, acc)| (name.clone(), acc.summary()))
                .collect(),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnhancedMetrics, MetricKind};
    use chrono::Utc;

    fn record(backend: &str, safety: f64, revision: RevisionStatus) -> FeedbackData {
        let mut metrics = EnhancedMetrics::uniform(0.5);
        metrics.safety_consideration = safety;
        metrics.ethical_alignment = safety / 2.0;
        FeedbackData {
            scenario_id: "s".to_string(),
            event_id: "01_e".to_string(),
            backend: backend.to_string(),
            original_response: "r".to_string(),
            metrics,
            improvement_areas: vec![MetricKind::SafetyConsideration],
            feedback_prompt: String::new(),
            revised_response: None,
            revision,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_summary_has_no_averages() {
        let summary = SummaryBuilder::new().build();
        assert_eq!(summary.records, 0);
        assert_eq!(summary.avg_response_time_secs, None);
        assert_eq!(summary.avg_safety, None);
        assert!(summary.backends.is_empty());
    }

    #[test]
    fn test_overall_and_per_backend_averages() {
        let mut builder = SummaryBuilder::new();
        builder.record_evaluated_event();
        builder.record_context_only_event();
        builder.record_response("claude", Duration::from_millis(1000));
        builder.record_response("gpt4", Duration::from_millis(3000));
        builder.record_dispatch_failure("gemini");
        builder.record_evaluation(&record("claude", 0.8, RevisionStatus::Revised));
        builder.record_evaluation(&record(
            "gpt4",
            0.4,
            RevisionStatus::Failed {
                reason: "timeout".to_string(),
            },
        ));

        let summary = builder.build();
        assert_eq!(summary.events_total, 2);
        assert_eq!(summary.events_context_only, 1);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.dispatch_failures, 1);
        assert_eq!(summary.avg_response_time_secs, Some(2.0));
        assert!((summary.avg_safety.unwrap() - 0.6).abs() < 1e-12);
        assert!((summary.avg_ethics.unwrap() - 0.3).abs() < 1e-12);

        let gpt4 = &summary.backends["gpt4"];
        assert_eq!(gpt4.revisions_attempted, 1);
        assert_eq!(gpt4.revisions_failed, 1);
        assert_eq!(summary.backends["claude"].revisions_succeeded, 1);
        assert_eq!(summary.backends["gemini"].dispatch_failures, 1);
        assert_eq!(summary.backends["gemini"].avg_safety, None);
    }
}
