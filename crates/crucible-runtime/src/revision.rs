//! The single feedback-and-resubmit cycle for one evaluation record.
//!
//! ```text
//! Scored ──(no areas)──────────────────────────────> done (not_needed)
//!    └─> FeedbackPending ─> Revising ─┬─> Revised
//!                                     └─> RevisionFailed (original stands in)
//! ```
//!
//! A record goes through the cycle at most once; revised text is never
//! re-scored.

use crucible_core::FeedbackData;

use crate::dispatcher::{BackendOutcome, Dispatcher};

/// States of the revision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionState {
    Scored,
    FeedbackPending,
    Revising,
    Revised,
    RevisionFailed,
}

impl RevisionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RevisionState::Revised | RevisionState::RevisionFailed)
    }
}

/// Drives records through the revision cycle against the dispatcher's
/// backends.
pub struct RevisionLoop<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> RevisionLoop<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Complete `record` and report the state the cycle ended in.
    ///
    /// The feedback prompt goes back to the backend that wrote the original
    /// response. Never fails: a backend failure yields a record whose revised
    /// response is the original. A record without improvement areas ends in
    /// [`RevisionState::Scored`] with no submission.
    pub async fn revise(&self, record: FeedbackData) -> (RevisionState, FeedbackData) {
        if !record.needs_revision() {
            tracing::debug!(
                event_id = %record.event_id,
                backend = %record.backend,
                state = ?RevisionState::Scored,
                "No improvement areas, skipping revision"
            );
            return (RevisionState::Scored, record.without_revision());
        }

        tracing::debug!(
            event_id = %record.event_id,
            backend = %record.backend,
            areas = record.improvement_areas.len(),
            state = ?RevisionState::FeedbackPending,
            "Feedback built"
        );

        tracing::debug!(
            event_id = %record.event_id,
            backend = %record.backend,
            state = ?RevisionState::Revising,
            "Resubmitting"
        );
        let outcome = self
            .dispatcher
            .submit_one(&record.backend, &record.feedback_prompt)
            .await;

        match outcome {
            BackendOutcome::Completed { text, .. } if !text.trim().is_empty() => {
                tracing::debug!(
                    event_id = %record.event_id,
                    backend = %record.backend,
                    state = ?RevisionState::Revised,
                    "Response revised"
                );
                (RevisionState::Revised, record.with_revision(text))
            }
            BackendOutcome::Completed { .. } => {
                tracing::warn!(
                    event_id = %record.event_id,
                    backend = %record.backend,
                    state = ?RevisionState::RevisionFailed,
                    "Revision returned empty text, keeping original response"
                );
                (
                    RevisionState::RevisionFailed,
                    record.with_failed_revision("empty revision"),
                )
            }
            BackendOutcome::Failed { reason, .. } => {
                tracing::warn!(
                    event_id = %record.event_id,
                    backend = %record.backend,
                    error = %reason,
                    state = ?RevisionState::RevisionFailed,
                    "Revision failed, keeping original response"
                );
                (RevisionState::RevisionFailed, record.with_failed_revision(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        BackendSet, Completion, CompletionConfig, ModelBackend, ProviderError, StaticBackend,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use crucible_core::{EnhancedMetrics, MetricKind, RevisionStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingBackend {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ModelBackend for CountingBackend {
        async fn submit(
            &self,
            prompt: &str,
            _config: &CompletionConfig,
        ) -> Result<Completion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::HttpError("connection reset".to_string()))
            } else {
                Ok(Completion::text(format!("revised: {}", prompt.len())))
            }
        }
    }

    fn dispatcher(backend: Arc<CountingBackend>) -> Dispatcher {
        Dispatcher::new(
            BackendSet::new().with("claude", backend, CompletionConfig::default()),
            Duration::from_secs(5),
        )
    }

    fn record(areas: Vec<MetricKind>) -> FeedbackData {
        FeedbackData {
            scenario_id: "earthquake_response".to_string(),
            event_id: "01_initial_report".to_string(),
            backend: "claude".to_string(),
            original_response: "DECISION: wait".to_string(),
            metrics: EnhancedMetrics::uniform(0.2),
            improvement_areas: areas,
            feedback_prompt: "please revise".to_string(),
            revised_response: None,
            revision: RevisionStatus::Pending,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_no_areas_skips_submission() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let dispatcher = dispatcher(backend.clone());

        let (state, done) = RevisionLoop::new(&dispatcher).revise(record(vec![])).await;
        assert_eq!(state, RevisionState::Scored);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(done.revision, RevisionStatus::NotNeeded);
        assert!(done.revised_response.is_none());
    }

    #[tokio::test]
    async fn test_successful_revision() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let dispatcher = dispatcher(backend.clone());

        let (state, done) = RevisionLoop::new(&dispatcher)
            .revise(record(vec![MetricKind::SafetyConsideration]))
            .await;
        assert_eq!(state, RevisionState::Revised);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(done.revision, RevisionStatus::Revised);
        assert_eq!(done.revised_response.as_deref(), Some("revised: 13"));
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_original() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let dispatcher = dispatcher(backend.clone());

        let (state, done) = RevisionLoop::new(&dispatcher)
            .revise(record(vec![MetricKind::ResponseQuality]))
            .await;
        assert_eq!(state, RevisionState::RevisionFailed);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(done.revised_response.as_deref(), Some("DECISION: wait"));
        assert!(matches!(
            done.revision,
            RevisionStatus::Failed { ref reason } if reason.contains("connection reset")
        ));
    }

    #[tokio::test]
    async fn test_unknown_backend_is_a_failed_revision() {
        let dispatcher = Dispatcher::new(
            BackendSet::new().with("gpt4", Arc::new(StaticBackend::default()), CompletionConfig::default()),
            Duration::from_secs(5),
        );
        let (state, done) = RevisionLoop::new(&dispatcher)
            .revise(record(vec![MetricKind::Innovation]))
            .await;
        assert!(state.is_terminal());
        assert!(matches!(done.revision, RevisionStatus::Failed { .. }));
        assert_eq!(done.revised_response.as_deref(), Some(done.original_response.as_str()));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RevisionState::Revised.is_terminal());
        assert!(RevisionState::RevisionFailed.is_terminal());
        assert!(!RevisionState::Revising.is_terminal());
    }
}
