//! Core types for Crucible evaluations.
//!
//! These types flow through the whole pipeline: scenario events feed the
//! running context, responses are scored into [`EnhancedMetrics`], and every
//! evaluation ends up as one [`FeedbackData`] record in the feedback log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A scalar value carried in a scenario context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ContextValue {
    /// String form used for keyword extraction and matching.
    pub fn render(&self) -> String {
        match self {
            ContextValue::Bool(b) => b.to_string(),
            ContextValue::Integer(i) => i.to_string(),
            ContextValue::Float(f) => f.to_string(),
            ContextValue::Text(s) => s.clone(),
        }
    }

    /// Borrow the text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContextValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Integer(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Float(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

/// A context delta attached to a scenario event.
pub type ContextUpdate = BTreeMap<String, ContextValue>;

/// Cumulative scenario facts, updated as events are processed.
///
/// Later updates overwrite earlier keys with the same name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunningContext {
    values: BTreeMap<String, ContextValue>,
}

impl RunningContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an event's context update into this context.
    pub fn merge(&mut self, update: &ContextUpdate) {
        for (key, value) in update {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.values.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &ContextValue> {
        self.values.values()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<ContextValue>> FromIterator<(K, V)> for RunningContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One scripted stimulus in a scenario timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// Creation time, set once
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Free-form tag (e.g., "initial_report", "aftershock")
    pub event_type: String,

    /// Prompt seed text
    pub description: String,

    /// Urgency from 1 (lowest) to 5 (highest)
    pub severity_level: u8,

    /// Whether the event demands a decision response
    pub required_action: bool,

    /// Facts merged into the running context after the event is handled
    #[serde(default)]
    pub context_update: ContextUpdate,
}

/// The ten quality dimensions, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    ResponseQuality,
    ReasoningDepth,
    ContextualUnderstanding,
    SafetyConsideration,
    EthicalAlignment,
    Decisiveness,
    Innovation,
    RiskAssessment,
    StakeholderConsideration,
    LongTermThinking,
}

impl MetricKind {
    /// Every dimension in evaluation order.
    pub const ALL: [MetricKind; 10] = [
        MetricKind::ResponseQuality,
        MetricKind::ReasoningDepth,
        MetricKind::ContextualUnderstanding,
        MetricKind::SafetyConsideration,
        MetricKind::EthicalAlignment,
        MetricKind::Decisiveness,
        MetricKind::Innovation,
        MetricKind::RiskAssessment,
        MetricKind::StakeholderConsideration,
        MetricKind::LongTermThinking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::ResponseQuality => "response_quality",
            MetricKind::ReasoningDepth => "reasoning_depth",
            MetricKind::ContextualUnderstanding => "contextual_understanding",
            MetricKind::SafetyConsideration => "safety_consideration",
            MetricKind::EthicalAlignment => "ethical_alignment",
            MetricKind::Decisiveness => "decisiveness",
            MetricKind::Innovation => "innovation",
            MetricKind::RiskAssessment => "risk_assessment",
            MetricKind::StakeholderConsideration => "stakeholder_consideration",
            MetricKind::LongTermThinking => "long_term_thinking",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown metric dimension: '{}'", s))
    }
}

/// Ten independent quality scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhancedMetrics {
    pub response_quality: f64,
    pub reasoning_depth: f64,
    pub contextual_understanding: f64,
    pub safety_consideration: f64,
    pub ethical_alignment: f64,
    pub decisiveness: f64,
    pub innovation: f64,
    pub risk_assessment: f64,
    pub stakeholder_consideration: f64,
    pub long_term_thinking: f64,
}

impl EnhancedMetrics {
    /// Build a metric vector by computing each dimension independently.
    pub fn from_fn(mut score: impl FnMut(MetricKind) -> f64) -> Self {
        Self {
            response_quality: score(MetricKind::ResponseQuality),
            reasoning_depth: score(MetricKind::ReasoningDepth),
            contextual_understanding: score(MetricKind::ContextualUnderstanding),
            safety_consideration: score(MetricKind::SafetyConsideration),
            ethical_alignment: score(MetricKind::EthicalAlignment),
            decisiveness: score(MetricKind::Decisiveness),
            innovation: score(MetricKind::Innovation),
            risk_assessment: score(MetricKind::RiskAssessment),
            stakeholder_consideration: score(MetricKind::StakeholderConsideration),
            long_term_thinking: score(MetricKind::LongTermThinking),
        }
    }

    /// Every dimension set to the same value.
    pub fn uniform(value: f64) -> Self {
        Self::from_fn(|_| value)
    }

    /// The minimum score on every dimension.
    pub fn zero() -> Self {
        Self::uniform(0.0)
    }

    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::ResponseQuality => self.response_quality,
            MetricKind::ReasoningDepth => self.reasoning_depth,
            MetricKind::ContextualUnderstanding => self.contextual_understanding,
            MetricKind::SafetyConsideration => self.safety_consideration,
            MetricKind::EthicalAlignment => self.ethical_alignment,
            MetricKind::Decisiveness => self.decisiveness,
            MetricKind::Innovation => self.innovation,
            MetricKind::RiskAssessment => self.risk_assessment,
            MetricKind::StakeholderConsideration => self.stakeholder_consideration,
            MetricKind::LongTermThinking => self.long_term_thinking,
        }
    }

    /// Iterate `(dimension, score)` pairs in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        MetricKind::ALL.iter().map(move |kind| (*kind, self.get(*kind)))
    }
}

/// Where an evaluation record sits in the revision cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RevisionStatus {
    /// Feedback built, revision not yet attempted
    #[default]
    Pending,

    /// No dimension fell below its threshold
    NotNeeded,

    /// The backend returned a revised response
    Revised,

    /// Resubmission failed; the original response stands in as the revision
    Failed { reason: String },
}

impl RevisionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RevisionStatus::Pending)
    }
}

/// One full evaluation record.
///
/// Built by the evaluator, completed once by the revision cycle, then
/// appended to the feedback log and never touched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackData {
    pub scenario_id: String,
    pub event_id: String,

    /// Backend that produced `original_response`
    #[serde(default)]
    pub backend: String,

    pub original_response: String,
    pub metrics: EnhancedMetrics,

    /// Deficient dimensions, in evaluation order, without duplicates
    pub improvement_areas: Vec<MetricKind>,

    #[serde(default)]
    pub feedback_prompt: String,

    pub revised_response: Option<String>,

    #[serde(default)]
    pub revision: RevisionStatus,

    pub timestamp: DateTime<Utc>,
}

impl FeedbackData {
    /// Whether a revision cycle is warranted for this record.
    pub fn needs_revision(&self) -> bool {
        !self.improvement_areas.is_empty()
    }

    /// Close the cycle without resubmitting.
    pub fn without_revision(mut self) -> Self {
        self.revision = RevisionStatus::NotNeeded;
        self
    }

    /// Attach the revised response returned by the backend.
    pub fn with_revision(mut self, revised: impl Into<String>) -> Self {
        self.revised_response = Some(revised.into());
        self.revision = RevisionStatus::Revised;
        self
    }

    /// Record a failed resubmission; the original response stands in.
    pub fn with_failed_revision(mut self, reason: impl Into<String>) -> Self {
        self.revised_response = Some(self.original_response.clone());
        self.revision = RevisionStatus::Failed {
            reason: reason.into(),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_merge_overwrites() {
        let mut context = RunningContext::new();
        let mut first = ContextUpdate::new();
        first.insert("casualties".to_string(), "unknown".into());
        first.insert("resources".to_string(), "limited".into());
        context.merge(&first);

        let mut second = ContextUpdate::new();
        second.insert("casualties".to_string(), "100+".into());
        second.insert("hospitals_damaged".to_string(), 3i64.into());
        context.merge(&second);

        assert_eq!(context.len(), 3);
        assert_eq!(context.get("casualties"), Some(&ContextValue::from("100+")));
        assert_eq!(context.get("hospitals_damaged"), Some(&ContextValue::Integer(3)));
    }

    #[test]
    fn test_context_value_untagged_parsing() {
        let update: ContextUpdate = serde_json::from_str(
            r#"{"flag": true, "count": 5, "ratio": 0.5, "status": "severe"}"#,
        )
        .unwrap();

        assert_eq!(update["flag"], ContextValue::Bool(true));
        assert_eq!(update["count"], ContextValue::Integer(5));
        assert_eq!(update["ratio"], ContextValue::Float(0.5));
        assert_eq!(update["status"].as_text(), Some("severe"));
    }

    #[test]
    fn test_metric_kind_names_roundtrip() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.as_str().parse::<MetricKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("safety".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_metrics_serialize_with_named_fields() {
        let metrics = EnhancedMetrics::uniform(0.5);
        let value = serde_json::to_value(metrics).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 10);
        for kind in MetricKind::ALL {
            assert_eq!(object[kind.as_str()], 0.5);
        }
    }

    #[test]
    fn test_failed_revision_falls_back_to_original() {
        let record = FeedbackData {
            scenario_id: "earthquake_response".to_string(),
            event_id: "01_initial_report".to_string(),
            backend: "claude".to_string(),
            original_response: "DECISION: evacuate".to_string(),
            metrics: EnhancedMetrics::zero(),
            improvement_areas: vec![MetricKind::ResponseQuality],
            feedback_prompt: "revise".to_string(),
            revised_response: None,
            revision: RevisionStatus::Pending,
            timestamp: Utc::now(),
        };

        let record = record.with_failed_revision("timeout");
        assert_eq!(record.revised_response.as_deref(), Some("DECISION: evacuate"));
        assert!(record.revision.is_terminal());
    }
}
