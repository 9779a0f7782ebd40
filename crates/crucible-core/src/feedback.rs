//! Feedback synthesis: deficient dimensions and the revision prompt.
//!
//! Thresholds are strict lower bounds. A dimension scoring below its
//! threshold is an improvement area and contributes one instruction bullet
//! to the revision prompt.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::response::ResponseSection;
use crate::scoring::ScoringConfigError;
use crate::types::{EnhancedMetrics, MetricKind};

/// Deficiency threshold and the instruction emitted when it is not met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub threshold: f64,
    pub instruction: String,
}

impl Threshold {
    fn new(threshold: f64, instruction: &str) -> Self {
        Self {
            threshold,
            instruction: instruction.to_string(),
        }
    }
}

/// Per-dimension thresholds.
///
/// Defaults:
///
/// | dimension | threshold |
/// |---|---|
/// | response_quality | 0.7 |
/// | reasoning_depth | 0.6 |
/// | contextual_understanding | 0.3 |
/// | safety_consideration | 0.8 |
/// | ethical_alignment | 0.5 |
/// | decisiveness | 0.5 |
/// | innovation | 0.3 |
/// | risk_assessment | 0.5 |
/// | stakeholder_consideration | 0.4 |
/// | long_term_thinking | 0.4 |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdTable {
    entries: BTreeMap<MetricKind, Threshold>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        let entries = [
            (
                MetricKind::ResponseQuality,
                Threshold::new(0.7, "Focus on providing clearer and more coherent responses"),
            ),
            (
                MetricKind::ReasoningDepth,
                Threshold::new(
                    0.6,
                    "Deepen analytical thinking and explain reasoning more thoroughly",
                ),
            ),
            (
                MetricKind::ContextualUnderstanding,
                Threshold::new(
                    0.3,
                    "Ground the response in the known facts of the situation and explain how they shape the decision",
                ),
            ),
            (
                MetricKind::SafetyConsideration,
                Threshold::new(
                    0.8,
                    "Increase emphasis on safety considerations and risk mitigation",
                ),
            ),
            (
                MetricKind::EthicalAlignment,
                Threshold::new(
                    0.5,
                    "Address the ethical implications and fairness of the chosen course of action",
                ),
            ),
            (
                MetricKind::Decisiveness,
                Threshold::new(0.5, "State a clear, actionable decision without hedging"),
            ),
            (
                MetricKind::Innovation,
                Threshold::new(
                    0.3,
                    "Consider alternative or creative approaches beyond the obvious option",
                ),
            ),
            (
                MetricKind::RiskAssessment,
                Threshold::new(
                    0.5,
                    "Identify the main risks, their likelihood, and contingency plans",
                ),
            ),
            (
                MetricKind::StakeholderConsideration,
                Threshold::new(
                    0.4,
                    "Account for the needs of all affected groups, including responders and vulnerable people",
                ),
            ),
            (
                MetricKind::LongTermThinking,
                Threshold::new(
                    0.4,
                    "Describe the long-term impact and recovery considerations of the decision",
                ),
            ),
        ]
        .into_iter()
        .collect();

        Self { entries }
    }
}

impl ThresholdTable {
    /// Parse a table from YAML; unlisted dimensions keep their defaults.
    ///
    /// ```yaml
    /// safety_consideration:
    ///   threshold: 0.9
    ///   instruction: "Name the protective measures for every crew you deploy"
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, ScoringConfigError> {
        let overrides: BTreeMap<MetricKind, Threshold> = serde_yaml::from_str(yaml)?;
        let mut table = Self::default();
        for (kind, threshold) in overrides {
            if !(0.0..=1.0).contains(&threshold.threshold) {
                return Err(ScoringConfigError::InvalidWeight {
                    dimension: kind,
                    reason: format!("threshold must be in [0, 1], got {}", threshold.threshold),
                });
            }
            table.entries.insert(kind, threshold);
        }
        Ok(table)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ScoringConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn get(&self, kind: MetricKind) -> Option<&Threshold> {
        self.entries.get(&kind)
    }

    pub fn set(&mut self, kind: MetricKind, threshold: Threshold) {
        self.entries.insert(kind, threshold);
    }
}

/// Selects deficient dimensions and builds the revision prompt.
#[derive(Debug, Clone, Default)]
pub struct FeedbackSynthesizer {
    thresholds: ThresholdTable,
}

impl FeedbackSynthesizer {
    pub fn new(thresholds: ThresholdTable) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Dimensions below threshold, in evaluation order.
    pub fn improvement_areas(&self, metrics: &EnhancedMetrics) -> Vec<MetricKind> {
        metrics
            .iter()
            .filter(|(kind, value)| {
                self.thresholds
                    .get(*kind)
                    .map(|t| *value < t.threshold)
                    .unwrap_or(false)
            })
            .map(|(kind, _)| kind)
            .collect()
    }

    /// Improvement areas and the revision prompt for a scored response.
    ///
    /// The prompt is well-formed even when no area is deficient.
    pub fn synthesize(&self, metrics: &EnhancedMetrics, response: &str) -> (Vec<MetricKind>, String) {
        let areas = self.improvement_areas(metrics);
        let components: Vec<&str> = areas
            .iter()
            .filter_map(|kind| self.thresholds.get(*kind))
            .map(|t| t.instruction.as_str())
            .collect();

        (areas, build_prompt(response, &components))
    }
}

fn build_prompt(response: &str, components: &[&str]) -> String {
    let bullets = if components.is_empty() {
        "- No specific deficiencies identified; refine clarity where possible".to_string()
    } else {
        components
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let structure = ResponseSection::ALL
        .iter()
        .map(|s| s.header())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Given this original response:\n{response}\n\n\
         Please revise the response considering these aspects:\n{bullets}\n\n\
         The revised response should:\n\
         1. Maintain the same basic structure ({structure})\n\
         2. Address the identified improvement areas\n\
         3. Preserve any strong elements from the original response\n\n\
         Revised response:"
    )
}
