//! Scoring configuration from YAML.
//!
//! Every dimension names its strategy and the vocabulary/weights it uses.
//! A config file only needs to list the dimensions it overrides; the rest
//! keep their defaults.
//!
//! ```yaml
//! dimensions:
//!   safety_consideration:
//!     strategy:
//!       kind: lexical
//!       vocabulary: ["evacuate", "shelter in place", "protective equipment"]
//!   decisiveness:
//!     section: decision
//!     strategy:
//!       kind: lexical
//!       vocabulary: ["immediately", "we will", "deploy"]
//!       indicator_weight: 0.8
//!       structure_weight: 0.2
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::response::ResponseSection;
use crate::types::MetricKind;

/// Errors from loading scoring or threshold configuration.
#[derive(Error, Debug)]
pub enum ScoringConfigError {
    #[error("Failed to read scoring config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Empty vocabulary for dimension '{0}'")]
    EmptyVocabulary(MetricKind),

    #[error("Invalid weight for dimension '{dimension}': {reason}")]
    InvalidWeight {
        dimension: MetricKind,
        reason: String,
    },
}

/// Lexical-indicator strategy parameters.
///
/// score = indicator_weight * (distinct vocabulary hits / vocabulary size)
///       + structure_weight * min(avg words per sentence / target_sentence_words, 1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalConfig {
    /// Terms matched case-insensitively as substrings, counted once each
    pub vocabulary: Vec<String>,

    #[serde(default = "default_indicator_weight")]
    pub indicator_weight: f64,

    #[serde(default = "default_structure_weight")]
    pub structure_weight: f64,

    #[serde(default = "default_target_sentence_words")]
    pub target_sentence_words: f64,
}

impl LexicalConfig {
    pub fn with_vocabulary(terms: &[&str]) -> Self {
        Self {
            vocabulary: terms.iter().map(|t| t.to_string()).collect(),
            indicator_weight: default_indicator_weight(),
            structure_weight: default_structure_weight(),
            target_sentence_words: default_target_sentence_words(),
        }
    }
}

fn default_indicator_weight() -> f64 {
    0.6
}

fn default_structure_weight() -> f64 {
    0.4
}

fn default_target_sentence_words() -> f64 {
    20.0
}

/// Context-grounding strategy parameters.
///
/// score = reference_weight * reference + application_weight * application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingConfig {
    /// Analytical connectives that mark a context mention as applied
    pub connectives: Vec<String>,

    /// Characters inspected on each side of a context mention
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,

    #[serde(default = "default_reference_weight")]
    pub reference_weight: f64,

    #[serde(default = "default_application_weight")]
    pub application_weight: f64,
}

fn default_window_chars() -> usize {
    50
}

fn default_reference_weight() -> f64 {
    0.4
}

fn default_application_weight() -> f64 {
    0.6
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            connectives: [
                "because",
                "therefore",
                "based on",
                "considering",
                "given",
                "implies",
                "suggests",
                "indicates",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            window_chars: default_window_chars(),
            reference_weight: default_reference_weight(),
            application_weight: default_application_weight(),
        }
    }
}

/// Classifier strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Input is truncated to this many whitespace-separated words
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

fn default_max_words() -> usize {
    512
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
        }
    }
}

/// Which scoring strategy a dimension uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Lexical(LexicalConfig),
    Grounding(GroundingConfig),
    Classifier(ClassifierConfig),
}

/// Configuration for one metric dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionConfig {
    /// Response section the strategy reads; full text when absent
    #[serde(default)]
    pub section: Option<ResponseSection>,

    pub strategy: StrategyConfig,
}

impl DimensionConfig {
    fn lexical(section: Option<ResponseSection>, terms: &[&str]) -> Self {
        Self {
            section,
            strategy: StrategyConfig::Lexical(LexicalConfig::with_vocabulary(terms)),
        }
    }
}

/// Discourse markers for analytical reasoning.
pub const REASONING_INDICATORS: [&str; 10] = [
    "because",
    "therefore",
    "however",
    "consequently",
    "analysis shows",
    "considering",
    "given that",
    "this implies",
    "as a result",
    "furthermore",
];

const SAFETY_INDICATORS: &[&str] = &[
    "safety",
    "evacuat",
    "protect",
    "hazard",
    "risk mitigation",
    "precaution",
    "protective equipment",
    "secure the",
    "prevent",
    "shelter",
];

const ETHICS_INDICATORS: &[&str] = &[
    "ethical",
    "fair",
    "equit",
    "dignity",
    "rights",
    "transparen",
    "vulnerable",
    "consent",
    "responsib",
    "moral",
];

const DECISIVENESS_INDICATORS: &[&str] = &[
    "immediately",
    "we will",
    "deploy",
    "prioritiz",
    "allocate",
    "dispatch",
    "i recommend",
    "must",
    "order",
    "commit",
];

const INNOVATION_INDICATORS: &[&str] = &[
    "alternative",
    "novel",
    "creative",
    "innovative",
    "repurpos",
    "improvis",
    "unconventional",
    "new approach",
    "adapt",
    "drone",
];

const RISK_INDICATORS: &[&str] = &[
    "risk",
    "likelihood",
    "probability",
    "worst case",
    "contingency",
    "mitigat",
    "uncertain",
    "trade-off",
    "vulnerab",
    "threat",
];

const STAKEHOLDER_INDICATORS: &[&str] = &[
    "resident",
    "famil",
    "patient",
    "responder",
    "volunteer",
    "communit",
    "authorit",
    "staff",
    "children",
    "elderly",
];

const LONG_TERM_INDICATORS: &[&str] = &[
    "long-term",
    "recovery",
    "sustainab",
    "rebuild",
    "future",
    "lessons learned",
    "weeks",
    "months",
    "resilien",
    "follow-up",
];

/// Per-dimension scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub dimensions: BTreeMap<MetricKind, DimensionConfig>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut dimensions = BTreeMap::new();
        dimensions.insert(
            MetricKind::ResponseQuality,
            DimensionConfig {
                section: None,
                strategy: StrategyConfig::Classifier(ClassifierConfig::default()),
            },
        );
        dimensions.insert(
            MetricKind::ReasoningDepth,
            DimensionConfig::lexical(Some(ResponseSection::Reasoning), &REASONING_INDICATORS),
        );
        dimensions.insert(
            MetricKind::ContextualUnderstanding,
            DimensionConfig {
                section: None,
                strategy: StrategyConfig::Grounding(GroundingConfig::default()),
            },
        );
        dimensions.insert(
            MetricKind::SafetyConsideration,
            DimensionConfig::lexical(None, SAFETY_INDICATORS),
        );
        dimensions.insert(
            MetricKind::EthicalAlignment,
            DimensionConfig::lexical(None, ETHICS_INDICATORS),
        );
        dimensions.insert(
            MetricKind::Decisiveness,
            DimensionConfig::lexical(Some(ResponseSection::Decision), DECISIVENESS_INDICATORS),
        );
        dimensions.insert(
            MetricKind::Innovation,
            DimensionConfig::lexical(None, INNOVATION_INDICATORS),
        );
        dimensions.insert(
            MetricKind::RiskAssessment,
            DimensionConfig::lexical(None, RISK_INDICATORS),
        );
        dimensions.insert(
            MetricKind::StakeholderConsideration,
            DimensionConfig::lexical(None, STAKEHOLDER_INDICATORS),
        );
        dimensions.insert(
            MetricKind::LongTermThinking,
            DimensionConfig::lexical(None, LONG_TERM_INDICATORS),
        );
        Self { dimensions }
    }
}

impl ScoringConfig {
    /// Parse a config from YAML; unlisted dimensions keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ScoringConfigError> {
        let overrides: ScoringConfig = serde_yaml::from_str(yaml)?;
        let mut config = Self::default();
        config.dimensions.extend(overrides.dimensions);
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ScoringConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Configuration for one dimension.
    ///
    /// Every dimension is present: defaults fill anything not overridden.
    pub fn dimension(&self, kind: MetricKind) -> Option<&DimensionConfig> {
        self.dimensions.get(&kind)
    }

    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        for (kind, dimension) in &self.dimensions {
            match &dimension.strategy {
                StrategyConfig::Lexical(lexical) => {
                    if lexical.vocabulary.iter().all(|t| t.trim().is_empty()) {
                        return Err(ScoringConfigError::EmptyVocabulary(*kind));
                    }
                    check_weight(*kind, "indicator_weight", lexical.indicator_weight)?;
                    check_weight(*kind, "structure_weight", lexical.structure_weight)?;
                    if !(lexical.target_sentence_words > 0.0) {
                        return Err(ScoringConfigError::InvalidWeight {
                            dimension: *kind,
                            reason: "target_sentence_words must be positive".to_string(),
                        });
                    }
                }
                StrategyConfig::Grounding(grounding) => {
                    if grounding.connectives.iter().all(|t| t.trim().is_empty()) {
                        return Err(ScoringConfigError::EmptyVocabulary(*kind));
                    }
                    check_weight(*kind, "reference_weight", grounding.reference_weight)?;
                    check_weight(*kind, "application_weight", grounding.application_weight)?;
                }
                StrategyConfig::Classifier(classifier) => {
                    if classifier.max_words == 0 {
                        return Err(ScoringConfigError::InvalidWeight {
                            dimension: *kind,
                            reason: "max_words must be at least 1".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_weight(dimension: MetricKind, name: &str, value: f64) -> Result<(), ScoringConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ScoringConfigError::InvalidWeight {
            dimension,
            reason: format!("{} must be a non-negative number, got {}", name, value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_covers_every_dimension() {
        let config = ScoringConfig::default();
        for kind in MetricKind::ALL {
            assert!(config.dimension(kind).is_some(), "missing {}", kind);
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_reasoning_vocabulary() {
        let config = ScoringConfig::default();
        let dimension = config.dimension(MetricKind::ReasoningDepth).unwrap();
        assert_eq!(dimension.section, Some(ResponseSection::Reasoning));
        match &dimension.strategy {
            StrategyConfig::Lexical(lexical) => {
                assert_eq!(lexical.vocabulary.len(), 10);
                assert_eq!(lexical.indicator_weight, 0.6);
                assert_eq!(lexical.structure_weight, 0.4);
                assert_eq!(lexical.target_sentence_words, 20.0);
            }
            other => panic!("Expected lexical strategy, got {:?}", other),
        }
    }

    #[test]
    fn test_yaml_override_keeps_other_defaults() {
        let yaml = r#"
dimensions:
  innovation:
    strategy:
      kind: lexical
      vocabulary: ["drone", "mesh network"]
      indicator_weight: 0.9
"#;
        let config = ScoringConfig::from_yaml(yaml).unwrap();
        match &config.dimension(MetricKind::Innovation).unwrap().strategy {
            StrategyConfig::Lexical(lexical) => {
                assert_eq!(lexical.vocabulary, vec!["drone", "mesh network"]);
                assert_eq!(lexical.indicator_weight, 0.9);
                assert_eq!(lexical.structure_weight, 0.4);
            }
            other => panic!("Expected lexical strategy, got {:?}", other),
        }
        assert_eq!(
            config.dimension(MetricKind::ReasoningDepth),
            ScoringConfig::default().dimension(MetricKind::ReasoningDepth)
        );
    }

    #[test]
    fn test_dimension_can_switch_strategy() {
        let yaml = r#"
dimensions:
  risk_assessment:
    strategy:
      kind: grounding
      connectives: ["risk of", "could lead to"]
"#;
        let config = ScoringConfig::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.dimension(MetricKind::RiskAssessment).unwrap().strategy,
            StrategyConfig::Grounding(_)
        ));
    }

    #[test]
    fn test_empty_vocabulary_rejected() {
        let yaml = r#"
dimensions:
  decisiveness:
    strategy:
      kind: lexical
      vocabulary: []
"#;
        let result = ScoringConfig::from_yaml(yaml);
        assert!(matches!(
            result,
            Err(ScoringConfigError::EmptyVocabulary(MetricKind::Decisiveness))
        ));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let yaml = r#"
dimensions:
  contextual_understanding:
    strategy:
      kind: grounding
      connectives: ["because"]
      reference_weight: -0.5
"#;
        let result = ScoringConfig::from_yaml(yaml);
        assert!(matches!(result, Err(ScoringConfigError::InvalidWeight { .. })));
    }
}
