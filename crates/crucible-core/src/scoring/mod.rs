//! Metric scoring.
//!
//! Each of the ten dimensions is computed by its own [`Scorer`], built from
//! [`ScoringConfig`]. Scorers are pure: the same response and context always
//! produce the same score, and nothing is carried between calls.

pub mod classifier;
pub mod config;
pub mod grounding;
pub mod lexical;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::response::{ResponseSection, StructuredResponse};
use crate::types::{EnhancedMetrics, MetricKind, RunningContext};

pub use classifier::{softmax, ClassifierScorer, LexiconClassifier, TextClassifier};
pub use config::{
    ClassifierConfig, DimensionConfig, GroundingConfig, LexicalConfig, ScoringConfig,
    ScoringConfigError, StrategyConfig,
};
pub use grounding::ContextGroundingScorer;
pub use lexical::LexicalIndicatorScorer;

/// A single-dimension scoring strategy.
pub trait Scorer: Send + Sync {
    /// Strategy name, as used in configuration.
    fn strategy(&self) -> &'static str;

    /// Score `text` against the running context. Implementations return a
    /// value in [0, 1] and never panic on empty input.
    fn score(&self, text: &str, context: &RunningContext) -> f64;
}

struct Dimension {
    section: Option<ResponseSection>,
    scorer: Box<dyn Scorer>,
}

/// Computes the full ten-dimension metric vector for a response.
pub struct MetricScorer {
    dimensions: BTreeMap<MetricKind, Dimension>,
}

impl MetricScorer {
    /// Build scorers from configuration with the built-in classifier.
    pub fn new(config: &ScoringConfig) -> Self {
        Self::with_classifier(config, Arc::new(LexiconClassifier::default()))
    }

    /// Build scorers from configuration, routing classifier dimensions
    /// through `classifier`.
    pub fn with_classifier(config: &ScoringConfig, classifier: Arc<dyn TextClassifier>) -> Self {
        let defaults = ScoringConfig::default();
        let dimensions = MetricKind::ALL
            .iter()
            .filter_map(|kind| {
                let dimension = config
                    .dimension(*kind)
                    .or_else(|| defaults.dimension(*kind))?;
                let scorer: Box<dyn Scorer> = match &dimension.strategy {
                    StrategyConfig::Lexical(lexical) => {
                        Box::new(LexicalIndicatorScorer::new(lexical))
                    }
                    StrategyConfig::Grounding(grounding) => {
                        Box::new(ContextGroundingScorer::new(grounding))
                    }
                    StrategyConfig::Classifier(settings) => {
                        Box::new(ClassifierScorer::new(classifier.clone(), settings))
                    }
                };
                Some((
                    *kind,
                    Dimension {
                        section: dimension.section,
                        scorer,
                    },
                ))
            })
            .collect();

        Self { dimensions }
    }

    /// Strategy name in use for a dimension.
    pub fn strategy_for(&self, kind: MetricKind) -> Option<&'static str> {
        self.dimensions.get(&kind).map(|d| d.scorer.strategy())
    }

    /// Score a raw response against the context as it stood before the
    /// originating event's own update.
    ///
    /// Blank responses score 0.0 on every dimension.
    pub fn score(&self, response: &str, context: &RunningContext) -> EnhancedMetrics {
        let parsed = StructuredResponse::parse(response);
        if parsed.is_blank() {
            warn!("Empty response text, assigning minimum scores");
            return EnhancedMetrics::zero();
        }

        EnhancedMetrics::from_fn(|kind| match self.dimensions.get(&kind) {
            Some(dimension) => {
                let text = parsed.text_for(dimension.section);
                clamp_unit(dimension.scorer.score(&text, context))
            }
            None => 0.0,
        })
    }
}

impl Default for MetricScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
