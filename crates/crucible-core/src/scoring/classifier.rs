//! Classifier-based scoring.
//!
//! A [`TextClassifier`] maps text to logits over classes; the score is the
//! softmax probability of the classifier's positive class. Any model can sit
//! behind the trait. [`LexiconClassifier`] is the built-in two-class model
//! used when nothing else is injected.

use std::sync::Arc;

use crate::types::RunningContext;

use super::config::ClassifierConfig;
use super::Scorer;

/// A text classifier producing unnormalized logits.
pub trait TextClassifier: Send + Sync {
    /// Logits over the classifier's classes.
    fn logits(&self, text: &str) -> Vec<f64>;

    /// Index of the class whose probability is used as the score.
    fn positive_class(&self) -> usize {
        1
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// Cue list for the lexicon classifier: `(term, weight)`.
pub type Cues = Vec<(String, f64)>;

/// Two-class cue-word classifier.
///
/// Class 0 is "weak response", class 1 is "strong response". Each cue adds
/// its weight per occurrence (capped at `max_hits_per_cue`) to its class logit.
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    positive: Cues,
    negative: Cues,
    bias: f64,
    max_hits_per_cue: usize,
}

impl LexiconClassifier {
    pub fn new(positive: Cues, negative: Cues, bias: f64) -> Self {
        Self {
            positive: lowercase_cues(positive),
            negative: lowercase_cues(negative),
            bias,
            max_hits_per_cue: 3,
        }
    }

    fn cue_sum(cues: &[(String, f64)], lower: &str, cap: usize) -> f64 {
        cues.iter()
            .map(|(term, weight)| lower.matches(term.as_str()).count().min(cap) as f64 * weight)
            .sum()
    }
}

fn lowercase_cues(cues: Cues) -> Cues {
    cues.into_iter()
        .map(|(t, w)| (t.trim().to_lowercase(), w))
        .filter(|(t, _)| !t.is_empty())
        .collect()
}

fn cues(pairs: &[(&str, f64)]) -> Cues {
    pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new(
            cues(&[
                ("prioritize", 0.6),
                ("coordinate", 0.5),
                ("ensure", 0.4),
                ("plan", 0.3),
                ("immediately", 0.4),
                ("because", 0.4),
                ("specifically", 0.4),
                ("first", 0.3),
                ("then", 0.2),
                ("protect", 0.4),
                ("support", 0.3),
                ("communicate", 0.4),
            ]),
            cues(&[
                ("i don't know", 1.2),
                ("i cannot", 1.0),
                ("unable to", 0.8),
                ("not sure", 0.8),
                ("unclear", 0.6),
                ("maybe", 0.4),
                ("perhaps", 0.3),
                ("as an ai", 1.2),
                ("error", 0.8),
                ("sorry", 0.6),
            ]),
            -0.5,
        )
    }
}

impl TextClassifier for LexiconClassifier {
    fn logits(&self, text: &str) -> Vec<f64> {
        let lower = text.to_lowercase();
        let cap = self.max_hits_per_cue;
        vec![
            Self::cue_sum(&self.negative, &lower, cap),
            self.bias + Self::cue_sum(&self.positive, &lower, cap),
        ]
    }
}

/// Scores text by the positive-class probability of a classifier.
pub struct ClassifierScorer {
    classifier: Arc<dyn TextClassifier>,
    max_words: usize,
}

impl ClassifierScorer {
    pub fn new(classifier: Arc<dyn TextClassifier>, config: &ClassifierConfig) -> Self {
        Self {
            classifier,
            max_words: config.max_words,
        }
    }
}

impl Scorer for ClassifierScorer {
    fn strategy(&self) -> &'static str {
        "classifier"
    }

    fn score(&self, text: &str, _context: &RunningContext) -> f64 {
        let truncated = text
            .split_whitespace()
            .take(self.max_words)
            .collect::<Vec<_>>()
            .join(" ");
        let probabilities = softmax(&self.classifier.logits(&truncated));
        probabilities
            .get(self.classifier.positive_class())
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClassifier(Vec<f64>);

    impl TextClassifier for FixedClassifier {
        fn logits(&self, _text: &str) -> Vec<f64> {
            self.0.clone()
        }
    }

    #[test]
    fn test_softmax_normalizes() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_is_shift_invariant_and_stable() {
        let a = softmax(&[1000.0, 1001.0]);
        let b = softmax(&[0.0, 1.0]);
        assert!((a[1] - b[1]).abs() < 1e-12);
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_positive_class_probability() {
        let scorer = ClassifierScorer::new(
            Arc::new(FixedClassifier(vec![0.0, 0.0])),
            &ClassifierConfig::default(),
        );
        assert_eq!(scorer.score("anything", &RunningContext::new()), 0.5);
    }

    #[test]
    fn test_missing_positive_class_scores_zero() {
        let scorer = ClassifierScorer::new(
            Arc::new(FixedClassifier(vec![2.0])),
            &ClassifierConfig::default(),
        );
        assert_eq!(scorer.score("anything", &RunningContext::new()), 0.0);
    }

    #[test]
    fn test_lexicon_prefers_actionable_text() {
        let scorer = ClassifierScorer::new(
            Arc::new(LexiconClassifier::default()),
            &ClassifierConfig::default(),
        );
        let context = RunningContext::new();
        let strong = scorer.score(
            "First, prioritize the school because children are trapped. \
             Coordinate with fire crews and ensure the hospital is protected.",
            &context,
        );
        let weak = scorer.score("I'm not sure, maybe wait. Sorry, it is unclear.", &context);
        assert!(strong > 0.5, "strong = {}", strong);
        assert!(weak < 0.5, "weak = {}", weak);
    }

    #[test]
    fn test_input_truncated_to_word_budget() {
        let scorer = ClassifierScorer::new(
            Arc::new(LexiconClassifier::default()),
            &ClassifierConfig { max_words: 2 },
        );
        let context = RunningContext::new();
        let head_only = scorer.score("hold position", &context);
        let with_tail = scorer.score("hold position prioritize prioritize", &context);
        assert_eq!(head_only, with_tail);
    }
}
