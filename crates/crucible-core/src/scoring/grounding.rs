//! Context-grounding scoring.
//!
//! Measures whether a response refers to the running scenario context
//! (reference) and whether those references carry analysis rather than
//! bare mentions (application).

use std::collections::BTreeSet;

use crate::types::{ContextValue, RunningContext};

use super::config::GroundingConfig;
use super::Scorer;

/// Scores how well a response references and applies the running context.
#[derive(Debug, Clone)]
pub struct ContextGroundingScorer {
    connectives: Vec<String>,
    window_chars: usize,
    reference_weight: f64,
    application_weight: f64,
}

impl ContextGroundingScorer {
    pub fn new(config: &GroundingConfig) -> Self {
        Self {
            connectives: config
                .connectives
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            window_chars: config.window_chars,
            reference_weight: config.reference_weight,
            application_weight: config.application_weight,
        }
    }

    /// Fraction of context keywords present in the lowercased text.
    pub fn reference_score(&self, lower_text: &str, context: &RunningContext) -> f64 {
        let keywords = context_keywords(context);
        let referenced = keywords
            .iter()
            .filter(|k| lower_text.contains(k.to_lowercase().as_str()))
            .count();
        referenced as f64 / keywords.len().max(1) as f64
    }

    /// Fraction of distinct context values whose first mention sits near an
    /// analytical connective.
    pub fn application_score(&self, lower_text: &str, context: &RunningContext) -> f64 {
        let elements: BTreeSet<String> = context
            .values()
            .map(|v| v.render().to_lowercase())
            .filter(|v| !v.is_empty())
            .collect();

        let meaningful = elements
            .iter()
            .filter(|element| {
                surrounding_text(lower_text, element, self.window_chars)
                    .map(|window| self.is_meaningful_reference(window))
                    .unwrap_or(false)
            })
            .count();

        (meaningful as f64 / elements.len().max(1) as f64).min(1.0)
    }

    fn is_meaningful_reference(&self, window: &str) -> bool {
        let lower = window.to_lowercase();
        self.connectives.iter().any(|c| lower.contains(c.as_str()))
    }
}

/// Keyword set from a context: whitespace tokens of text values, and the
/// rendered form of every other scalar.
pub fn context_keywords(context: &RunningContext) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();
    for value in context.values() {
        match value {
            ContextValue::Text(text) => {
                keywords.extend(text.split_whitespace().map(|t| t.to_string()));
            }
            other => {
                keywords.insert(other.render());
            }
        }
    }
    keywords
}

/// Slice of `text` around the first occurrence of `target`, extended by up
/// to `window` characters on each side.
pub fn surrounding_text<'a>(text: &'a str, target: &str, window: usize) -> Option<&'a str> {
    let start = text.find(target)?;
    let end = start + target.len();

    let lo = if window == 0 {
        start
    } else {
        text[..start]
            .char_indices()
            .rev()
            .nth(window - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let hi = text[end..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());

    Some(&text[lo..hi])
}

impl Scorer for ContextGroundingScorer {
    fn strategy(&self) -> &'static str {
        "grounding"
    }

    fn score(&self, text: &str, context: &RunningContext) -> f64 {
        let lower = text.to_lowercase();
        let reference = self.reference_score(&lower, context);
        let application = self.application_score(&lower, context);
        (reference * self.reference_weight + application * self.application_weight).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> ContextGroundingScorer {
        ContextGroundingScorer::new(&GroundingConfig::default())
    }

    fn earthquake_context() -> RunningContext {
        [
            ("infrastructure_damage", ContextValue::from("severe")),
            ("resources_available", ContextValue::from("limited")),
            ("hospitals_damaged", ContextValue::from(3i64)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_keywords_split_text_and_render_numbers() {
        let context: RunningContext = [
            ("resources", ContextValue::from("insufficient for both")),
            ("towns_affected", ContextValue::from(5i64)),
            ("rescue_disrupted", ContextValue::from(true)),
        ]
        .into_iter()
        .collect();

        let keywords = context_keywords(&context);
        let expected: BTreeSet<String> = ["insufficient", "for", "both", "5", "true"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(keywords, expected);
    }

    #[test]
    fn test_no_keywords_means_zero_reference() {
        let lower = "dispatch every crew to the river crossing.";
        assert_eq!(scorer().reference_score(lower, &earthquake_context()), 0.0);
        assert_eq!(scorer().score(lower, &earthquake_context()), 0.0);
    }

    #[test]
    fn test_bare_mentions_score_reference_only() {
        let text = "Damage is severe. Supplies are limited.";
        let score = scorer().score(text, &earthquake_context());
        // 2 of 3 keywords referenced, no connective near either mention
        assert!((score - (2.0 / 3.0) * 0.4).abs() < 1e-12, "got {}", score);
    }

    #[test]
    fn test_applied_mentions_score_application() {
        let text = "Because damage is severe we triage. Given limited supplies we ration. \
                    Based on 3 damaged hospitals we reroute.";
        let score = scorer().score(text, &earthquake_context());
        assert!((score - 1.0).abs() < 1e-12, "got {}", score);
    }

    #[test]
    fn test_connective_outside_window_does_not_count() {
        let padding = "x".repeat(80);
        let text = format!("because {} severe", padding);
        let context: RunningContext = [("damage", ContextValue::from("severe"))]
            .into_iter()
            .collect();
        assert_eq!(scorer().application_score(&text, &context), 0.0);
    }

    #[test]
    fn test_empty_context_scores_zero() {
        let text = "Because the dam failed, evacuate.";
        assert_eq!(scorer().score(text, &RunningContext::new()), 0.0);
    }

    #[test]
    fn test_surrounding_text_is_char_safe() {
        let text = "ééééé severe ééééé";
        let window = surrounding_text(text, "severe", 2).unwrap();
        assert_eq!(window, "é severe é");
        assert!(surrounding_text(text, "absent", 2).is_none());
    }
}
