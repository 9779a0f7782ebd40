//! Lexical-indicator scoring.
//!
//! Combines vocabulary coverage (which distinct indicator terms appear) with
//! sentence structure (average words per sentence, capped at a target).

use crate::types::RunningContext;

use super::config::LexicalConfig;
use super::Scorer;

/// Scores text by indicator vocabulary coverage and sentence length.
#[derive(Debug, Clone)]
pub struct LexicalIndicatorScorer {
    vocabulary: Vec<String>,
    indicator_weight: f64,
    structure_weight: f64,
    target_sentence_words: f64,
}

impl LexicalIndicatorScorer {
    pub fn new(config: &LexicalConfig) -> Self {
        Self {
            vocabulary: config
                .vocabulary
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            indicator_weight: config.indicator_weight,
            structure_weight: config.structure_weight,
            target_sentence_words: config.target_sentence_words,
        }
    }

    /// Fraction of vocabulary terms present at least once.
    pub fn coverage(&self, text: &str) -> f64 {
        if self.vocabulary.is_empty() {
            return 0.0;
        }
        let lower = text.to_lowercase();
        let hits = self
            .vocabulary
            .iter()
            .filter(|term| lower.contains(term.as_str()))
            .count();
        hits as f64 / self.vocabulary.len() as f64
    }
}

/// Mean word count over period-delimited sentences, ignoring blank segments.
///
/// Returns 0.0 when the text has no non-blank sentence.
pub fn average_sentence_words(text: &str) -> f64 {
    let counts: Vec<usize> = text
        .split('.')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.split_whitespace().count())
        .collect();

    if counts.is_empty() {
        return 0.0;
    }
    counts.iter().sum::<usize>() as f64 / counts.len() as f64
}

impl Scorer for LexicalIndicatorScorer {
    fn strategy(&self) -> &'static str {
        "lexical"
    }

    fn score(&self, text: &str, _context: &RunningContext) -> f64 {
        let structure = (average_sentence_words(text) / self.target_sentence_words).min(1.0);
        let score = self.coverage(text) * self.indicator_weight + structure * self.structure_weight;
        score.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::config::REASONING_INDICATORS;
    use proptest::prelude::*;

    fn reasoning_scorer() -> LexicalIndicatorScorer {
        LexicalIndicatorScorer::new(&LexicalConfig::with_vocabulary(&REASONING_INDICATORS))
    }

    #[test]
    fn test_reference_formula() {
        // 2 of 10 indicators; sentences of 6 and 4 words -> avg 5
        let text = "We act now because lives matter. Therefore move the teams.";
        let score = reasoning_scorer().score(text, &RunningContext::new());
        let expected = 0.2 * 0.6 + (5.0 / 20.0) * 0.4;
        assert!((score - expected).abs() < 1e-12, "got {}", score);
    }

    #[test]
    fn test_repeated_indicator_counts_once() {
        let scorer = reasoning_scorer();
        let once = scorer.coverage("because of the flood");
        let twice = scorer.coverage("because because because of the flood");
        assert_eq!(once, twice);
        assert_eq!(once, 0.1);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(reasoning_scorer().coverage("HOWEVER, Given That it rains"), 0.2);
    }

    #[test]
    fn test_blank_segments_are_ignored() {
        assert_eq!(average_sentence_words("One two three.  . ... Four five."), 2.5);
        assert_eq!(average_sentence_words(""), 0.0);
        assert_eq!(average_sentence_words(" . . "), 0.0);
    }

    #[test]
    fn test_long_sentences_cap_structure_term() {
        let long_sentence = vec!["word"; 60].join(" ");
        let score = reasoning_scorer().score(&long_sentence, &RunningContext::new());
        assert!((score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_score_clamped_to_one() {
        let config = LexicalConfig {
            vocabulary: vec!["flood".to_string()],
            indicator_weight: 1.0,
            structure_weight: 1.0,
            target_sentence_words: 1.0,
        };
        let scorer = LexicalIndicatorScorer::new(&config);
        assert_eq!(scorer.score("flood waters rise", &RunningContext::new()), 1.0);
    }

    proptest! {
        #[test]
        fn prop_adding_indicators_never_lowers_score(
            words in proptest::collection::vec("[a-z]{1,8}", 1..30),
            picks in proptest::collection::vec(0usize..10, 0..10),
        ) {
            let scorer = reasoning_scorer();
            let context = RunningContext::new();
            let base = words.join(" ");
            let mut text = base.clone();
            let mut previous = scorer.score(&base, &context);

            for idx in picks {
                text.push(' ');
                text.push_str(REASONING_INDICATORS[idx]);
                let next = scorer.score(&text, &context);
                prop_assert!(next >= previous, "{} dropped below {}", next, previous);
                previous = next;
            }
        }

        #[test]
        fn prop_score_in_unit_interval(text in ".{0,400}") {
            let score = reasoning_scorer().score(&text, &RunningContext::new());
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
