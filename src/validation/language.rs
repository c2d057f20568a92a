//! Prose quality heuristics.

use crate::models::ValidationResult;
use crate::validation::{details, weighted, TopicValidator};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

static CONNECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(and|but|however|therefore|because|since|although)\b")
        .expect("valid regex")
});

const CHECK_WEIGHT: f64 = 0.14;
const LENGTH_BONUS: f64 = 0.02;

fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Rough Flesch reading ease mapped into [0, 1].
fn readability(word_count: usize, sentence_count: usize, text: &str) -> f64 {
    if sentence_count == 0 || word_count == 0 {
        return 0.0;
    }
    let syllables = text
        .chars()
        .filter(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
        .count();
    let words_per_sentence = word_count as f64 / sentence_count as f64;
    let syllables_per_word = syllables as f64 / word_count as f64;
    ((206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word) / 100.0).clamp(0.0, 1.0)
}

/// Seven equally weighted structure checks plus a small length bonus.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageValidator;

impl TopicValidator for LanguageValidator {
    fn topic(&self) -> &'static str {
        "language"
    }

    fn validate(&self, text: &str) -> ValidationResult {
        let length = text.chars().count();
        let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        let unique_words = words.iter().collect::<HashSet<_>>().len();
        let sentences = sentences(text);

        let has_length = length > 20;
        let has_capital = text.chars().any(|c| c.is_ascii_uppercase());
        let has_punctuation = text.contains(['.', '!', '?']);
        let has_varied_vocabulary = unique_words > 5;
        // Any sentence terminator splits the text, even a trailing one
        let has_sentence_break = text.split(['.', '!', '?']).count() > 1;
        let has_connective = CONNECTIVE_RE.is_match(text);
        let has_full_sentence = sentences.iter().any(|s| s.chars().count() > 10);

        let mut score = weighted(&[
            (has_length, CHECK_WEIGHT),
            (has_capital, CHECK_WEIGHT),
            (has_punctuation, CHECK_WEIGHT),
            (has_varied_vocabulary, CHECK_WEIGHT),
            (has_sentence_break, CHECK_WEIGHT),
            (has_connective, CHECK_WEIGHT),
            (has_full_sentence, CHECK_WEIGHT),
        ]);
        if length > 100 {
            score += LENGTH_BONUS;
        }

        let mut issues = Vec::new();
        if !has_capital {
            issues.push("No capitalization".to_string());
        }
        if !has_punctuation {
            issues.push("No sentence punctuation".to_string());
        }
        if !has_varied_vocabulary {
            issues.push("Limited vocabulary".to_string());
        }

        let avg_words_per_sentence = if sentences.is_empty() {
            0.0
        } else {
            words.len() as f64 / sentences.len() as f64
        };

        ValidationResult::new(
            score.min(1.0),
            details([
                ("word_count", Value::from(words.len())),
                ("sentence_count", Value::from(sentences.len())),
                ("unique_words", Value::from(unique_words)),
                ("avg_words_per_sentence", Value::from(avg_words_per_sentence)),
                ("has_capitalization", Value::from(has_capital)),
                ("has_punctuation", Value::from(has_punctuation)),
                ("has_sentence_break", Value::from(has_sentence_break)),
                (
                    "readability",
                    Value::from(readability(words.len(), sentences.len(), text)),
                ),
            ]),
            issues,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidatorRegistry;

    const PARAGRAPH: &str = "Code flows like water, but bugs hide in the quiet places. \
        Every test we write is a small lantern. Therefore, we keep writing them.";

    #[test]
    fn test_paragraph_beats_single_word() {
        let registry = ValidatorRegistry::with_defaults();
        let word = registry.validate("Hello", "language", "poetry");
        let paragraph = registry.validate(PARAGRAPH, "language", "poetry");
        assert!(word.score < paragraph.score);

        // Also without the short-output gate
        let long_word = LanguageValidator.validate("Extraordinary");
        assert!(long_word.score < LanguageValidator.validate(PARAGRAPH).score);
    }

    #[test]
    fn test_paragraph_passes_every_check() {
        let result = LanguageValidator.validate(PARAGRAPH);
        assert!((result.score - 1.0).abs() < 1e-9);
        assert!(result.issues.is_empty());
        assert_eq!(result.details["sentence_count"], 3);
    }

    #[test]
    fn test_lowercase_fragment() {
        let result = LanguageValidator.validate("just some words here");
        assert!(!result.is_valid);
        assert!(result.issues.contains(&"No capitalization".to_string()));
    }

    #[test]
    fn test_single_terminated_sentence_counts_as_structured() {
        let result = LanguageValidator.validate("Hello there world.");
        assert_eq!(result.details["has_sentence_break"], true);
        assert_eq!(result.details["sentence_count"], 1);

        let unterminated = LanguageValidator.validate("Hello there world");
        assert_eq!(unterminated.details["has_sentence_break"], false);
        assert!(unterminated.score < result.score);
    }
}
