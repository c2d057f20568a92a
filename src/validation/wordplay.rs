//! Word-play (anagram) heuristics.

use crate::models::ValidationResult;
use crate::validation::{details, weighted, TopicValidator};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static DELIMITER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"->|→|=>|:").expect("valid regex"));
static PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*(?:->|→|=>|:)\s*(\w+)").expect("valid regex"));

const CHECK_WEIGHT: f64 = 0.16;

fn sorted_letters(word: &str) -> Vec<char> {
    let mut letters: Vec<char> = word.to_lowercase().chars().collect();
    letters.sort_unstable();
    letters
}

/// Looks for `word -> word` pairs with matching lengths.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordplayValidator;

impl TopicValidator for WordplayValidator {
    fn topic(&self) -> &'static str {
        "wordplay"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["anagram"]
    }

    fn validate(&self, text: &str) -> ValidationResult {
        let pair = PAIR_RE
            .captures(text)
            .and_then(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())));
        let token_count = text.split_whitespace().filter(|w| w.chars().count() > 1).count();

        let has_delimiter = DELIMITER_RE.is_match(text);
        let has_letters = text.chars().any(|c| c.is_ascii_alphabetic());
        let has_multiple_words = token_count > 1;
        let has_pair_format = pair.is_some();
        let has_explanation = text.chars().count() > 20;
        let has_equal_length =
            pair.is_some_and(|(a, b)| a.chars().count() == b.chars().count());
        let is_anagram = pair.is_some_and(|(a, b)| {
            !a.eq_ignore_ascii_case(b) && sorted_letters(a) == sorted_letters(b)
        });

        let score = weighted(&[
            (has_delimiter, CHECK_WEIGHT),
            (has_letters, CHECK_WEIGHT),
            (has_multiple_words, CHECK_WEIGHT),
            (has_pair_format, CHECK_WEIGHT),
            (has_explanation, CHECK_WEIGHT),
            (has_equal_length, CHECK_WEIGHT),
        ]);

        let mut issues = Vec::new();
        if !has_pair_format {
            issues.push("No 'word -> word' pair found".to_string());
        } else if !has_equal_length {
            issues.push("Paired words differ in length".to_string());
        }

        ValidationResult::new(
            score,
            details([
                ("has_delimiter", Value::from(has_delimiter)),
                ("word_count", Value::from(text.split_whitespace().count())),
                ("has_pair_format", Value::from(has_pair_format)),
                (
                    "pair",
                    pair.map_or(Value::Null, |(a, b)| Value::from(vec![a, b])),
                ),
                ("is_anagram", Value::from(is_anagram)),
                ("length", Value::from(text.chars().count())),
            ]),
            issues,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anagram_pair_scores_all_checks() {
        let result = WordplayValidator.validate("listen -> silent (same six letters)");
        assert!((result.score - 0.96).abs() < 1e-9);
        assert!(result.is_valid);
        assert_eq!(result.details["is_anagram"], true);
        assert_eq!(result.details["pair"], serde_json::json!(["listen", "silent"]));
    }

    #[test]
    fn test_unequal_pair_is_flagged() {
        let result = WordplayValidator.validate("stone: notes and tones");
        assert_eq!(result.details["has_pair_format"], true);
        assert!(result.issues.is_empty());

        let result = WordplayValidator.validate("cat => crate, a longer word");
        assert!(result
            .issues
            .contains(&"Paired words differ in length".to_string()));
        assert_eq!(result.details["is_anagram"], false);
    }

    #[test]
    fn test_plain_prose_scores_low() {
        let result = WordplayValidator.validate("I could not think of any");
        assert!(!result.is_valid);
        assert_eq!(result.details["pair"], Value::Null);
    }
}
