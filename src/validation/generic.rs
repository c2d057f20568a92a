//! Fallback validator for topics without a dedicated one.

use crate::models::ValidationResult;
use crate::validation::{details, TopicValidator};
use serde_json::Value;
use std::collections::HashSet;

const SHORT_SCORE: f64 = 0.3;
const UNCAPITALIZED_SCORE: f64 = 0.5;

/// Unique lowercase tokens over total tokens; 0 without tokens.
pub fn lexical_diversity(text: &str) -> f64 {
    let tokens: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let unique = tokens.iter().collect::<HashSet<_>>().len();
    unique as f64 / tokens.len() as f64
}

/// Length and capitalization gates, then `0.6 + 0.3 × lexical diversity`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericValidator;

impl TopicValidator for GenericValidator {
    fn topic(&self) -> &'static str {
        "generic"
    }

    fn validate(&self, text: &str) -> ValidationResult {
        let length = text.chars().count();
        let diversity = lexical_diversity(text);
        let has_capital = text.chars().any(|c| c.is_ascii_uppercase());

        let (score, issues) = if length <= 15 {
            (SHORT_SCORE, vec!["Output is brief".to_string()])
        } else if !has_capital {
            (UNCAPITALIZED_SCORE, vec!["No capitalization".to_string()])
        } else {
            (0.6 + 0.3 * diversity, Vec::new())
        };

        ValidationResult::new(
            score,
            details([
                ("generic_validation", Value::from(true)),
                ("length", Value::from(length)),
                ("lexical_diversity", Value::from(diversity)),
            ]),
            issues,
        )
    }
}
