//! Math answer heuristics.

use crate::models::ValidationResult;
use crate::validation::{details, weighted, TopicValidator};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid regex"));
static OPERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+\-*/=×÷]").expect("valid regex"));
static BARE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("valid regex"));
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+%").expect("valid regex"));
static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+").expect("valid regex"));
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(feet|meters|miles|km|inches|cm|dollars|degrees)\b|\$|°")
        .expect("valid regex")
});
static CONNECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(because|since|therefore|step)\b").expect("valid regex")
});
static ERROR_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(undefined|nan|errors?|invalid)\b").expect("valid regex")
});

/// Multiplier applied when the output contains an error marker.
const ERROR_PENALTY: f64 = 0.3;

/// Rewards numbers, operators, units and explanation; penalizes error markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathValidator;

impl TopicValidator for MathValidator {
    fn topic(&self) -> &'static str {
        "math"
    }

    fn validate(&self, text: &str) -> ValidationResult {
        let has_numbers = DIGIT_RE.is_match(text);
        let has_operators = OPERATOR_RE.is_match(text);
        let is_bare_number = BARE_NUMBER_RE.is_match(text.trim());
        let has_percentage = PERCENT_RE.is_match(text);
        let has_decimal = DECIMAL_RE.is_match(text);
        let has_unit = UNIT_RE.is_match(text);
        let has_explanation = text.chars().count() > 20 && CONNECTIVE_RE.is_match(text);
        let contains_errors = ERROR_MARKER_RE.is_match(text);

        let mut score = weighted(&[
            (has_numbers, 0.3),
            (has_operators || is_bare_number, 0.2),
            (has_percentage, 0.15),
            (has_decimal, 0.1),
            (has_unit, 0.15),
            (has_explanation, 0.1),
        ]);

        let mut issues = Vec::new();
        if !has_numbers {
            issues.push("No numbers in answer".to_string());
        }
        if contains_errors {
            score *= ERROR_PENALTY;
            issues.push("Answer contains an error marker".to_string());
        }

        ValidationResult::new(
            score,
            details([
                ("has_numbers", Value::from(has_numbers)),
                ("has_operators", Value::from(has_operators)),
                ("has_percentage", Value::from(has_percentage)),
                ("has_decimal", Value::from(has_decimal)),
                ("has_unit", Value::from(has_unit)),
                ("has_explanation", Value::from(has_explanation)),
                ("contains_errors", Value::from(contains_errors)),
                ("length", Value::from(text.chars().count())),
            ]),
            issues,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str) -> f64 {
        MathValidator.validate(text).score
    }

    #[test]
    fn test_number_beats_undefined() {
        assert!(score("The answer is 42") > score("The answer is undefined"));
        assert!((score("The answer is 42") - 0.3).abs() < 1e-12);
        assert_eq!(score("The answer is undefined"), 0.0);
    }

    #[test]
    fn test_full_explanation_scores_high() {
        let text = "15% of 240 = 0.15 × 240 = 36.0 dollars, because 10% is 24 and 5% is 12.";
        let result = MathValidator.validate(text);
        assert!((result.score - 1.0).abs() < 1e-9);
        assert!(result.is_valid);
        assert!(result.issues.is_empty());
        assert_eq!(result.details["has_unit"], true);
    }

    #[test]
    fn test_bare_number_counts_as_format() {
        // digits 0.3 + bare number 0.2 + decimal 0.1
        assert!((score("  1234.5678 ") - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_error_marker_penalty() {
        let clean = score("Result: 12 + 30 = 42 meters");
        let flagged = score("Result: 12 + 30 = 42 meters (error)");
        assert!((flagged - clean * 0.3).abs() < 1e-12);
    }
}
