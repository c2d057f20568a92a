//! Topic-specific heuristic quality validation.
//!
//! Epistemic foundation:
//! - K_i: Score ∈ [0, 1], verdict is `score > 0.5`
//! - K_i: Same text and topic → same result (no randomness)
//! - I^R: Which validator handles a topic is a registration, unknown topics
//!   fall back to the generic validator

mod code;
mod generic;
mod language;
mod math;
mod puzzle;
mod wordplay;

pub use code::CodeValidator;
pub use generic::GenericValidator;
pub use language::LanguageValidator;
pub use math::MathValidator;
pub use puzzle::PuzzleValidator;
pub use wordplay::WordplayValidator;

use crate::models::ValidationResult;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Outputs shorter than this (in characters) score 0.
pub const MIN_OUTPUT_CHARS: usize = 10;

/// Scores an output for one family of topics.
pub trait TopicValidator: Send + Sync {
    /// Canonical topic tag.
    fn topic(&self) -> &'static str;

    /// Extra tags routed to this validator.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    fn validate(&self, text: &str) -> ValidationResult;
}

/// Topic tag → validator table.
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn TopicValidator>>,
    fallback: Arc<dyn TopicValidator>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ValidatorRegistry {
    /// Empty registry; every topic goes to the generic validator.
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
            fallback: Arc::new(GenericValidator),
        }
    }

    /// Registry with every built-in validator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MathValidator));
        registry.register(Arc::new(LanguageValidator));
        registry.register(Arc::new(PuzzleValidator));
        registry.register(Arc::new(WordplayValidator));
        registry.register(Arc::new(CodeValidator));
        registry
    }

    /// Route a validator's topic and aliases to it, replacing earlier entries.
    pub fn register(&mut self, validator: Arc<dyn TopicValidator>) {
        for tag in std::iter::once(validator.topic()).chain(validator.aliases().iter().copied()) {
            self.validators
                .insert(tag.to_lowercase(), Arc::clone(&validator));
        }
    }

    /// Validator for `topic`, falling back to generic.
    pub fn get(&self, topic: &str) -> &Arc<dyn TopicValidator> {
        self.validators
            .get(&topic.trim().to_lowercase())
            .unwrap_or(&self.fallback)
    }

    /// Registered tags, sorted.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.validators.keys().map(|s| s.as_str()).collect();
        topics.sort_unstable();
        topics
    }

    /// Score `text` for `topic`.
    pub fn validate(&self, text: &str, topic: &str, expected_kind: &str) -> ValidationResult {
        let length = text.chars().count();
        let mut result = if length < MIN_OUTPUT_CHARS {
            ValidationResult::new(
                0.0,
                details([("length", Value::from(length))]),
                vec!["Output too short".to_string()],
            )
        } else {
            self.get(topic).validate(text)
        };

        if !expected_kind.is_empty() {
            result
                .details
                .insert("expected_kind".to_string(), Value::from(expected_kind));
        }
        result
    }
}

/// Build a details map from key/value pairs.
pub(crate) fn details<const N: usize>(pairs: [(&str, Value); N]) -> BTreeMap<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Sum the weights of the checks that passed.
pub(crate) fn weighted(checks: &[(bool, f64)]) -> f64 {
    checks.iter().filter(|(passed, _)| *passed).map(|(_, w)| w).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_output_scores_zero() {
        let registry = ValidatorRegistry::with_defaults();
        let result = registry.validate("42", "math", "calculation");
        assert_eq!(result.score, 0.0);
        assert!(!result.is_valid);
        assert_eq!(result.issues, vec!["Output too short"]);
        assert_eq!(result.details["expected_kind"], "calculation");
    }

    #[test]
    fn test_aliases_route_to_same_validator() {
        let registry = ValidatorRegistry::with_defaults();
        assert_eq!(registry.get("crossword").topic(), "puzzle");
        assert_eq!(registry.get("Puzzle").topic(), "puzzle");
        assert_eq!(registry.get("anagram").topic(), "wordplay");
        assert_eq!(registry.get("programming").topic(), "code");
        assert_eq!(registry.get("astronomy").topic(), "generic");
    }

    #[test]
    fn test_registration_adds_topic() {
        struct Always;
        impl TopicValidator for Always {
            fn topic(&self) -> &'static str {
                "poetry"
            }
            fn validate(&self, _text: &str) -> ValidationResult {
                ValidationResult::new(0.9, BTreeMap::new(), vec![])
            }
        }

        let mut registry = ValidatorRegistry::with_defaults();
        assert!(!registry.topics().contains(&"poetry"));
        registry.register(Arc::new(Always));
        assert!(registry.topics().contains(&"poetry"));
        assert_eq!(registry.validate("Roses are red", "poetry", "").score, 0.9);
    }

    #[test]
    fn test_deterministic() {
        let registry = ValidatorRegistry::with_defaults();
        let text = "Quantum computers use qubits that can hold superpositions.";
        let a = registry.validate(text, "science", "explanation");
        let b = registry.validate(text, "science", "explanation");
        assert_eq!(a, b);
    }
}
