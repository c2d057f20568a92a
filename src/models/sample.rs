//! Prompt, sample and cell types for spectra.
//!
//! K_i: These types represent the core data flow through the analysis.

use crate::analysis::DistributionStats;
use crate::embedding::EmbeddingVector;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Input prompt for analysis.
///
/// K_i: Every prompt has text and a topic tag; it is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSpec {
    /// The prompt text
    #[serde(alias = "prompt")]
    pub text: String,

    /// Topic tag used to select the validator (e.g. "math", "crossword")
    pub topic: String,

    /// Expected kind of output (e.g. "calculation", "json")
    #[serde(default, alias = "expectedType", alias = "expected_type")]
    pub expected_kind: String,

    /// Optional complexity label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
}

impl PromptSpec {
    pub fn new(
        text: impl Into<String>,
        topic: impl Into<String>,
        expected_kind: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            topic: topic.into(),
            expected_kind: expected_kind.into(),
            complexity: None,
        }
    }

    pub fn with_complexity(mut self, complexity: impl Into<String>) -> Self {
        self.complexity = Some(complexity.into());
        self
    }

    /// Complexity label, "standard" when unset.
    pub fn complexity_label(&self) -> &str {
        self.complexity.as_deref().unwrap_or("standard")
    }
}

/// Token usage for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u32,
    pub output: u32,
    pub total: u32,
}

impl TokenUsage {
    pub fn new(input: u32, output: u32) -> Self {
        Self {
            input,
            output,
            total: input.saturating_add(output),
        }
    }

    /// Estimate usage when the provider reports none (≈4 chars per token).
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        Self::new(estimate_tokens(prompt), estimate_tokens(completion))
    }
}

/// `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}

/// Successful generation from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated text
    pub text: String,
    /// Model id that produced it
    pub model_id: String,
    /// Token usage (reported or estimated)
    pub usage: TokenUsage,
    /// Cost in USD
    pub cost: f64,
    /// Wall time of the successful attempt in milliseconds
    pub latency_ms: u64,
}

/// A sample slot whose generation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub model_id: String,
    /// 1-based sample number within the cell
    pub sample_index: usize,
    pub temperature: f64,
    /// `http_<status>`, `timeout`, `network`, `unknown` or `embedding`
    pub error_kind: String,
    pub message: String,
}

/// Heuristic quality verdict for one output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Score in [0, 1]
    #[serde(serialize_with = "serialize_rounded")]
    pub score: f64,
    /// `score > 0.5`
    pub is_valid: bool,
    /// Topic-specific raw measurements
    pub details: BTreeMap<String, serde_json::Value>,
    /// Human-readable problems found
    pub issues: Vec<String>,
}

impl ValidationResult {
    /// Build a result, clamping the score into [0, 1].
    pub fn new(
        score: f64,
        details: BTreeMap<String, serde_json::Value>,
        issues: Vec<String>,
    ) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            score,
            is_valid: score > 0.5,
            details,
            issues,
        }
    }
}

/// One successful sample, enriched with its embedding and validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    /// 1-based sample number within the cell
    pub sample_index: usize,
    pub model_id: String,
    pub text: String,
    pub usage: TokenUsage,
    #[serde(serialize_with = "serialize_rounded")]
    pub cost: f64,
    pub latency_ms: u64,
    pub validation: ValidationResult,
    /// Not exported; vectors are an in-run artifact
    #[serde(skip)]
    pub embedding: EmbeddingVector,
}

/// Lifecycle of an analysis cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellPhase {
    #[default]
    Pending,
    Sampling,
    Aggregating,
    Complete,
}

/// Derived metrics for a cell, computed over successful samples only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetrics {
    /// Mean pairwise (1 − cosine similarity)
    #[serde(serialize_with = "serialize_rounded")]
    pub uniqueness: f64,
    /// Fraction of pairs above the duplicate threshold
    #[serde(serialize_with = "serialize_rounded")]
    pub duplicate_rate: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_cost: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_cost: f64,
    /// `avg_validation / avg_cost`, 0 when there is no cost
    #[serde(serialize_with = "serialize_rounded")]
    pub cost_efficiency: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_validation: f64,
    /// Population standard deviation of validation scores
    #[serde(serialize_with = "serialize_rounded")]
    pub validation_std_dev: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub failure_rate: f64,
    pub avg_latency_ms: u64,
    pub cluster_count: usize,
    /// Sample positions (within successes) that sit apart from the rest
    pub outliers: Vec<usize>,
    /// Pairwise similarity distribution, absent below two samples
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<DistributionStats>,
    /// Percentage share per model, one decimal
    pub model_distribution: BTreeMap<String, f64>,
    pub quality_insights: Vec<String>,
}

/// Aggregation unit for one (prompt, temperature) combination.
///
/// K_i: `attempted == samples.len() + failures.len()` once complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisCell {
    pub prompt: PromptSpec,
    pub temperature: f64,
    pub phase: CellPhase,
    pub attempted: usize,
    /// Successful samples in generation order
    pub samples: Vec<SampleRecord>,
    pub failures: Vec<GenerationFailure>,
    pub metrics: CellMetrics,
}

impl AnalysisCell {
    pub fn new(prompt: PromptSpec, temperature: f64) -> Self {
        Self {
            prompt,
            temperature,
            phase: CellPhase::Pending,
            attempted: 0,
            samples: Vec::new(),
            failures: Vec::new(),
            metrics: CellMetrics::default(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.prompt.topic
    }

    pub fn success_count(&self) -> usize {
        self.samples.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Round to 4 decimals.
pub fn round4(value: f64) -> f64 {
    if value.is_finite() {
        (value * 10_000.0).round() / 10_000.0
    } else {
        0.0
    }
}

/// Serialize an `f64` rounded to 4 decimals.
pub fn serialize_rounded<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round4(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_spec_accepts_original_field_names() {
        let json = r#"{"prompt": "What is 15% of 240?", "topic": "math", "expectedType": "calculation", "complexity": "simple"}"#;
        let spec: PromptSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.text, "What is 15% of 240?");
        assert_eq!(spec.expected_kind, "calculation");
        assert_eq!(spec.complexity_label(), "simple");

        let bare: PromptSpec =
            serde_json::from_str(r#"{"text": "hi", "topic": "language"}"#).unwrap();
        assert_eq!(bare.expected_kind, "");
        assert_eq!(bare.complexity_label(), "standard");
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        let usage = TokenUsage::estimate("abcdefgh", "abcde");
        assert_eq!(usage, TokenUsage::new(2, 2));
        assert_eq!(usage.total, 4);
    }

    #[test]
    fn test_validation_result_clamps_and_flags() {
        let result = ValidationResult::new(1.4, BTreeMap::new(), vec![]);
        assert_eq!(result.score, 1.0);
        assert!(result.is_valid);

        let result = ValidationResult::new(0.5, BTreeMap::new(), vec![]);
        assert!(!result.is_valid);

        let result = ValidationResult::new(f64::NAN, BTreeMap::new(), vec![]);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_rounded_serialization_reparses() {
        let metrics = CellMetrics {
            uniqueness: 0.345_612_9,
            ..Default::default()
        };
        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"uniqueness\":0.3456"));
        let back: CellMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.uniqueness, 0.3456);
    }
}
