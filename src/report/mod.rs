//! Report aggregation and the JSON export.
//!
//! Epistemic foundation:
//! - K_i: The report is a pure fold over finished cells
//! - K_i: Exported metrics are rounded to 4 decimals and reparse unchanged
//! - B_i: Writing the export may fail → Result

use crate::analysis::mean;
use crate::models::{round4, serialize_rounded, AnalysisCell, Result, SampleRecord, SpectraError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Per-group metric series in cell order, with arithmetic means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSeries {
    pub uniqueness: Vec<f64>,
    pub duplicate_rate: Vec<f64>,
    pub avg_cost: Vec<f64>,
    pub avg_validation: Vec<f64>,
    pub means: GroupMeans,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMeans {
    #[serde(serialize_with = "serialize_rounded")]
    pub uniqueness: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub duplicate_rate: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_cost: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_validation: f64,
}

impl GroupSeries {
    fn push(&mut self, cell: &AnalysisCell) {
        let m = &cell.metrics;
        self.uniqueness.push(round4(m.uniqueness));
        self.duplicate_rate.push(round4(m.duplicate_rate));
        self.avg_cost.push(round4(m.avg_cost));
        self.avg_validation.push(round4(m.avg_validation));
    }

    fn finish(&mut self) {
        self.means = GroupMeans {
            uniqueness: mean(&self.uniqueness),
            duplicate_rate: mean(&self.duplicate_rate),
            avg_cost: mean(&self.avg_cost),
            avg_validation: mean(&self.avg_validation),
        };
    }

    /// Number of cells in the group.
    pub fn len(&self) -> usize {
        self.uniqueness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uniqueness.is_empty()
    }
}

/// Per-model totals and means over successful samples of every cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub samples: usize,
    pub total_tokens: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_cost: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub mean_validation: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub mean_cost: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub mean_tokens: f64,
    /// `mean_validation / mean_cost`, 0 when the model cost nothing
    #[serde(serialize_with = "serialize_rounded")]
    pub cost_efficiency: f64,
}

impl ModelSummary {
    fn from_samples(samples: &[&SampleRecord]) -> Self {
        let n = samples.len();
        let total_cost: f64 = samples.iter().map(|s| s.cost).sum();
        let total_tokens: u64 = samples.iter().map(|s| u64::from(s.usage.total)).sum();
        let scores: Vec<f64> = samples.iter().map(|s| s.validation.score).collect();

        let (mean_cost, mean_tokens) = if n > 0 {
            (total_cost / n as f64, total_tokens as f64 / n as f64)
        } else {
            (0.0, 0.0)
        };
        let mean_validation = mean(&scores);
        let cost_efficiency = if mean_cost > 0.0 {
            mean_validation / mean_cost
        } else {
            0.0
        };

        Self {
            samples: n,
            total_tokens,
            total_cost,
            mean_validation,
            mean_cost,
            mean_tokens,
            cost_efficiency,
        }
    }
}

/// Cells grouped by topic, temperature and complexity, plus per-model totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub by_topic: BTreeMap<String, GroupSeries>,
    /// Keyed by the temperature's shortest decimal form ("0.3", "1")
    pub by_temperature: BTreeMap<String, GroupSeries>,
    /// Keyed by the prompt's complexity label ("standard" when unset)
    pub by_complexity: BTreeMap<String, GroupSeries>,
    pub by_model: BTreeMap<String, ModelSummary>,
    pub cells: Vec<AnalysisCell>,
}

impl AnalysisReport {
    /// Fold finished cells into grouped series and per-model summaries.
    pub fn from_cells(cells: Vec<AnalysisCell>) -> Self {
        let mut by_topic: BTreeMap<String, GroupSeries> = BTreeMap::new();
        let mut by_temperature: BTreeMap<String, GroupSeries> = BTreeMap::new();
        let mut by_complexity: BTreeMap<String, GroupSeries> = BTreeMap::new();
        let mut model_samples: BTreeMap<&str, Vec<&SampleRecord>> = BTreeMap::new();

        for cell in &cells {
            by_topic.entry(cell.topic().to_string()).or_default().push(cell);
            by_temperature
                .entry(temperature_key(cell.temperature))
                .or_default()
                .push(cell);
            by_complexity
                .entry(cell.prompt.complexity_label().to_string())
                .or_default()
                .push(cell);
            for sample in &cell.samples {
                model_samples
                    .entry(sample.model_id.as_str())
                    .or_default()
                    .push(sample);
            }
        }
        by_topic.values_mut().for_each(GroupSeries::finish);
        by_temperature.values_mut().for_each(GroupSeries::finish);
        by_complexity.values_mut().for_each(GroupSeries::finish);

        let by_model = model_samples
            .into_iter()
            .map(|(model, samples)| (model.to_string(), ModelSummary::from_samples(&samples)))
            .collect();

        Self {
            by_topic,
            by_temperature,
            by_complexity,
            by_model,
            cells,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.cells.iter().map(|c| c.metrics.total_cost).sum()
    }

    pub fn total_samples(&self) -> usize {
        self.cells.iter().map(AnalysisCell::success_count).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.cells.iter().map(AnalysisCell::failure_count).sum()
    }

    /// Models ordered by cost efficiency, best first.
    pub fn models_by_efficiency(&self) -> Vec<(&str, &ModelSummary)> {
        let mut models: Vec<(&str, &ModelSummary)> =
            self.by_model.iter().map(|(m, s)| (m.as_str(), s)).collect();
        models.sort_by(|a, b| b.1.cost_efficiency.total_cmp(&a.1.cost_efficiency));
        models
    }

    /// Human-readable summary for the terminal.
    pub fn render_summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Analysis Report ===")?;
        writeln!(f, "Cells:       {}", self.cells.len())?;
        writeln!(f, "Samples:     {}", self.total_samples())?;
        writeln!(f, "Failures:    {}", self.total_failures())?;
        writeln!(f, "Total cost:  ${:.4}", self.total_cost())?;

        for (title, groups) in [
            ("By topic", &self.by_topic),
            ("By temperature", &self.by_temperature),
            ("By complexity", &self.by_complexity),
        ] {
            writeln!(f, "\n--- {title} ---")?;
            writeln!(
                f,
                "{:<14} {:>5} {:>10} {:>10} {:>10} {:>10}",
                "group", "cells", "unique", "dup rate", "avg cost", "quality"
            )?;
            for (name, series) in groups {
                writeln!(
                    f,
                    "{:<14} {:>5} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
                    name,
                    series.len(),
                    series.means.uniqueness,
                    series.means.duplicate_rate,
                    series.means.avg_cost,
                    series.means.avg_validation
                )?;
            }
        }

        if !self.by_model.is_empty() {
            writeln!(f, "\n--- By model ---")?;
            writeln!(
                f,
                "{:<16} {:>7} {:>10} {:>10} {:>10} {:>10}",
                "model", "samples", "quality", "avg cost", "avg tokens", "total cost"
            )?;
            for (model, summary) in self.models_by_efficiency() {
                writeln!(
                    f,
                    "{:<16} {:>7} {:>10.4} {:>10.4} {:>10.1} {:>10.4}",
                    model,
                    summary.samples,
                    summary.mean_validation,
                    summary.mean_cost,
                    summary.mean_tokens,
                    summary.total_cost
                )?;
            }
        }

        let mut insights = self
            .cells
            .iter()
            .flat_map(|c| c.metrics.quality_insights.iter().map(move |i| (c, i)))
            .peekable();
        if insights.peek().is_some() {
            writeln!(f, "\n--- Insights ---")?;
            for (cell, insight) in insights {
                writeln!(
                    f,
                    "[{} @ {}] {}",
                    cell.topic(),
                    temperature_key(cell.temperature),
                    insight
                )?;
            }
        }

        Ok(())
    }
}

fn temperature_key(temperature: f64) -> String {
    format!("{temperature}")
}

/// Run settings recorded alongside the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub models: Vec<String>,
    /// USD per 1K tokens
    pub cost_per_1k: BTreeMap<String, f64>,
    pub temperatures: Vec<f64>,
    pub samples_per_prompt: usize,
}

/// One-shot export of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub analysis_config: ExportConfig,
    pub include_failures: bool,
    pub report: AnalysisReport,
}

impl ExportDocument {
    /// Wrap a report; failure records are dropped unless `include_failures`.
    pub fn new(mut report: AnalysisReport, config: ExportConfig, include_failures: bool) -> Self {
        if !include_failures {
            for cell in &mut report.cells {
                cell.failures.clear();
            }
        }
        Self {
            timestamp: Utc::now(),
            run_id: Uuid::new_v4(),
            analysis_config: config,
            include_failures,
            report,
        }
    }

    /// Write the document as JSON.
    ///
    /// B_i(path is writable) → Result
    pub fn write_to(&self, path: &Path, pretty: bool) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SpectraError::io("creating export directory", e))?;
        }
        let file = File::create(path).map_err(|e| SpectraError::io("creating export file", e))?;
        let mut writer = BufWriter::new(file);

        let written = if pretty {
            serde_json::to_writer_pretty(&mut writer, self)
        } else {
            serde_json::to_writer(&mut writer, self)
        };
        written.map_err(|e| SpectraError::Internal(format!("serializing export: {e}")))?;
        writer
            .flush()
            .map_err(|e| SpectraError::io("flushing export", e))?;

        info!(
            path = %path.display(),
            run_id = %self.run_id,
            cells = self.report.cells.len(),
            "Export written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingVector;
    use crate::models::{
        CellMetrics, GenerationFailure, PromptSpec, TokenUsage, ValidationResult,
    };
    use tempfile::tempdir;

    fn cell(topic: &str, temperature: f64, uniqueness: f64, avg_validation: f64) -> AnalysisCell {
        let mut cell = AnalysisCell::new(PromptSpec::new("prompt", topic, ""), temperature);
        cell.attempted = 2;
        cell.failures.push(GenerationFailure {
            model_id: "gpt-4".to_string(),
            sample_index: 2,
            temperature,
            error_kind: "timeout".to_string(),
            message: "Request timeout after 60s".to_string(),
        });
        cell.metrics = CellMetrics {
            uniqueness,
            avg_validation,
            avg_cost: 0.0012,
            total_cost: 0.0012,
            quality_insights: vec!["Low temperature may reduce creativity".to_string()],
            ..Default::default()
        };
        cell
    }

    fn export_config() -> ExportConfig {
        ExportConfig {
            models: vec!["gpt-4".to_string()],
            cost_per_1k: BTreeMap::from([("gpt-4".to_string(), 0.03)]),
            temperatures: vec![0.3, 1.0],
            samples_per_prompt: 2,
        }
    }

    #[test]
    fn test_groups_by_topic_and_temperature() {
        let report = AnalysisReport::from_cells(vec![
            cell("math", 0.3, 0.2, 0.8),
            cell("math", 1.0, 0.4, 0.6),
            cell("language", 0.3, 0.5, 0.9),
        ]);

        let math = &report.by_topic["math"];
        assert_eq!(math.uniqueness, vec![0.2, 0.4]);
        assert!((math.means.uniqueness - 0.3).abs() < 1e-12);
        assert!((math.means.avg_validation - 0.7).abs() < 1e-12);

        assert_eq!(
            report.by_temperature.keys().collect::<Vec<_>>(),
            vec!["0.3", "1"]
        );
        assert_eq!(report.by_temperature["0.3"].len(), 2);
        assert_eq!(report.total_failures(), 3);
    }

    #[test]
    fn test_series_values_are_rounded() {
        let report = AnalysisReport::from_cells(vec![cell("math", 0.7, 0.345_612_9, 0.5)]);
        assert_eq!(report.by_topic["math"].uniqueness, vec![0.3456]);
    }

    #[test]
    fn test_empty_report() {
        let report = AnalysisReport::from_cells(Vec::new());
        assert!(report.by_topic.is_empty());
        assert_eq!(report.total_cost(), 0.0);
        assert!(report.render_summary().contains("Cells:       0"));
    }

    #[test]
    fn test_summary_lists_groups_and_insights() {
        let report = AnalysisReport::from_cells(vec![cell("math", 0.3, 0.2, 0.8)]);
        let summary = report.render_summary();
        assert!(summary.contains("--- By topic ---"));
        assert!(summary.contains("math"));
        assert!(summary.contains("[math @ 0.3] Low temperature may reduce creativity"));
    }

    #[test]
    fn test_export_reparses_rounded_metrics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("analysis.json");
        let report = AnalysisReport::from_cells(vec![cell("math", 0.7, 0.345_612_9, 0.5)]);
        let doc = ExportDocument::new(report, export_config(), true);

        doc.write_to(&path, true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: ExportDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(back.run_id, doc.run_id);
        assert_eq!(back.report.cells[0].metrics.uniqueness, 0.3456);
        assert_eq!(back.report.cells[0].failures.len(), 1);
        assert_eq!(back.analysis_config.cost_per_1k["gpt-4"], 0.03);
    }

    #[test]
    fn test_export_without_failures() {
        let report = AnalysisReport::from_cells(vec![cell("math", 0.7, 0.3, 0.5)]);
        let doc = ExportDocument::new(report, export_config(), false);
        assert!(!doc.include_failures);
        assert!(doc.report.cells[0].failures.is_empty());
        assert_eq!(doc.report.cells[0].attempted, 2);
    }

    fn sample(model: &str, tokens: u32, cost: f64, score: f64) -> SampleRecord {
        SampleRecord {
            sample_index: 1,
            model_id: model.to_string(),
            text: "The answer is 36.".to_string(),
            usage: TokenUsage::new(tokens / 2, tokens - tokens / 2),
            cost,
            latency_ms: 10,
            validation: ValidationResult::new(score, BTreeMap::new(), Vec::new()),
            embedding: EmbeddingVector::default(),
        }
    }

    #[test]
    fn test_by_model_folds_samples_across_cells() {
        let mut first = cell("math", 0.3, 0.2, 0.8);
        first.samples = vec![sample("gpt-4", 200, 0.006, 0.8), sample("deepseek", 100, 0.0, 0.6)];
        let mut second = cell("language", 1.0, 0.4, 0.6);
        second.samples = vec![sample("gpt-4", 400, 0.012, 0.6)];

        let report = AnalysisReport::from_cells(vec![first, second]);

        let gpt = &report.by_model["gpt-4"];
        assert_eq!(gpt.samples, 2);
        assert_eq!(gpt.total_tokens, 600);
        assert!((gpt.total_cost - 0.018).abs() < 1e-12);
        assert!((gpt.mean_cost - 0.009).abs() < 1e-12);
        assert!((gpt.mean_tokens - 300.0).abs() < 1e-12);
        assert!((gpt.mean_validation - 0.7).abs() < 1e-12);

        let free = &report.by_model["deepseek"];
        assert_eq!(free.cost_efficiency, 0.0);
        assert_eq!(report.models_by_efficiency()[0].0, "gpt-4");
        assert!(report.render_summary().contains("--- By model ---"));
    }

    #[test]
    fn test_by_complexity_uses_label() {
        let mut hard = cell("math", 0.7, 0.6, 0.4);
        hard.prompt = hard.prompt.with_complexity("complex");
        let report = AnalysisReport::from_cells(vec![hard, cell("math", 0.7, 0.2, 0.8)]);

        assert_eq!(
            report.by_complexity.keys().collect::<Vec<_>>(),
            vec!["complex", "standard"]
        );
        assert_eq!(report.by_complexity["complex"].uniqueness, vec![0.6]);
        assert!(report.by_model.is_empty());
    }
}
