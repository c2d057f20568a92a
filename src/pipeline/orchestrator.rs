//! Sampling orchestrator.
//!
//! Flow per cell (prompt × temperature):
//! Pending → Sampling (Gateway → Embedding → Validator per sample)
//! → Aggregating (similarity + cost + quality) → Complete
//!
//! Epistemic foundation:
//! - K_i: attempted = successes + failures once a cell completes
//! - K_i: Aggregates see successful samples only
//! - B_i: Each generation may fail → recorded, never aborts the run
//! - I^B: Configuration errors and cancellation → abort the run

use crate::analysis::{mean, population_std_dev, SimilarityMatrix};
use crate::client::{Gateway, GatewayStats, Provider};
use crate::embedding::{embedder_from_config, EmbeddingCache, EmbeddingEngine, EmbeddingVector};
use crate::models::{
    AnalysisCell, AnalysisConfig, AnalysisError, CellMetrics, CellPhase, Config, ConfigError,
    GatewayError, GenerationFailure, PromptSpec, Result, SampleRecord, SpectraError,
};
use crate::validation::ValidatorRegistry;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failure kind recorded when a generated sample cannot be embedded.
pub const EMBEDDING_FAILURE_KIND: &str = "embedding";

/// Drives generation and per-cell aggregation.
///
/// Owns the gateway counters and the embedding cache; both are shared with
/// their consumers by `Arc` handle.
pub struct Orchestrator {
    gateway: Gateway,
    engine: EmbeddingEngine,
    validators: ValidatorRegistry,
    settings: AnalysisConfig,
    max_output_tokens: u32,
    /// Round-robin position across the rotation list
    rotation_index: AtomicUsize,
    cancel: CancellationToken,
    show_progress: bool,
}

impl Orchestrator {
    /// Create an orchestrator. An empty `settings.rotation` means "always the
    /// default model".
    pub fn new(
        gateway: Gateway,
        engine: EmbeddingEngine,
        validators: ValidatorRegistry,
        settings: AnalysisConfig,
    ) -> Self {
        Self {
            gateway,
            engine,
            validators,
            settings,
            max_output_tokens: crate::models::GatewayConfig::default().max_output_tokens,
            rotation_index: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
            show_progress: false,
        }
    }

    /// Wire everything from configuration around the given provider.
    ///
    /// B_i(config is valid) → Result
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn Provider>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let stats = Arc::new(GatewayStats::with_models(config.active_models()));
        let gateway = Gateway::from_config(config, provider, stats);
        let engine = EmbeddingEngine::new(
            embedder_from_config(config)?,
            Arc::new(EmbeddingCache::new()),
        );

        let mut settings = config.analysis.clone();
        settings.rotation = config.rotation();

        Ok(Self::new(gateway, engine, ValidatorRegistry::with_defaults(), settings)
            .with_max_output_tokens(config.gateway.max_output_tokens))
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Observe `token` in the sampling loop and in gateway backoffs.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.gateway = self.gateway.with_cancellation(token.clone());
        self.cancel = token;
        self
    }

    /// Show an `indicatif` progress bar over cells.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn gateway_stats(&self) -> &Arc<GatewayStats> {
        self.gateway.stats()
    }

    pub fn embedding_cache(&self) -> &Arc<EmbeddingCache> {
        self.engine.cache()
    }

    pub fn settings(&self) -> &AnalysisConfig {
        &self.settings
    }

    /// Next model: round-robin across the rotation, or the default model.
    fn select_model(&self) -> &str {
        if self.settings.use_rotation && !self.settings.rotation.is_empty() {
            let idx = self.rotation_index.fetch_add(1, Ordering::Relaxed);
            &self.settings.rotation[idx % self.settings.rotation.len()]
        } else {
            &self.settings.default_model
        }
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }

    /// Run every prompt at every temperature, in that order.
    pub async fn run(&self, prompts: &[PromptSpec]) -> Result<Vec<AnalysisCell>> {
        let start = Instant::now();
        let total = prompts.len() * self.settings.temperatures.len();

        info!(
            prompts = prompts.len(),
            temperatures = ?self.settings.temperatures,
            samples_per_prompt = self.settings.samples_per_prompt,
            rotation = self.settings.use_rotation,
            "Starting analysis"
        );

        let pb = self.progress_bar(total);
        let mut cells = Vec::with_capacity(total);

        for prompt in prompts {
            for &temperature in &self.settings.temperatures {
                pb.set_message(format!("{} @ {}", prompt.topic, temperature));
                let cell = match self.run_cell(prompt, temperature).await {
                    Ok(cell) => cell,
                    Err(e) => {
                        pb.abandon_with_message(format!("aborted: {e}"));
                        return Err(e);
                    }
                };
                cells.push(cell);
                pb.inc(1);
            }
        }

        pb.finish_with_message(format!("Done! {} cells", cells.len()));

        let cache = self.engine.cache_stats();
        info!(
            cells = cells.len(),
            requests = self.gateway.stats().total_requests(),
            cache_hit_rate = format!("{:.1}%", cache.hit_rate * 100.0),
            elapsed_secs = format!("{:.1}", start.elapsed().as_secs_f64()),
            "Analysis complete"
        );

        Ok(cells)
    }

    /// Sample and aggregate one (prompt, temperature) cell.
    pub async fn run_cell(&self, prompt: &PromptSpec, temperature: f64) -> Result<AnalysisCell> {
        let mut cell = AnalysisCell::new(prompt.clone(), temperature);
        let samples = self.settings.samples_per_prompt;

        debug!(
            topic = %prompt.topic,
            complexity = %prompt.complexity_label(),
            temperature = temperature,
            "Sampling cell"
        );
        cell.phase = CellPhase::Sampling;

        for sample_index in 1..=samples {
            if self.cancel.is_cancelled() {
                return Err(SpectraError::Cancelled);
            }
            let model_id = self.select_model().to_string();
            cell.attempted += 1;

            let generation = match self
                .gateway
                .generate(&prompt.text, &model_id, temperature, self.max_output_tokens)
                .await
            {
                Ok(generation) => generation,
                Err(GatewayError::Failed { source, .. }) => {
                    cell.failures.push(GenerationFailure {
                        model_id,
                        sample_index,
                        temperature,
                        error_kind: source.kind(),
                        message: source.to_string(),
                    });
                    continue;
                }
                Err(GatewayError::Cancelled) => return Err(SpectraError::Cancelled),
                Err(e) => return Err(e.into()),
            };

            let embedding = match self.engine.embed(&generation.text).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(model = %model_id, sample = sample_index, error = %e, "Embedding failed");
                    cell.failures.push(GenerationFailure {
                        model_id,
                        sample_index,
                        temperature,
                        error_kind: EMBEDDING_FAILURE_KIND.to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let validation =
                self.validators
                    .validate(&generation.text, &prompt.topic, &prompt.expected_kind);

            debug!(
                model = %model_id,
                sample = sample_index,
                of = samples,
                score = validation.score,
                cost = generation.cost,
                "Sample complete"
            );

            cell.samples.push(SampleRecord {
                sample_index,
                model_id,
                text: generation.text,
                usage: generation.usage,
                cost: generation.cost,
                latency_ms: generation.latency_ms,
                validation,
                embedding,
            });
        }

        cell.phase = CellPhase::Aggregating;
        cell.metrics = self.aggregate(&cell)?;
        cell.phase = CellPhase::Complete;

        info!(
            topic = %prompt.topic,
            temperature = temperature,
            successes = cell.success_count(),
            failures = cell.failure_count(),
            uniqueness = format!("{:.4}", cell.metrics.uniqueness),
            validation = format!("{:.4}", cell.metrics.avg_validation),
            avg_cost = format!("{:.4}", cell.metrics.avg_cost),
            "Cell complete"
        );

        Ok(cell)
    }

    /// Derive cell metrics from its successful samples.
    fn aggregate(&self, cell: &AnalysisCell) -> std::result::Result<CellMetrics, AnalysisError> {
        let embeddings: Vec<EmbeddingVector> =
            cell.samples.iter().map(|s| s.embedding.clone()).collect();
        let matrix = SimilarityMatrix::build(&embeddings)?;

        let costs: Vec<f64> = cell.samples.iter().map(|s| s.cost).collect();
        let scores: Vec<f64> = cell.samples.iter().map(|s| s.validation.score).collect();
        let latencies: Vec<f64> = cell.samples.iter().map(|s| s.latency_ms as f64).collect();

        let avg_cost = mean(&costs);
        let avg_validation = mean(&scores);
        let cost_efficiency = if avg_cost > 0.0 {
            avg_validation / avg_cost
        } else {
            0.0
        };
        let failure_rate = if cell.attempted > 0 {
            cell.failure_count() as f64 / cell.attempted as f64
        } else {
            0.0
        };

        Ok(CellMetrics {
            uniqueness: matrix.uniqueness(),
            duplicate_rate: matrix.duplicate_rate(self.settings.duplicate_threshold),
            avg_cost,
            total_cost: costs.iter().sum(),
            cost_efficiency,
            avg_validation,
            validation_std_dev: population_std_dev(&scores),
            failure_rate,
            avg_latency_ms: mean(&latencies).round() as u64,
            cluster_count: matrix.cluster(self.settings.cluster_threshold).len(),
            outliers: matrix
                .find_outliers(self.settings.outlier_threshold)
                .into_iter()
                .map(|o| o.index)
                .collect(),
            similarity: matrix.distribution_stats(),
            model_distribution: model_distribution(&cell.samples),
            quality_insights: self.quality_insights(cell),
        })
    }

    fn quality_insights(&self, cell: &AnalysisCell) -> Vec<String> {
        let mut insights = Vec::new();

        if cell.temperature > 1.0 {
            insights.push("High temperature may cause inconsistent outputs".to_string());
        } else if cell.temperature < 0.3 {
            insights.push("Low temperature may reduce creativity".to_string());
        }

        if cell.samples.is_empty() {
            insights.push("No successful samples; metrics are empty".to_string());
            return insights;
        }

        let n = cell.samples.len() as f64;
        match self.validators.get(cell.topic()).topic() {
            "math" => {
                let accuracy = cell.samples.iter().map(|s| s.validation.score).sum::<f64>() / n;
                if accuracy < 0.6 {
                    insights.push("Mathematical accuracy below expected threshold".to_string());
                }
            }
            "puzzle" => {
                let passed = cell.samples.iter().filter(|s| s.validation.is_valid).count();
                if (passed as f64) < n * 0.3 {
                    insights.push("Complex puzzle generation shows high failure rate".to_string());
                }
            }
            "language" => {
                let avg_length = cell
                    .samples
                    .iter()
                    .map(|s| s.text.chars().count() as f64)
                    .sum::<f64>()
                    / n;
                if avg_length < 50.0 {
                    insights.push("Language outputs may be too brief".to_string());
                }
            }
            _ => {}
        }

        let mut by_model: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for sample in &cell.samples {
            by_model
                .entry(sample.model_id.as_str())
                .or_default()
                .push(sample.validation.score);
        }
        let mut best: Option<(&str, f64)> = None;
        for (&model, scores) in &by_model {
            let avg = mean(scores);
            if avg > best.map_or(0.0, |(_, s)| s) {
                best = Some((model, avg));
            }
        }
        if let Some((model, _)) = best {
            insights.push(format!(
                "{model} showed best performance for {}",
                cell.topic()
            ));
        }

        insights
    }
}

/// Share of successful samples per model, in percent with one decimal.
fn model_distribution(samples: &[SampleRecord]) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for sample in samples {
        *counts.entry(sample.model_id.clone()).or_default() += 1;
    }
    let total = samples.len() as f64;
    counts
        .into_iter()
        .map(|(model, count)| {
            let pct = (count as f64 / total * 1000.0).round() / 10.0;
            (model, pct)
        })
        .collect()
}
