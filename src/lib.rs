//! spectra - Uniqueness, quality and cost analysis of generative model outputs.
//!
//! ## Architecture
//!
//! A run samples every prompt at every temperature, several times, and folds
//! the outputs into per-cell metrics:
//! - **Gateway**: Provider-agnostic generation with retries and cost accounting
//! - **Embedding Engine**: Text → vector with a content-hash cache
//! - **Similarity Analyzer**: Pairwise cosine, uniqueness, clusters, outliers
//! - **Validators**: Topic-specific heuristic quality scores
//!
//! ## Flow
//!
//! Orchestrator → Gateway → Embedding Engine + Validator per sample
//! → Similarity Analyzer per cell → Report over all cells → JSON export
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced invariants (types, enums)
//! - B_i (Beliefs): Runtime fallible operations (Result, Option)
//! - I^R (Resolvable): User-configurable parameters
//! - I^B (Bounded): Network/API uncertainties (retry, backoff)

pub mod analysis;
pub mod client;
pub mod embedding;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod validation;

// Re-exports for convenience
pub use analysis::SimilarityMatrix;
pub use client::{Gateway, GatewayStats, HttpProvider, Provider};
pub use embedding::{Embedder, EmbeddingCache, EmbeddingEngine, EmbeddingVector};
pub use models::{AnalysisCell, Config, PromptSpec, Result, SpectraError};
pub use pipeline::{default_prompts, load_prompts, Orchestrator};
pub use report::{AnalysisReport, ExportConfig, ExportDocument};
pub use validation::{TopicValidator, ValidatorRegistry};
