//! Embedding engine and backends.

mod cache;
mod engine;
mod hash;
mod remote;
mod vector;

pub use cache::*;
pub use engine::*;
pub use hash::*;
pub use remote::*;
pub use vector::*;

use crate::models::{Config, ConfigError, EmbeddingBackend, EmbeddingError};
use async_trait::async_trait;
use std::sync::Arc;

/// A backend that maps text to a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimension(&self) -> usize;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Build the configured embedding backend.
pub fn embedder_from_config(config: &Config) -> Result<Arc<dyn Embedder>, ConfigError> {
    Ok(match config.embedding.backend {
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(config.embedding.dimension)),
        EmbeddingBackend::Remote => Arc::new(RemoteEmbedder::from_config(config)?),
    })
}
