//! Embedding engine: backend plus content-addressed cache.

use crate::embedding::{
    cache_key, normalize_text, CacheStats, Embedder, EmbeddingCache, EmbeddingVector,
};
use crate::models::EmbeddingError;
use std::sync::Arc;
use tracing::debug;

/// Text → vector, served from the cache when the normalized text was seen.
///
/// Features:
/// - Deterministic for equal normalized text
/// - Empty text → zero vector without touching the backend
/// - Dimension check on every backend result
#[derive(Clone)]
pub struct EmbeddingEngine {
    embedder: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
}

impl EmbeddingEngine {
    pub fn new(embedder: Arc<dyn Embedder>, cache: Arc<EmbeddingCache>) -> Self {
        Self { embedder, cache }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Embed one text.
    ///
    /// B_i(backend answers with the right dimension) → Result
    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        let key = cache_key(text);
        if let Some(vector) = self.cache.get(&key) {
            return Ok(vector);
        }

        let normalized = normalize_text(text);
        let vector = if normalized.is_empty() {
            EmbeddingVector::zeros(self.dimension())
        } else {
            let values = self.embedder.embed(&normalized).await?;
            if values.len() != self.dimension() {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension(),
                    actual: values.len(),
                });
            }
            EmbeddingVector::from(values)
        };

        debug!(
            backend = %self.embedder.name(),
            chars = normalized.len(),
            "Embedding cached"
        );
        Ok(self.cache.insert(key, vector))
    }

    /// Embed each text in input order.
    pub async fn batch_embed<S: AsRef<str>>(
        &self,
        texts: &[S],
    ) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text.as_ref()).await?);
        }
        Ok(vectors)
    }
}
