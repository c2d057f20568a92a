//! OpenAI-compatible `/embeddings` backend.
//!
//! Epistemic foundation:
//! - B_i: Endpoint returns one vector of the configured dimension (might not)
//! - I^B: Network availability → EmbeddingError, the sample is recorded as failed

use crate::embedding::Embedder;
use crate::models::{Config, ConfigError, EmbeddingError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// HTTP embedder for OpenAI-compatible endpoints.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl RemoteEmbedder {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
            api_key,
            dimension,
        })
    }

    /// Build from the `[embedding]` section.
    ///
    /// B_i(api key available) → Result
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let embedding = &config.embedding;
        Self::new(
            embedding.url.clone(),
            embedding.model.clone(),
            config.resolve_embedding_api_key()?,
            embedding.dimension,
            Duration::from_secs(config.gateway.timeout_secs),
        )
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut builder = self.client.post(&self.url).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimension,
        });
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(EmbeddingError::Request(format!(
                "HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty data array".to_string()))?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        debug!(model = %self.model, dim = vector.len(), "Remote embedding received");
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
