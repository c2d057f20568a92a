//! Provider contract behind the generation gateway.

use crate::models::{GenerationError, TokenUsage};
use async_trait::async_trait;

/// One generation request as seen by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub prompt: String,
    pub model_id: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// Provider reply for a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub text: String,
    /// `None` when the provider sent no usage metadata
    pub usage: Option<TokenUsage>,
    pub latency_ms: u64,
}

/// A backend able to complete prompts for some set of model ids.
///
/// Implementations make exactly one attempt per call; retries belong to the
/// gateway.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, request: &ProviderRequest)
        -> Result<ProviderResponse, GenerationError>;

    /// Whether a route exists for `model_id`.
    fn supports(&self, _model_id: &str) -> bool {
        true
    }
}
