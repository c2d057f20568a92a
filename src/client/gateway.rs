//! Generation gateway: one contract over every provider, with bounded retries.
//!
//! Epistemic foundation:
//! - K_i: Cost = (total tokens / 1000) × configured rate
//! - B_i: Provider answers within the call timeout (might not) → Result
//! - I^B: Transient failures (timeout, overload) → retry with 2^attempt backoff
//! - I^B: Anything else → fail immediately, caller records it

use crate::client::{GatewayStats, Provider, ProviderRequest};
use crate::models::{
    Config, GatewayConfig, GatewayError, GenerationError, GenerationResult, TokenUsage,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry and timeout settings for the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, first included
    pub max_attempts: u32,
    /// Attempt `n` (1-based) waits `backoff_unit * 2^n` before the next one
    pub backoff_unit: Duration,
    /// Bound on a single provider call
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for RetryPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_unit: Duration::from_millis(config.backoff_unit_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Generation gateway.
///
/// Features:
/// - Provider-agnostic `generate` contract
/// - Retry with exponential backoff on transient failures only
/// - Usage estimation when the provider reports none
/// - Cost from the static rate table
/// - Per-model request/error counters in a shared [`GatewayStats`]
/// - Cancellable backoff
pub struct Gateway {
    provider: Arc<dyn Provider>,
    /// USD per 1K tokens
    rates: BTreeMap<String, f64>,
    stats: Arc<GatewayStats>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        provider: Arc<dyn Provider>,
        rates: BTreeMap<String, f64>,
        stats: Arc<GatewayStats>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            rates,
            stats,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a gateway using the configured rates and retry policy.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn Provider>,
        stats: Arc<GatewayStats>,
    ) -> Self {
        Self::new(
            provider,
            config.rates.clone(),
            stats,
            RetryPolicy::from(&config.gateway),
        )
    }

    /// Observe `token`: once cancelled, in-flight calls and backoffs stop.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Configured rate for a model.
    pub fn rate(&self, model_id: &str) -> Result<f64, GatewayError> {
        self.rates
            .get(model_id)
            .copied()
            .ok_or_else(|| GatewayError::MissingRate(model_id.to_string()))
    }

    /// Cost of a generation: `(total / 1000) × rate`.
    pub fn cost(&self, model_id: &str, usage: &TokenUsage) -> Result<f64, GatewayError> {
        Ok(usage.total as f64 / 1000.0 * self.rate(model_id)?)
    }

    /// Generate a completion.
    ///
    /// B_i(provider succeeds within max_attempts) → Result
    /// I^B(timeout, overload) → backoff 2^attempt × unit, retry
    pub async fn generate(
        &self,
        prompt: &str,
        model_id: &str,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<GenerationResult, GatewayError> {
        let rate = self.rate(model_id)?;
        if !self.provider.supports(model_id) {
            return Err(GatewayError::UnknownModel(model_id.to_string()));
        }

        let request = ProviderRequest {
            prompt: prompt.to_string(),
            model_id: model_id.to_string(),
            temperature,
            max_output_tokens,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            self.stats.record_request(model_id);

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(GatewayError::Cancelled),
                outcome = tokio::time::timeout(self.policy.timeout, self.provider.complete(&request)) => outcome,
            };
            let result = outcome
                .unwrap_or_else(|_| Err(GenerationError::Timeout(self.policy.timeout)));

            match result {
                Ok(response) => {
                    let usage = response
                        .usage
                        .unwrap_or_else(|| TokenUsage::estimate(prompt, &response.text));
                    let cost = usage.total as f64 / 1000.0 * rate;

                    return Ok(GenerationResult {
                        text: response.text,
                        model_id: model_id.to_string(),
                        usage,
                        cost,
                        latency_ms: response.latency_ms,
                    });
                }
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let backoff = self.policy.backoff(attempt);
                    debug!(
                        model = %model_id,
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        backoff_secs = backoff.as_secs_f64(),
                        error = %e,
                        "Retrying after transient error"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(GatewayError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(e) => {
                    self.stats.record_error(model_id);
                    warn!(
                        model = %model_id,
                        attempts = attempt,
                        kind = %e.kind(),
                        error = %e,
                        "Generation failed"
                    );
                    return Err(GatewayError::Failed {
                        model: model_id.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
