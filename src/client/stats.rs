//! Per-model request and error counters for the gateway.
//!
//! K_i: Requests count every attempt; errors count only final failures.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    requests: u64,
    errors: u64,
}

/// Shared request/error counters, keyed by model id.
///
/// Owned by the orchestrator and handed to the gateway as `Arc<GatewayStats>`.
#[derive(Debug, Default)]
pub struct GatewayStats {
    models: DashMap<String, Counters>,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with zeroed counters for the given models.
    pub fn with_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stats = Self::new();
        for model in models {
            stats.models.entry(model.into()).or_default();
        }
        stats
    }

    /// Count one attempt.
    pub fn record_request(&self, model: &str) {
        self.models.entry(model.to_string()).or_default().requests += 1;
    }

    /// Count one final failure.
    pub fn record_error(&self, model: &str) {
        self.models.entry(model.to_string()).or_default().errors += 1;
    }

    pub fn requests(&self, model: &str) -> u64 {
        self.models.get(model).map(|c| c.requests).unwrap_or(0)
    }

    pub fn errors(&self, model: &str) -> u64 {
        self.models.get(model).map(|c| c.errors).unwrap_or(0)
    }

    pub fn total_requests(&self) -> u64 {
        self.models.iter().map(|c| c.requests).sum()
    }

    /// Point-in-time copy of every model's counters.
    pub fn snapshot(&self) -> BTreeMap<String, ModelStats> {
        self.models
            .iter()
            .map(|entry| {
                let c = *entry.value();
                let error_rate = if c.requests > 0 {
                    c.errors as f64 / c.requests as f64
                } else {
                    0.0
                };
                (
                    entry.key().clone(),
                    ModelStats {
                        requests: c.requests,
                        errors: c.errors,
                        error_rate,
                    },
                )
            })
            .collect()
    }

    /// Zero every counter, keeping the known models.
    pub fn reset(&self) {
        for mut entry in self.models.iter_mut() {
            *entry.value_mut() = Counters::default();
        }
    }
}

/// Counters for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub requests: u64,
    pub errors: u64,
    pub error_rate: f64,
}
