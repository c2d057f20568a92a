//! Error types for spectra.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (bad config, bad input, bad response)
//! - I^B materialized: Provider failures (network, timeout, overload)
//! - K_i violated: Internal invariant violations (bugs)

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for spectra.
///
/// Only errors that must abort a run end up here. Per-sample provider
/// failures are recorded on the cell instead (see [`GenerationError`]).
#[derive(Debug, Error)]
pub enum SpectraError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — Belief proven wrong (expected failures)
    // ═══════════════════════════════════════════════════════════════════
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — Bounded ignorance became known-bad
    // ═══════════════════════════════════════════════════════════════════
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Run cancelled")]
    Cancelled,

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED — Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpectraError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A single failed provider call.
///
/// K_i: Every failure maps onto exactly one reported kind.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Reported failure kind: `http_<status>`, `timeout`, `network` or `unknown`.
    pub fn kind(&self) -> String {
        match self {
            Self::Http { status, .. } => format!("http_{status}"),
            Self::Timeout(_) => "timeout".to_string(),
            Self::Network(_) => "network".to_string(),
            Self::InvalidResponse(_) | Self::Unknown(_) => "unknown".to_string(),
        }
    }

    /// Check if this error is worth another attempt.
    ///
    /// Only timeouts and upstream overload are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http { status, .. } => is_overload_status(*status),
            _ => false,
        }
    }
}

/// Upstream overload statuses (529 overloaded, 503 unavailable).
pub fn is_overload_status(status: u16) -> bool {
    matches!(status, 503 | 529)
}

/// Errors surfaced by the generation gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{model} failed after {attempts} attempt(s): {source}")]
    Failed {
        model: String,
        attempts: u32,
        #[source]
        source: GenerationError,
    },

    #[error("No cost rate configured for model '{0}'")]
    MissingRate(String),

    #[error("No provider route configured for model '{0}'")]
    UnknownModel(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Configuration errors and cancellation abort a run; failed calls do not.
    pub fn aborts_run(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Embedding backend errors.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Request(String),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Expected embedding dimension {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Similarity analysis errors.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Embedding {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Result type alias for spectra.
pub type Result<T> = std::result::Result<T, SpectraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_kinds() {
        let http = GenerationError::Http {
            status: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(http.kind(), "http_429");
        assert_eq!(
            GenerationError::Timeout(Duration::from_secs(60)).kind(),
            "timeout"
        );
        assert_eq!(GenerationError::Network("dns".to_string()).kind(), "network");
        assert_eq!(
            GenerationError::InvalidResponse("no choices".to_string()).kind(),
            "unknown"
        );
    }

    #[test]
    fn test_only_timeout_and_overload_are_transient() {
        assert!(GenerationError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(GenerationError::Http {
            status: 529,
            message: String::new()
        }
        .is_transient());
        assert!(GenerationError::Http {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!GenerationError::Http {
            status: 401,
            message: String::new()
        }
        .is_transient());
        assert!(!GenerationError::Network("refused".to_string()).is_transient());
    }

    #[test]
    fn test_gateway_error_abort_classes() {
        assert!(GatewayError::MissingRate("gpt-4".to_string()).aborts_run());
        assert!(GatewayError::Cancelled.aborts_run());
        assert!(!GatewayError::Failed {
            model: "gpt-4".to_string(),
            attempts: 3,
            source: GenerationError::Timeout(Duration::from_secs(60)),
        }
        .aborts_run());
    }
}
