//! Configuration models for spectra.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Top-level configuration for spectra.
///
/// I^R resolved: All configurable parameters are explicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gateway behaviour (timeouts, retries)
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Model routes, one per `[[models]]` entry
    #[serde(default)]
    pub models: Vec<ModelRoute>,

    /// Cost per 1K tokens (USD), keyed by model id
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,

    /// Sampling settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Embedding backend
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Export settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Generation gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum attempts per sample (first call included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit in milliseconds; attempt `n` waits `unit * 2^n`
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Output token limit sent with every request
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_max_output_tokens() -> u32 {
    1500
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_attempts: default_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// Request/response shape family spoken by a provider endpoint.
///
/// K_i: Every supported provider speaks exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiShape {
    /// `{model, messages, max_tokens, temperature}` → `choices[0].message.content`
    ChatCompletion,
    /// `{model, max_tokens, temperature, messages}` → `content[0].text`
    Messages,
    /// `{contents[].parts[], generationConfig}` → `candidates[0].content.parts[0].text`
    GenerateContent,
}

impl std::fmt::Display for ApiShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiShape::ChatCompletion => write!(f, "chat_completion"),
            ApiShape::Messages => write!(f, "messages"),
            ApiShape::GenerateContent => write!(f, "generate_content"),
        }
    }
}

/// Route for a single model id.
///
/// Adding a provider means adding one of these, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRoute {
    /// Model id used throughout the analysis (e.g. "gpt-4", "claude-3-sonnet")
    pub id: String,

    /// Shape family of the endpoint
    pub shape: ApiShape,

    /// Full endpoint URL
    pub url: String,

    /// Model name sent upstream (defaults to `id`)
    #[serde(default)]
    pub upstream_model: Option<String>,

    /// API key (supports `${ENV_VAR}` expansion)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Extra headers; values support `${ENV_VAR}` expansion
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ModelRoute {
    /// Model name sent to the provider.
    pub fn upstream(&self) -> &str {
        self.upstream_model.as_deref().unwrap_or(&self.id)
    }
}

/// Sampling orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Temperatures to sample at
    #[serde(default = "default_temperatures")]
    pub temperatures: Vec<f64>,

    /// Samples per (prompt, temperature) cell
    #[serde(default = "default_samples_per_prompt")]
    pub samples_per_prompt: usize,

    /// Round-robin across `rotation` instead of always using `default_model`
    #[serde(default = "default_true")]
    pub use_rotation: bool,

    /// Similarity above which two outputs count as duplicates
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,

    /// Keep failure records in the export
    #[serde(default = "default_true")]
    pub include_failure_analysis: bool,

    /// Model used when rotation is disabled
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Rotation order (empty = every configured model, in declaration order)
    #[serde(default)]
    pub rotation: Vec<String>,

    /// Similarity to a cluster seed required to join it
    #[serde(default = "default_duplicate_threshold")]
    pub cluster_threshold: f64,

    /// Mean similarity below which an output is an outlier
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold: f64,
}

fn default_temperatures() -> Vec<f64> {
    vec![0.3, 0.7, 1.0]
}

fn default_samples_per_prompt() -> usize {
    5
}

fn default_duplicate_threshold() -> f64 {
    0.75
}

fn default_outlier_threshold() -> f64 {
    0.5
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            temperatures: default_temperatures(),
            samples_per_prompt: default_samples_per_prompt(),
            use_rotation: true,
            duplicate_threshold: default_duplicate_threshold(),
            include_failure_analysis: true,
            default_model: default_model(),
            rotation: Vec::new(),
            cluster_threshold: default_duplicate_threshold(),
            outlier_threshold: default_outlier_threshold(),
        }
    }
}

/// Embedding backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Offline feature-hashing embedder (default)
    #[default]
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint
    Remote,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Vector dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Endpoint URL (remote backend only)
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Embedding model name (remote backend only)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_dimension() -> usize {
    384
}

fn default_embedding_url() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            dimension: default_dimension(),
            url: default_embedding_url(),
            model: default_embedding_model(),
            api_key: None,
            api_key_env: None,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Export file path
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Pretty-print the JSON export
    #[serde(default = "default_true")]
    pub pretty: bool,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("spectra_results.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            pretty: true,
        }
    }
}

/// Example configuration printed by `spectra example`.
pub const EXAMPLE_CONFIG: &str = r#"# spectra configuration file

[gateway]
timeout_secs = 60
max_attempts = 3
backoff_unit_ms = 1000
max_output_tokens = 1500

[[models]]
id = "gpt-4"
shape = "chat_completion"
url = "https://api.openai.com/v1/chat/completions"
api_key_env = "OPENAI_API_KEY"

[[models]]
id = "claude-3-sonnet"
shape = "messages"
url = "https://api.anthropic.com/v1/messages"
upstream_model = "claude-3-5-sonnet-20241022"
api_key_env = "ANTHROPIC_API_KEY"
headers = { "anthropic-version" = "2023-06-01" }

[[models]]
id = "gemini-pro"
shape = "generate_content"
url = "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
api_key_env = "GOOGLE_API_KEY"

[[models]]
id = "deepseek"
shape = "chat_completion"
url = "https://api.deepseek.com/v1/chat/completions"
upstream_model = "deepseek-chat"
api_key_env = "DEEPSEEK_API_KEY"

# USD per 1K tokens
[rates]
"gpt-4" = 0.03
"claude-3-sonnet" = 0.015
"gemini-pro" = 0.001
"deepseek" = 0.0014

[analysis]
temperatures = [0.3, 0.7, 1.0]
samples_per_prompt = 5
use_rotation = true
duplicate_threshold = 0.75
include_failure_analysis = true
default_model = "gpt-4"
# rotation = ["gpt-4", "deepseek"]

[embedding]
backend = "hash"
dimension = 384
# backend = "remote"
# url = "https://api.openai.com/v1/embeddings"
# model = "text-embedding-3-small"
# api_key_env = "OPENAI_API_KEY"

[output]
path = "spectra_results.json"
pretty = true
"#;

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Look up a model route by id.
    pub fn route(&self, model_id: &str) -> Option<&ModelRoute> {
        self.models.iter().find(|m| m.id == model_id)
    }

    /// Models the orchestrator rotates through.
    pub fn rotation(&self) -> Vec<String> {
        if self.analysis.rotation.is_empty() {
            self.models.iter().map(|m| m.id.clone()).collect()
        } else {
            self.analysis.rotation.clone()
        }
    }

    /// Models that will actually be called with the current settings.
    pub fn active_models(&self) -> Vec<String> {
        if self.analysis.use_rotation {
            self.rotation()
        } else {
            vec![self.analysis.default_model.clone()]
        }
    }

    /// Resolve the API key for a model route.
    ///
    /// B_i(api key available) → Result
    /// `Ok(None)` means the route needs no key.
    pub fn resolve_api_key(route: &ModelRoute) -> Result<Option<String>, ConfigError> {
        resolve_key(&route.id, route.api_key.as_deref(), route.api_key_env.as_deref())
    }

    /// Resolve the API key for the remote embedding backend.
    pub fn resolve_embedding_api_key(&self) -> Result<Option<String>, ConfigError> {
        resolve_key(
            "embedding",
            self.embedding.api_key.as_deref(),
            self.embedding.api_key_env.as_deref(),
        )
    }

    /// Validate ranges, model references and cost rates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid(
                "no [[models]] configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "model '{}' is declared twice",
                    model.id
                )));
            }
        }

        let analysis = &self.analysis;
        if analysis.samples_per_prompt == 0 {
            return Err(ConfigError::Invalid(
                "samples_per_prompt must be greater than 0".to_string(),
            ));
        }
        if analysis.temperatures.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one temperature is required".to_string(),
            ));
        }
        if let Some(t) = analysis
            .temperatures
            .iter()
            .find(|t| !t.is_finite() || **t < 0.0)
        {
            return Err(ConfigError::Invalid(format!("invalid temperature {t}")));
        }
        for (name, value) in [
            ("duplicate_threshold", analysis.duplicate_threshold),
            ("cluster_threshold", analysis.cluster_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }
        if self.gateway.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        for model_id in self.active_models() {
            if self.route(&model_id).is_none() {
                return Err(ConfigError::UnknownModel(model_id));
            }
            match self.rates.get(&model_id) {
                Some(rate) if rate.is_finite() && *rate >= 0.0 => {}
                Some(rate) => {
                    return Err(ConfigError::Invalid(format!(
                        "rate for '{model_id}' must be a non-negative number, got {rate}"
                    )))
                }
                None => return Err(ConfigError::MissingRate(model_id)),
            }
        }

        Ok(())
    }
}

fn resolve_key(
    owner: &str,
    api_key: Option<&str>,
    api_key_env: Option<&str>,
) -> Result<Option<String>, ConfigError> {
    if let Some(key) = api_key {
        return Ok(Some(expand_env_vars(key)));
    }

    if let Some(env_var) = api_key_env {
        return std::env::var(env_var)
            .map(Some)
            .map_err(|_| ConfigError::MissingApiKey {
                owner: owner.to_string(),
                env_var: env_var.to_string(),
            });
    }

    // No key configured (valid for local endpoints)
    Ok(None)
}

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    for cap in ENV_VAR_RE.captures_iter(s) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Expand environment variables in all headers.
pub fn expand_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.clone(), expand_env_vars(v)))
        .collect()
}

/// Configuration errors.
///
/// Epistemic origin:
/// - B_i falsified: File not found, parse error, out-of-range values
/// - I^B materialized: Missing required values (keys, rates)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key for '{owner}': set {env_var} env var or api_key in config")]
    MissingApiKey { owner: String, env_var: String },

    #[error("No cost rate for model '{0}': add it to [rates]")]
    MissingRate(String),

    #[error("Model '{0}' is referenced but not declared in [[models]]")]
    UnknownModel(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
