//! HTTP provider for every configured model route.
//!
//! Epistemic foundation:
//! - K_i: Each route speaks one of the known shapes
//! - B_i: API will respond within timeout (might fail)
//! - B_i: Response will be valid JSON (might fail)
//! - I^B: Network availability unknowable → classified error, gateway decides

use crate::client::{Provider, ProviderRequest, ProviderResponse};
use crate::models::{expand_headers, Config, ConfigError, GenerationError, ModelRoute};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// API error response (OpenAI and Anthropic both nest a message).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// A model route with credentials resolved.
#[derive(Debug, Clone)]
struct ResolvedRoute {
    route: ModelRoute,
    api_key: Option<String>,
    headers: HeaderMap,
}

/// Provider that speaks HTTP to every configured model route.
///
/// Features:
/// - Per-model shape dispatch (chat completion, messages, generate content)
/// - Shape-specific authentication
/// - Custom headers with `${ENV_VAR}` expansion
/// - Error classification into reported failure kinds
pub struct HttpProvider {
    client: reqwest::Client,
    routes: HashMap<String, ResolvedRoute>,
    timeout: Duration,
}

impl HttpProvider {
    /// Build a provider for all `[[models]]` in the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingApiKey` if a route names an unset key variable.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.gateway.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        let mut routes = HashMap::new();
        for route in &config.models {
            let api_key = Config::resolve_api_key(route)?;
            routes.insert(
                route.id.clone(),
                ResolvedRoute {
                    route: route.clone(),
                    api_key,
                    headers: header_map(&expand_headers(&route.headers)),
                },
            );
        }

        Ok(Self {
            client,
            routes,
            timeout,
        })
    }

    /// Configured model ids.
    pub fn model_ids(&self) -> Vec<&str> {
        self.routes.keys().map(|s| s.as_str()).collect()
    }

    fn classify(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else if e.is_connect() || e.is_request() {
            GenerationError::Network(e.to_string())
        } else {
            GenerationError::Unknown(e.to_string())
        }
    }
}

fn header_map(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (key, value) in headers {
        if let (Ok(name), Ok(val)) = (
            HeaderName::try_from(key.as_str()),
            HeaderValue::from_str(value),
        ) {
            map.insert(name, val);
        }
    }
    map
}

#[async_trait]
impl Provider for HttpProvider {
    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, GenerationError> {
        let resolved = self.routes.get(&request.model_id).ok_or_else(|| {
            GenerationError::Unknown(format!("no route for model '{}'", request.model_id))
        })?;
        let shape = resolved.route.shape;
        let start = Instant::now();

        let body = shape.request_body(resolved.route.upstream(), request);
        let builder = self
            .client
            .post(&resolved.route.url)
            .headers(resolved.headers.clone())
            .json(&body);
        let builder = shape.authorize(builder, resolved.api_key.as_deref());

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(GenerationError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = shape.parse_response(&text)?;
        let latency_ms = start.elapsed().as_millis() as u64;

        debug!(
            model = %request.model_id,
            shape = %shape,
            latency_ms = latency_ms,
            "Provider call succeeded"
        );

        Ok(ProviderResponse {
            text: parsed.text,
            usage: parsed.usage,
            latency_ms,
        })
    }

    fn supports(&self, model_id: &str) -> bool {
        self.routes.contains_key(model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiShape;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, shape: ApiShape, route_path: &str) -> Config {
        Config {
            gateway: Default::default(),
            models: vec![ModelRoute {
                id: "model-under-test".to_string(),
                shape,
                url: format!("{}{}", server.uri(), route_path),
                upstream_model: Some("upstream-name".to_string()),
                api_key: Some("secret".to_string()),
                api_key_env: None,
                headers: HashMap::new(),
            }],
            rates: Default::default(),
            analysis: Default::default(),
            embedding: Default::default(),
            output: Default::default(),
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            prompt: "Write a haiku about coding".to_string(),
            model_id: "model-under-test".to_string(),
            temperature: 0.3,
            max_output_tokens: 256,
        }
    }

    #[tokio::test]
    async fn test_chat_completion_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({"model": "upstream-name", "max_tokens": 256})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Bugs in the moonlight"}}],
                "usage": {"prompt_tokens": 6, "completion_tokens": 4, "total_tokens": 10}
            })))
            .mount(&server)
            .await;

        let provider = HttpProvider::from_config(&config_for(
            &server,
            ApiShape::ChatCompletion,
            "/v1/chat/completions",
        ))
        .unwrap();
        let response = provider.complete(&request()).await.unwrap();
        assert_eq!(response.text, "Bugs in the moonlight");
        assert_eq!(response.usage.unwrap().total, 10);
    }

    #[tokio::test]
    async fn test_messages_shape_uses_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "secret"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Silent semicolons"}]
            })))
            .mount(&server)
            .await;

        let provider =
            HttpProvider::from_config(&config_for(&server, ApiShape::Messages, "/v1/messages"))
                .unwrap();
        let response = provider.complete(&request()).await.unwrap();
        assert_eq!(response.text, "Silent semicolons");
        assert!(response.usage.is_none());
    }

    #[tokio::test]
    async fn test_generate_content_uses_query_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini:generateContent"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Compile, then rest"}]}}]
            })))
            .mount(&server)
            .await;

        let provider = HttpProvider::from_config(&config_for(
            &server,
            ApiShape::GenerateContent,
            "/v1beta/models/gemini:generateContent",
        ))
        .unwrap();
        let response = provider.complete(&request()).await.unwrap();
        assert_eq!(response.text, "Compile, then rest");
    }

    #[tokio::test]
    async fn test_http_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(json!({
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let provider =
            HttpProvider::from_config(&config_for(&server, ApiShape::Messages, "/v1/messages"))
                .unwrap();
        let err = provider.complete(&request()).await.unwrap_err();
        assert_eq!(err.kind(), "http_529");
        assert!(err.is_transient());
        assert!(err.to_string().contains("Overloaded"));
    }

    #[tokio::test]
    async fn test_unknown_model_is_not_supported() {
        let server = MockServer::start().await;
        let provider =
            HttpProvider::from_config(&config_for(&server, ApiShape::Messages, "/v1/messages"))
                .unwrap();
        assert!(provider.supports("model-under-test"));
        assert!(!provider.supports("gpt-5"));
    }
}
