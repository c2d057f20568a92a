//! Request/response shapes for the supported provider families.
//!
//! Epistemic foundation:
//! - K_i: Three wire shapes cover every configured provider
//! - B_i: Response body matches the declared shape (might not) → Result
//! - I^R: Which model speaks which shape is configuration

use crate::client::ProviderRequest;
use crate::models::{ApiShape, GenerationError, TokenUsage};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Message in a chat-style request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// ─── chat_completion ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: Option<u32>,
}

// ─── messages ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ─── generate_content ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    total_token_count: Option<u32>,
}

/// Text and usage extracted from a provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCompletion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

fn usage_with_total(input: u32, output: u32, total: Option<u32>) -> TokenUsage {
    let mut usage = TokenUsage::new(input, output);
    if let Some(total) = total {
        usage.total = total;
    }
    usage
}

fn non_empty(text: Option<String>, shape: ApiShape) -> Result<String, GenerationError> {
    text.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            GenerationError::InvalidResponse(format!("no text in {shape} response"))
        })
}

impl ApiShape {
    /// Build the JSON request body for this shape.
    pub fn request_body(&self, upstream_model: &str, request: &ProviderRequest) -> serde_json::Value {
        let messages = vec![Message::user(&request.prompt)];
        let body = match self {
            ApiShape::ChatCompletion => serde_json::to_value(ChatCompletionRequest {
                model: upstream_model,
                messages,
                max_tokens: request.max_output_tokens,
                temperature: request.temperature,
            }),
            ApiShape::Messages => serde_json::to_value(MessagesRequest {
                model: upstream_model,
                max_tokens: request.max_output_tokens,
                temperature: request.temperature,
                messages,
            }),
            ApiShape::GenerateContent => serde_json::to_value(GenerateContentRequest {
                contents: vec![Content {
                    parts: vec![Part {
                        text: Some(request.prompt.clone()),
                    }],
                }],
                generation_config: GenerationSettings {
                    temperature: request.temperature,
                    max_output_tokens: request.max_output_tokens,
                },
            }),
        };
        // Plain structs of strings and numbers always serialize
        body.unwrap_or(serde_json::Value::Null)
    }

    /// Parse a successful response body for this shape.
    pub fn parse_response(&self, body: &str) -> Result<ParsedCompletion, GenerationError> {
        let invalid =
            |e: serde_json::Error| GenerationError::InvalidResponse(format!("{self} body: {e}"));

        match self {
            ApiShape::ChatCompletion => {
                let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(invalid)?;
                let text = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content);
                Ok(ParsedCompletion {
                    text: non_empty(text, *self)?,
                    usage: parsed.usage.map(|u| {
                        usage_with_total(u.prompt_tokens, u.completion_tokens, u.total_tokens)
                    }),
                })
            }
            ApiShape::Messages => {
                let parsed: MessagesResponse = serde_json::from_str(body).map_err(invalid)?;
                let text = parsed.content.into_iter().next().and_then(|b| b.text);
                Ok(ParsedCompletion {
                    text: non_empty(text, *self)?,
                    usage: parsed
                        .usage
                        .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
                })
            }
            ApiShape::GenerateContent => {
                let parsed: GenerateContentResponse =
                    serde_json::from_str(body).map_err(invalid)?;
                let text = parsed
                    .candidates
                    .into_iter()
                    .next()
                    .and_then(|c| c.content)
                    .and_then(|c| c.parts.into_iter().next())
                    .and_then(|p| p.text);
                Ok(ParsedCompletion {
                    text: non_empty(text, *self)?,
                    usage: parsed.usage_metadata.map(|u| {
                        usage_with_total(
                            u.prompt_token_count,
                            u.candidates_token_count,
                            u.total_token_count,
                        )
                    }),
                })
            }
        }
    }

    /// Attach credentials the way this shape's providers expect them.
    pub fn authorize(&self, builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
        match (self, api_key) {
            (ApiShape::ChatCompletion, Some(key)) => builder.bearer_auth(key),
            (ApiShape::Messages, Some(key)) => builder
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            (ApiShape::Messages, None) => builder.header("anthropic-version", ANTHROPIC_VERSION),
            (ApiShape::GenerateContent, Some(key)) => builder.query(&[("key", key)]),
            (_, None) => builder,
        }
    }
}
