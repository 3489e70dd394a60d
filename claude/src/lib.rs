//! Minimal Anthropic Claude Messages API client.
//!
//! This crate provides a focused, non-streaming client for Claude's
//! Messages API. It supports exactly what a turn-based conversation
//! orchestrator needs: one prompt in, one text reply out.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Errors that can occur when using the Claude client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Claude API client.
#[derive(Clone)]
pub struct Claude {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Claude {
    /// Create a new Claude client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a Claude client from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send a completion request and return the full response.
    pub async fn complete(&self, request: Request) -> Result<Response, Error> {
        let api_request = self.build_api_request(&request);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/messages"))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(Response::from_api(api_response))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|_| Error::NoApiKey)?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_api_request(&self, request: &Request) -> ApiRequest {
        ApiRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
        }
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request to send to Claude.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
}

impl Request {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            system: None,
            messages,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A text message in the conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A completion response from Claude.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: String,
    pub model: String,
    pub content: Vec<String>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl Response {
    /// Get all text content concatenated.
    pub fn text(&self) -> String {
        self.content.join("")
    }

    fn from_api(api: ApiResponse) -> Self {
        let content = api
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiContent::Text { text } => Some(text),
                ApiContent::Other => None,
            })
            .collect();

        let stop_reason = match api.stop_reason.as_deref() {
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        };

        Self {
            id: api.id,
            model: api.model,
            content,
            stop_reason,
            usage: Usage {
                input_tokens: api.usage.input_tokens,
                output_tokens: api.usage.output_tokens,
            },
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

/// Token usage information.
#[derive(Debug, Clone)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    id: String,
    model: String,
    content: Vec<ApiContent>,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ApiContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: usize,
    output_tokens: usize,
}
