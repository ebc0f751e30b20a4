//! Qianfan API client: chat completion and text-to-image.
//!
//! Provides a unified interface for the wenxinworkshop endpoints with
//! consistent request/response formats. The [`QianfanApi`] trait is the seam
//! the command handlers (and their tests) consume; [`QianfanClient`] is the
//! reqwest implementation.

#![warn(clippy::all)]

mod qianfan;

pub use qianfan::QianfanClient;

use async_trait::async_trait;
use qianfan_common::config::{ChatModel, ImageStyle, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use serde::{Deserialize, Serialize};

// ============================================================================
// Client Trait
// ============================================================================

/// Unified interface for the Qianfan platform APIs.
#[async_trait]
pub trait QianfanApi: Send + Sync {
    /// Send a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ClientError>;

    /// Send a text-to-image request.
    async fn imagine(&self, request: ImageRequest) -> Result<ImageResponse, ClientError>;
}

/// Error from the API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Error reported inside a 200 body (`error_code` / `error_msg`)
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Access-token acquisition failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Response body did not match the expected shape
    #[error("malformed response: {0}")]
    Parse(String),
}

// ============================================================================
// Message Types
// ============================================================================

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant (model) response
    Assistant,
}

impl Role {
    /// Convert to string representation for database storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse from string representation.
    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            _ => Self::User,
        }
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Sampling Parameters
// ============================================================================

/// Sampling controls for a chat request.
///
/// The remote API treats `temperature` and `top_p` as mutually exclusive
/// tuning knobs, so at most one is transmitted. Fields left as `None` are
/// omitted from the wire body entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

impl SamplingParams {
    /// Resolve configured values into at most one transmitted override.
    ///
    /// If `temperature` differs from its default (0.95), only `temperature`
    /// is sent; else if `top_p` differs from its default (0.8), only `top_p`
    /// is sent; else neither is sent and API defaults apply.
    pub fn resolve(temperature: f64, top_p: f64) -> Self {
        if (temperature - DEFAULT_TEMPERATURE).abs() > f64::EPSILON {
            Self {
                temperature: Some(temperature),
                top_p: None,
            }
        } else if (top_p - DEFAULT_TOP_P).abs() > f64::EPSILON {
            Self {
                temperature: None,
                top_p: Some(top_p),
            }
        } else {
            Self {
                temperature: None,
                top_p: None,
            }
        }
    }
}

// ============================================================================
// Chat Request/Response
// ============================================================================

/// Unified chat request.
///
/// `model` and `endpoint` select the API route; the remaining fields form
/// the request body. A non-empty `endpoint` takes priority over the model's
/// standard route.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: ChatModel,
    pub endpoint: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
    pub penalty_score: Option<f64>,
    pub system: Option<String>,
    pub user_id: Option<String>,
}

impl ChatRequest {
    /// A bare request with the given messages and no overrides.
    pub fn new(model: ChatModel, messages: Vec<ChatMessage>) -> Self {
        Self {
            model,
            endpoint: None,
            messages,
            sampling: SamplingParams::default(),
            penalty_score: None,
            system: None,
            user_id: None,
        }
    }
}

/// Unified chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated reply text
    pub result: String,
    /// Token usage
    #[serde(default)]
    pub usage: Usage,
    /// Set when the conversation was flagged (e.g. sensitive content) and
    /// no history should be recorded for this turn
    #[serde(default)]
    pub need_clear_history: bool,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
}

// ============================================================================
// Image Request/Response
// ============================================================================

/// Text-to-image request.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub style: Option<ImageStyle>,
    /// Output resolution, e.g. "1024x1024"
    pub size: Option<String>,
    /// Diffusion sampler, e.g. "DPM++ 2M SDE Karras"
    pub sampler_index: Option<String>,
    pub user_id: Option<String>,
}

impl ImageRequest {
    /// A bare request with platform defaults for style, size, and sampler.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: None,
            size: None,
            sampler_index: None,
            user_id: None,
        }
    }
}

/// Text-to-image response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    pub data: Vec<ImageData>,
}

/// One generated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// Base64-encoded PNG payload
    pub b64_image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        assert_eq!(Role::parse(Role::User.as_str()), Role::User);
        assert_eq!(Role::parse(Role::Assistant.as_str()), Role::Assistant);
        assert_eq!(Role::parse("unknown"), Role::User);
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::user("hi");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hi");
        assert_eq!(ChatMessage::assistant("yo").role, Role::Assistant);
    }

    #[test]
    fn test_sampling_defaults_send_nothing() {
        let params = SamplingParams::resolve(0.95, 0.8);
        assert_eq!(params.temperature, None);
        assert_eq!(params.top_p, None);
    }

    #[test]
    fn test_sampling_temperature_wins() {
        let params = SamplingParams::resolve(0.5, 0.8);
        assert_eq!(params.temperature, Some(0.5));
        assert_eq!(params.top_p, None);

        // a non-default top_p is still dropped when temperature is set
        let params = SamplingParams::resolve(0.5, 0.3);
        assert_eq!(params.temperature, Some(0.5));
        assert_eq!(params.top_p, None);
    }

    #[test]
    fn test_sampling_top_p_only_at_default_temperature() {
        let params = SamplingParams::resolve(0.95, 0.3);
        assert_eq!(params.temperature, None);
        assert_eq!(params.top_p, Some(0.3));
    }

    #[test]
    fn test_sampling_none_fields_omitted_from_wire() {
        let json = serde_json::to_string(&SamplingParams::resolve(0.95, 0.8)).unwrap();
        assert_eq!(json, "{}");

        let json = serde_json::to_string(&SamplingParams::resolve(0.2, 0.8)).unwrap();
        assert!(json.contains("temperature"));
        assert!(!json.contains("top_p"));
    }

    #[test]
    fn test_chat_response_defaults() {
        let resp: ChatResponse = serde_json::from_str(r#"{"result": "hello"}"#).unwrap();
        assert_eq!(resp.result, "hello");
        assert!(!resp.need_clear_history);
        assert_eq!(resp.usage.prompt_tokens, 0);
    }
}
