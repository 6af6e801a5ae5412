//! LLM request/response types for Parley.
//!
//! These types model the data shapes for completion-service interactions:
//! completion requests, sampling parameters, parsed stream records, the
//! items of a fragment stream, and error handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in an LLM conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.7,
            top_p: 0.9,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }
}

/// Request to a completion service.
///
/// `messages` is the full ordered history, system entry first. Whether the
/// request streams is decided by the client method it is handed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub sampling: SamplingParams,
}

/// One parsed record of a streaming response body.
///
/// Every complete line of the body is classified into exactly one of these
/// before any field is read from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    /// A well-formed data record. The text may be empty (role-only deltas).
    DataFragment(String),
    /// The terminal sentinel. No further reads follow.
    StreamEnd,
    /// A data record whose payload could not be decoded.
    Malformed(String),
}

/// Item of a fragment stream.
///
/// A stream yields any number of `Fragment`s followed by exactly one
/// `Complete` or `Error`, then ends.
#[derive(Debug)]
pub enum StreamItem {
    /// Incremental assistant text, never empty.
    Fragment(String),
    /// The completion service finished the response cleanly.
    Complete,
    /// The request or the stream failed.
    Error(LlmError),
}

/// Errors from completion-service operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    /// Missing or invalid credentials. Raised before any network activity.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-2xx response before any streaming began.
    #[error("request failed with status {status}{}", .message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    Request { status: u16, message: Option<String> },

    /// Failure while reading a stream that had already started.
    #[error("stream error: {0}")]
    Stream(String),

    /// A single malformed stream record.
    #[error("decode error: {0}")]
    Decode(String),

    /// A non-streaming response body that did not have the expected shape.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl LlmError {
    /// HTTP status carried by a request error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_message_role_serde() {
        let role = MessageRole::Assistant;
        let json = serde_json::to_string(&role).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_sampling_defaults() {
        let params = SamplingParams::default();
        assert_eq!(params.max_tokens, 2000);
        assert!((params.temperature - 0.7).abs() < f64::EPSILON);
        assert!((params.top_p - 0.9).abs() < f64::EPSILON);
        assert_eq!(params.presence_penalty, 0.0);
    }

    #[test]
    fn test_sampling_partial_deserialize() {
        let params: SamplingParams = serde_json::from_str(r#"{"temperature":0.2}"#).unwrap();
        assert!((params.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(params.max_tokens, 2000);
    }

    #[test]
    fn test_request_error_display_with_message() {
        let err = LlmError::Request {
            status: 401,
            message: Some("Invalid token".to_string()),
        };
        assert_eq!(err.to_string(), "request failed with status 401: Invalid token");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_request_error_display_without_message() {
        let err = LlmError::Request {
            status: 503,
            message: None,
        };
        assert_eq!(err.to_string(), "request failed with status 503");
    }

    #[test]
    fn test_non_request_error_has_no_status() {
        assert_eq!(LlmError::Stream("reset".into()).status(), None);
    }
}
