//! Wire types for the OpenAI-compatible chat-completions API.

use serde::{Deserialize, Serialize};

use parley_types::llm::{Message, SamplingParams};

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionBody {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

/// One `data:` record of a streaming response.
///
/// `choices` may be absent (usage-only records); a present but mistyped
/// field fails deserialization and marks the record malformed.
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Text carried by `choices[0].delta.content`, empty when absent.
    pub fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .unwrap_or_default()
    }
}

/// Non-streaming response body.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// `GET /models` response body.
#[derive(Debug, Deserialize)]
pub struct ModelList {
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

/// Error body of a non-2xx response.
///
/// Services disagree on the shape: `{"error": {"message": ...}}`,
/// `{"error": "..."}`, and `{"message": ...}` all occur.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Object {
        #[serde(default)]
        message: Option<String>,
    },
    Text(String),
}

impl ErrorEnvelope {
    pub fn into_message(self) -> Option<String> {
        let nested = match self.error {
            Some(ErrorDetail::Object { message }) => message,
            Some(ErrorDetail::Text(text)) => Some(text),
            None => None,
        };
        nested.or(self.message).filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::llm::Message;

    #[test]
    fn body_flattens_sampling_params() {
        let body = ChatCompletionBody {
            model: "deepseek-chat".into(),
            messages: vec![Message::system("sys"), Message::user("hi")],
            stream: true,
            sampling: SamplingParams::default(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["top_p"], 0.9);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn chunk_text_extraction() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap();
        assert_eq!(chunk.into_text(), "Hel");

        let role_only: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(role_only.into_text(), "");

        let usage_only: StreamChunk = serde_json::from_str(r#"{"usage":{"total_tokens":3}}"#).unwrap();
        assert_eq!(usage_only.into_text(), "");
    }

    #[test]
    fn mistyped_chunk_fails() {
        assert!(serde_json::from_str::<StreamChunk>(r#"{"choices":"nope"}"#).is_err());
        assert!(serde_json::from_str::<StreamChunk>(r#"{"choices":[{"delta":{"content":5}}]}"#).is_err());
    }

    #[test]
    fn error_envelope_shapes() {
        let nested: ErrorEnvelope =
            serde_json::from_str(r#"{"error":{"message":"Invalid token","type":"auth"}}"#).unwrap();
        assert_eq!(nested.into_message().as_deref(), Some("Invalid token"));

        let text: ErrorEnvelope = serde_json::from_str(r#"{"error":"quota exceeded"}"#).unwrap();
        assert_eq!(text.into_message().as_deref(), Some("quota exceeded"));

        let flat: ErrorEnvelope = serde_json::from_str(r#"{"code":20015,"message":"bad model"}"#).unwrap();
        assert_eq!(flat.into_message().as_deref(), Some("bad model"));

        let empty: ErrorEnvelope = serde_json::from_str("{}").unwrap();
        assert!(empty.into_message().is_none());
    }
}
