//! Streaming client for OpenAI-compatible chat-completion services.
//!
//! Talks to any endpoint that implements `POST {base}/chat/completions` with
//! server-sent-event streaming and `GET {base}/models`, authenticated with a
//! bearer token.

pub mod streaming;
pub mod types;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use parley_core::llm::client::ChatClient;
use parley_core::llm::stream::FragmentStream;
use parley_types::config::ProviderSettings;
use parley_types::llm::{CompletionRequest, LlmError};

use self::streaming::completion_stream;
use self::types::{ChatCompletionBody, ChatCompletionResponse, ErrorEnvelope, ModelList};

/// Client for an OpenAI-compatible completion service.
///
/// # API Key Security
///
/// The key is held as a [`SecretString`] and only exposed while building the
/// `Authorization` header. `Debug` output reports whether a key is present,
/// never its value.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenAiCompatClient {
    /// Create a client. A missing key is accepted here and reported as a
    /// configuration error by every call that needs it.
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>, timeout: Duration) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_settings(settings: &ProviderSettings, api_key: Option<SecretString>) -> Result<Self, LlmError> {
        Self::new(
            settings.base_url.clone(),
            api_key,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<&str, LlmError> {
        match &self.api_key {
            Some(key) if !key.expose_secret().is_empty() => Ok(key.expose_secret()),
            _ => Err(LlmError::Configuration("no API key configured".to_string())),
        }
    }

    fn post_completion(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::RequestBuilder, LlmError> {
        let token = self.bearer()?;
        let body = ChatCompletionBody {
            model: request.model.clone(),
            messages: request.messages.clone(),
            stream,
            sampling: request.sampling.clone(),
        };
        Ok(self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(token)
            .json(&body))
    }
}

/// Build a [`LlmError::Request`] from a non-2xx status and its body.
pub(crate) fn request_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(ErrorEnvelope::into_message);
    LlmError::Request { status, message }
}

impl ChatClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai-compat"
    }

    fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError> {
        let builder = self.post_completion(&request, true)?;
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "starting completion stream"
        );
        Ok(FragmentStream::new(completion_stream(builder)))
    }

    async fn chat(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let builder = self.post_completion(request, false)?;
        tracing::debug!(model = %request.model, "completion request");

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::Stream(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "completion error response");
            return Err(request_error(status.as_u16(), &body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::Deserialization("response has no choices".to_string()))
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let token = self.bearer()?;
        let response = self
            .http
            .get(self.url("models"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| LlmError::Stream(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(request_error(status.as_u16(), &body));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse model list: {e}")))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}
