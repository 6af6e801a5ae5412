//! BoxChatClient -- object-safe dynamic dispatch wrapper for ChatClient.
//!
//! 1. `ChatClientDyn` is the object-safe form with boxed futures
//! 2. every `T: ChatClient` gets it through a blanket impl
//! 3. `BoxChatClient` holds `Box<dyn ChatClientDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use parley_types::llm::{CompletionRequest, LlmError, Message, SamplingParams};

use super::client::ChatClient;
use super::stream::FragmentStream;

/// User message sent by [`BoxChatClient::check_connection`].
const CONNECTION_PROBE: &str = "ping";

/// Reply budget for the connection probe.
const CONNECTION_PROBE_MAX_TOKENS: u32 = 8;

/// Object-safe version of [`ChatClient`] with boxed futures.
pub trait ChatClientDyn: Send + Sync {
    fn name(&self) -> &str;

    fn stream_dyn(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError>;

    fn chat_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

    fn list_models_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, LlmError>> + Send + '_>>;
}

impl<T: ChatClient> ChatClientDyn for T {
    fn name(&self) -> &str {
        ChatClient::name(self)
    }

    fn stream_dyn(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError> {
        self.stream(request)
    }

    fn chat_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        Box::pin(self.chat(request))
    }

    fn list_models_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, LlmError>> + Send + '_>> {
        Box::pin(self.list_models())
    }
}

/// Type-erased chat client.
///
/// `ChatClient` uses RPITIT and so cannot be a trait object. The orchestrator
/// and the HTTP layer hold this wrapper instead, which lets tests swap in a
/// scripted client.
pub struct BoxChatClient {
    inner: Box<dyn ChatClientDyn + Send + Sync>,
}

impl BoxChatClient {
    pub fn new<T: ChatClient + 'static>(client: T) -> Self {
        Self {
            inner: Box::new(client),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Start a streaming completion. See [`ChatClient::stream`].
    pub fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError> {
        self.inner.stream_dyn(request)
    }

    pub async fn chat(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.inner.chat_boxed(request).await
    }

    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        self.inner.list_models_boxed().await
    }

    /// Probe the service with a minimal non-streaming completion against
    /// `model`. `Ok` means the completions route accepted the request.
    pub async fn check_connection(&self, model: &str) -> Result<(), LlmError> {
        let probe = CompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user(CONNECTION_PROBE)],
            sampling: SamplingParams {
                max_tokens: CONNECTION_PROBE_MAX_TOKENS,
                ..SamplingParams::default()
            },
        };
        self.chat(&probe).await.map(|_| ())
    }
}

impl std::fmt::Debug for BoxChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxChatClient")
            .field("name", &self.name())
            .finish()
    }
}
