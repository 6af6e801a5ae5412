//! ChatClient trait definition.
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition) for zero-cost
//! static dispatch. For dynamic dispatch, use `BoxChatClient`.

use std::future::Future;

use parley_types::llm::{CompletionRequest, LlmError};

use super::stream::FragmentStream;

/// Trait for streaming chat-completion clients.
///
/// `stream` is synchronous: it validates configuration (credentials, model)
/// up front and returns a lazy [`FragmentStream`]. No network traffic happens
/// until the stream is first polled, and a configuration problem is reported
/// here before any request is attempted.
pub trait ChatClient: Send + Sync {
    /// Human-readable client name (e.g., "openai-compat").
    fn name(&self) -> &str;

    /// Start a streaming completion.
    fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError>;

    /// Run a completion to the end and return the accumulated text.
    fn chat(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Ids of the models the service offers.
    fn list_models(&self) -> impl Future<Output = Result<Vec<String>, LlmError>> + Send;
}
