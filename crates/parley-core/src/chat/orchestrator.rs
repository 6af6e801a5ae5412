//! Per-session turn state machine.
//!
//! A session cycles between Idle and Streaming. [`ChatOrchestrator::begin_turn`]
//! performs the synchronous half of a turn: it resolves the session, claims
//! the session's turn slot, and appends the user message plus an empty
//! pending assistant message. The returned [`Turn`] owns the slot; running it
//! consumes the fragment stream and settles the assistant message as
//! `Final`, `Failed`, or `Cancelled`. The slot is released as the message
//! settles, on every path including a dropped, never-run turn.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_types::chat::{ChatMessage, ChatSession, MessageId, MessageStatus, SessionId};
use parley_types::config::ParleyConfig;
use parley_types::error::ChatError;
use parley_types::event::ChatEvent;
use parley_types::llm::{CompletionRequest, LlmError, Message, SamplingParams, StreamItem};

use crate::chat::registry::{SessionHandle, SessionRegistry};
use crate::chat::repository::BoxChatRepository;
use crate::event::bus::EventBus;
use crate::llm::box_client::BoxChatClient;

/// Text stored when a completion finishes without producing any content.
pub const FALLBACK_NOTICE: &str =
    "The assistant returned an empty response. Try rephrasing your question.";

/// Request parameters shared by every turn.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    pub system_prompt: String,
    pub sampling: SamplingParams,
}

impl OrchestratorConfig {
    /// Build from the loaded configuration. `model` may be a preset name or a
    /// literal model id; `None` selects the `chat` preset.
    pub fn from_config(config: &ParleyConfig, model: Option<&str>) -> Self {
        Self {
            model: config.models.resolve(model.unwrap_or("chat")),
            system_prompt: config.chat.system_prompt.clone(),
            sampling: config.sampling.clone(),
        }
    }

    fn request(&self, history: Vec<Message>) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !self.system_prompt.trim().is_empty() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        messages.extend(history);
        CompletionRequest {
            model: self.model.clone(),
            messages,
            sampling: self.sampling.clone(),
        }
    }
}

/// Result of a settled turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub message_id: MessageId,
    pub status: MessageStatus,
    pub content: String,
    /// Session-level error description, set for `Failed` turns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Drives chat turns against a completion client.
pub struct ChatOrchestrator {
    registry: Arc<SessionRegistry>,
    client: Arc<BoxChatClient>,
    repository: Option<Arc<BoxChatRepository>>,
    events: EventBus,
    config: OrchestratorConfig,
}

impl ChatOrchestrator {
    pub fn new(registry: Arc<SessionRegistry>, client: Arc<BoxChatClient>, config: OrchestratorConfig) -> Self {
        Self {
            registry,
            client,
            repository: None,
            events: EventBus::default(),
            config,
        }
    }

    /// Persist sessions after every `Final` or `Failed` turn.
    pub fn with_repository(mut self, repository: Arc<BoxChatRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn client(&self) -> &Arc<BoxChatClient> {
        &self.client
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Start a turn: claim the session and append the user and pending
    /// assistant messages.
    ///
    /// Fails with `NotFound` or `Busy` without mutating anything.
    #[tracing::instrument(skip(self, content))]
    pub async fn begin_turn(&self, session_id: &SessionId, content: impl Into<String>) -> Result<Turn, ChatError> {
        let session_id = *session_id;
        let (handle, cancel) = self.registry.acquire_turn(&session_id).await.inspect_err(|e| {
            debug!(error = %e, "turn rejected");
        })?;

        let user = ChatMessage::user(session_id, content);
        let assistant = ChatMessage::pending_assistant(session_id);
        let user_message_id = user.id;
        let assistant_message_id = assistant.id;

        handle.update(|s| {
            s.error = None;
            s.push(user);
            s.push(assistant);
        });

        let request = self.config.request(handle.snapshot().history());

        self.events.publish(ChatEvent::TurnStarted {
            session_id,
            user_message_id,
            assistant_message_id,
        });
        info!(%session_id, model = %request.model, history = request.messages.len(), "turn started");

        Ok(Turn {
            handle,
            client: Arc::clone(&self.client),
            repository: self.repository.clone(),
            events: self.events.clone(),
            request,
            cancel,
            user_message_id,
            assistant_message_id,
            settled: false,
        })
    }

    /// Run a full turn and return once the assistant message has settled.
    ///
    /// Only `NotFound` and `Busy` are returned as errors; completion failures
    /// are recorded on the session and reported through the outcome.
    pub async fn send_message(&self, session_id: &SessionId, content: impl Into<String>) -> Result<TurnOutcome, ChatError> {
        let turn = self.begin_turn(session_id, content).await?;
        Ok(turn.run().await)
    }

    /// Request cancellation of the session's in-flight turn.
    pub async fn cancel(&self, session_id: &SessionId) -> Result<bool, ChatError> {
        let cancelled = self.registry.cancel_turn(session_id).await?;
        if cancelled {
            info!(%session_id, "turn cancellation requested");
        }
        Ok(cancelled)
    }

    /// One-shot question outside any session, answered with a blocking call.
    #[tracing::instrument(skip(self, question), fields(model = %self.config.model))]
    pub async fn ask(&self, question: &str) -> Result<String, LlmError> {
        let request = self.config.request(vec![Message::user(question)]);
        self.client.chat(&request).await
    }

    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        self.client.list_models().await
    }

    /// Send a minimal non-streaming completion with the configured model.
    /// Sessions are not touched.
    pub async fn check_connection(&self) -> Result<(), LlmError> {
        self.client.check_connection(&self.config.model).await
    }
}

impl std::fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("client", &self.client.name())
            .field("model", &self.config.model)
            .field("persistent", &self.repository.is_some())
            .finish()
    }
}

/// An in-flight turn holding its session's turn slot.
pub struct Turn {
    handle: Arc<SessionHandle>,
    client: Arc<BoxChatClient>,
    repository: Option<Arc<BoxChatRepository>>,
    events: EventBus,
    request: CompletionRequest,
    cancel: CancellationToken,
    user_message_id: MessageId,
    assistant_message_id: MessageId,
    settled: bool,
}

impl Turn {
    pub fn session_id(&self) -> SessionId {
        self.handle.id()
    }

    pub fn user_message_id(&self) -> MessageId {
        self.user_message_id
    }

    pub fn assistant_message_id(&self) -> MessageId {
        self.assistant_message_id
    }

    /// Token that cancels this turn.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }

    /// Consume the completion stream and settle the assistant message.
    #[tracing::instrument(skip(self), fields(session_id = %self.handle.id(), model = %self.request.model))]
    pub async fn run(mut self) -> TurnOutcome {
        let stream = match self.client.stream(self.request.clone()) {
            Ok(stream) => stream.with_cancellation(self.cancel.clone()),
            Err(e) => return self.fail(e),
        };
        let mut stream = std::pin::pin!(stream);

        while let Some(item) = stream.next().await {
            if self.cancel.is_cancelled() {
                break;
            }
            match item {
                StreamItem::Fragment(text) => self.apply_fragment(text),
                StreamItem::Complete => return self.complete(),
                StreamItem::Error(e) => return self.fail(e),
            }
        }

        if self.cancel.is_cancelled() {
            info!("turn cancelled");
            return self.settle(MessageStatus::Cancelled, None).0;
        }
        self.complete()
    }

    fn apply_fragment(&mut self, text: String) {
        let message_id = self.assistant_message_id;
        self.handle.update(|s| {
            if let Some(message) = s.message_mut(&message_id) {
                message.content.push_str(&text);
            }
            s.touch();
        });
        self.events.publish(ChatEvent::Fragment {
            session_id: self.handle.id(),
            message_id,
            text,
        });
    }

    fn complete(&mut self) -> TurnOutcome {
        let (outcome, settled) = self.settle(MessageStatus::Final, None);
        info!(chars = outcome.content.chars().count(), "turn completed");
        self.persist(settled);
        outcome
    }

    fn fail(&mut self, error: LlmError) -> TurnOutcome {
        warn!(error = %error, "turn failed");
        let (outcome, settled) = self.settle(MessageStatus::Failed, Some(error.to_string()));
        self.persist(settled);
        outcome
    }

    /// Move the assistant message to its terminal status exactly once.
    ///
    /// The busy flag is released before `TurnFinished` goes out, so observers
    /// may start the next turn as soon as they see it. Returns the settled
    /// session alongside the outcome for persisting.
    fn settle(&mut self, status: MessageStatus, error: Option<String>) -> (TurnOutcome, ChatSession) {
        let message_id = self.assistant_message_id;
        let mut content = String::new();
        let mut settled = None;

        self.handle.update(|s| {
            if let Some(message) = s.message_mut(&message_id) {
                if status == MessageStatus::Final && message.content.is_empty() {
                    message.content = FALLBACK_NOTICE.to_string();
                }
                message.status = status;
                content = message.content.clone();
            }
            if let Some(error) = &error {
                s.error = Some(error.clone());
            }
            s.touch();
            settled = Some(s.clone());
        });
        self.settled = true;
        self.handle.end_turn();
        let session = settled.unwrap_or_else(|| self.handle.snapshot());

        self.events.publish(ChatEvent::TurnFinished {
            session_id: self.handle.id(),
            message_id,
            status,
            error: error.clone(),
        });

        let outcome = TurnOutcome {
            session_id: self.handle.id(),
            message_id,
            status,
            content,
            error,
        };
        (outcome, session)
    }

    /// Fire-and-forget save of the settled session.
    fn persist(&self, session: ChatSession) {
        let Some(repository) = self.repository.clone() else {
            return;
        };
        let handle = Arc::clone(&self.handle);

        tokio::spawn(async move {
            let _storage = handle.lock_storage().await;
            if handle.is_deleted() {
                debug!(session_id = %session.id, "session deleted before save; skipping");
                return;
            }
            match repository.save(&session).await {
                Ok(()) => debug!(session_id = %session.id, "session persisted"),
                Err(e) => warn!(session_id = %session.id, error = %e, "failed to persist session"),
            }
        });
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        if !self.settled {
            debug!(session_id = %self.handle.id(), "turn dropped before settling");
            self.settle(MessageStatus::Cancelled, None);
        }
    }
}

impl std::fmt::Debug for Turn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Turn")
            .field("session_id", &self.handle.id())
            .field("assistant_message_id", &self.assistant_message_id)
            .field("settled", &self.settled)
            .finish()
    }
}
