//! Application-wide chat context.
//!
//! `ChatContext` bundles the session registry, the orchestrator, the event
//! bus, and the optional repository. It is built once at startup and shared
//! (behind an `Arc`) by the CLI and the HTTP server.

use std::sync::Arc;

use tracing::{info, warn};

use parley_types::chat::{ChatSession, SessionId, SessionSummary};
use parley_types::config::{ChatSettings, ParleyConfig};
use parley_types::error::{ChatError, PersistenceError};
use parley_types::event::ChatEvent;

use crate::chat::orchestrator::{ChatOrchestrator, OrchestratorConfig, TurnOutcome};
use crate::chat::registry::SessionRegistry;
use crate::chat::repository::BoxChatRepository;
use crate::chat::title::title_from_message;
use crate::event::bus::EventBus;
use crate::llm::box_client::BoxChatClient;

pub struct ChatContext {
    registry: Arc<SessionRegistry>,
    orchestrator: ChatOrchestrator,
    repository: Option<Arc<BoxChatRepository>>,
    events: EventBus,
    settings: ChatSettings,
}

impl ChatContext {
    /// Build a context from the loaded configuration.
    ///
    /// `model` overrides the default `chat` preset for every turn.
    pub fn new(
        client: BoxChatClient,
        repository: Option<BoxChatRepository>,
        config: &ParleyConfig,
        model: Option<&str>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let events = EventBus::default();
        let repository = repository.map(Arc::new);

        let mut orchestrator = ChatOrchestrator::new(
            Arc::clone(&registry),
            Arc::new(client),
            OrchestratorConfig::from_config(config, model),
        )
        .with_events(events.clone());
        if let Some(repository) = &repository {
            orchestrator = orchestrator.with_repository(Arc::clone(repository));
        }

        Self {
            registry,
            orchestrator,
            repository,
            events,
            settings: config.chat.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn orchestrator(&self) -> &ChatOrchestrator {
        &self.orchestrator
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_persistent(&self) -> bool {
        self.repository.is_some()
    }

    /// Load every stored session into the registry. Returns how many were added.
    pub async fn restore(&self) -> Result<usize, PersistenceError> {
        let Some(repository) = &self.repository else {
            return Ok(0);
        };

        let mut restored = 0;
        for header in repository.list().await? {
            match repository.load(&header.id).await {
                Ok(Some(session)) => {
                    if self.registry.restore(session).await {
                        restored += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(session_id = %header.id, error = %e, "skipping unreadable session"),
            }
        }
        info!(restored, "sessions restored from storage");
        Ok(restored)
    }

    /// Create a session, falling back to the configured default title.
    pub async fn create_session(&self, title: Option<String>) -> ChatSession {
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_title.clone());
        let session = self.registry.create(self.settings.user_id, title).await;
        self.events.publish(ChatEvent::SessionCreated {
            session_id: session.id,
            title: session.title.clone(),
        });
        session
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<ChatSession, ChatError> {
        self.registry.get(id).await.ok_or(ChatError::NotFound(*id))
    }

    pub async fn list_sessions(&self) -> Vec<ChatSession> {
        self.registry.list().await
    }

    /// Session headers in listing order, with the busy flag filled in.
    pub async fn session_summaries(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();
        for session in self.registry.list().await {
            let busy = match self.registry.handle(&session.id).await {
                Some(handle) => handle.is_busy(),
                None => false,
            };
            summaries.push(SessionSummary::new(&session, busy));
        }
        summaries
    }

    /// Delete a session everywhere, cancelling its in-flight turn.
    ///
    /// Removal from storage is best-effort and does not affect the result.
    /// It waits for a save already in progress, and saves that start later
    /// are skipped, so the stored copy does not come back.
    pub async fn delete_session(&self, id: &SessionId) -> Result<(), ChatError> {
        let handle = self.registry.handle(id).await.ok_or(ChatError::NotFound(*id))?;
        self.registry.delete(id).await?;
        self.events.publish(ChatEvent::SessionDeleted { session_id: *id });

        if let Some(repository) = &self.repository {
            let _storage = handle.lock_storage().await;
            if let Err(e) = repository.delete(id).await {
                warn!(session_id = %id, error = %e, "failed to delete stored session");
            }
        }
        Ok(())
    }

    /// Rename a session and save it. A failed save is logged.
    pub async fn rename_session(&self, id: &SessionId, title: impl Into<String>) -> Result<ChatSession, ChatError> {
        let session = self.registry.set_title(id, title).await?;
        if let Some(repository) = &self.repository {
            let Some(handle) = self.registry.handle(id).await else {
                return Ok(session);
            };
            let _storage = handle.lock_storage().await;
            if handle.is_deleted() {
                return Ok(session);
            }
            if let Err(e) = repository.save(&session).await {
                warn!(session_id = %id, error = %e, "failed to save renamed session");
            }
        }
        Ok(session)
    }

    pub async fn send_message(&self, id: &SessionId, content: impl Into<String>) -> Result<TurnOutcome, ChatError> {
        self.orchestrator.send_message(id, content).await
    }

    /// Lazily create a session titled after the message, then run the turn.
    pub async fn start_conversation(&self, content: impl Into<String>) -> Result<TurnOutcome, ChatError> {
        let content = content.into();
        let session = self.create_session(title_from_message(&content)).await;
        self.orchestrator.send_message(&session.id, content).await
    }

    pub async fn cancel(&self, id: &SessionId) -> Result<bool, ChatError> {
        self.orchestrator.cancel(id).await
    }
}

impl std::fmt::Debug for ChatContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatContext")
            .field("orchestrator", &self.orchestrator)
            .field("persistent", &self.is_persistent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{wait_for_saves, MemoryRepository, Script, ScriptedClient};
    use parley_types::chat::{ChatMessage, MessageStatus};

    fn context(client: ScriptedClient, repository: Option<MemoryRepository>) -> ChatContext {
        ChatContext::new(
            BoxChatClient::new(client),
            repository.map(BoxChatRepository::new),
            &ParleyConfig::default(),
            None,
        )
    }

    #[tokio::test]
    async fn create_session_uses_default_title() {
        let ctx = context(ScriptedClient::default(), None);
        let untitled = ctx.create_session(None).await;
        assert_eq!(untitled.title, "New conversation");
        let blank = ctx.create_session(Some("  ".into())).await;
        assert_eq!(blank.title, "New conversation");
        let named = ctx.create_session(Some("Ventilation".into())).await;
        assert_eq!(named.title, "Ventilation");
        assert_eq!(named.user_id, 1);
        assert_eq!(ctx.list_sessions().await.len(), 3);
    }

    #[tokio::test]
    async fn start_conversation_creates_titled_session() {
        let ctx = context(ScriptedClient::new(vec![Script::fragments(&["Sure."])]), None);

        let outcome = ctx.start_conversation("Summarise the safety manual please").await.unwrap();
        assert_eq!(outcome.status, MessageStatus::Final);

        let session = ctx.get_session(&outcome.session_id).await.unwrap();
        assert_eq!(session.title, "Summarise the safety manual pl...");
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn delete_session_removes_from_storage() {
        let repository = MemoryRepository::default();
        let ctx = context(
            ScriptedClient::new(vec![Script::fragments(&["ok"])]),
            Some(repository.clone()),
        );
        let mut events = ctx.events().subscribe();

        let outcome = ctx.start_conversation("hello").await.unwrap();
        wait_for_saves(&repository, 1).await;
        assert!(repository.stored(&outcome.session_id).is_some());

        ctx.delete_session(&outcome.session_id).await.unwrap();
        assert!(repository.stored(&outcome.session_id).is_none());
        assert_eq!(
            ctx.get_session(&outcome.session_id).await.unwrap_err(),
            ChatError::NotFound(outcome.session_id)
        );

        let mut saw_deleted = false;
        while let Ok(event) = events.try_recv() {
            saw_deleted |= matches!(event, ChatEvent::SessionDeleted { .. });
        }
        assert!(saw_deleted);
    }

    #[tokio::test]
    async fn delete_right_after_turn_keeps_storage_empty() {
        let repository = MemoryRepository::default();
        let ctx = context(
            ScriptedClient::new(vec![Script::fragments(&["ok"])]),
            Some(repository.clone()),
        );

        let outcome = ctx.start_conversation("hello").await.unwrap();
        ctx.delete_session(&outcome.session_id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(
            repository.stored(&outcome.session_id).is_none(),
            "deleted session came back from storage (saves={})",
            repository.saves()
        );
        assert_eq!(ctx.restore().await.unwrap(), 0);
        assert!(ctx.get_session(&outcome.session_id).await.is_err());
    }

    #[tokio::test]
    async fn restore_loads_stored_sessions() {
        let repository = MemoryRepository::default();
        let mut stored = ChatSession::new(1, "Earlier");
        stored.push(ChatMessage::user(stored.id, "question"));
        stored.push(ChatMessage::pending_assistant(stored.id));
        repository.insert(stored.clone());

        let ctx = context(ScriptedClient::default(), Some(repository));
        assert_eq!(ctx.restore().await.unwrap(), 1);
        assert_eq!(ctx.restore().await.unwrap(), 0);

        let session = ctx.get_session(&stored.id).await.unwrap();
        assert_eq!(session.title, "Earlier");
        assert_eq!(session.messages[1].status, MessageStatus::Cancelled);
    }

    #[tokio::test]
    async fn rename_session_is_saved() {
        let repository = MemoryRepository::default();
        let ctx = context(ScriptedClient::default(), Some(repository.clone()));
        let session = ctx.create_session(None).await;

        let renamed = ctx.rename_session(&session.id, "Budget review").await.unwrap();
        assert_eq!(renamed.title, "Budget review");
        assert!(renamed.updated_at >= session.updated_at);
        assert_eq!(repository.stored(&session.id).unwrap().title, "Budget review");

        let missing = SessionId::new();
        assert_eq!(
            ctx.rename_session(&missing, "x").await.unwrap_err(),
            ChatError::NotFound(missing)
        );
    }

    #[tokio::test]
    async fn summaries_report_busy_sessions() {
        let (script, gate) = Script::gated();
        let ctx = context(ScriptedClient::new(vec![script]), None);
        let idle = ctx.create_session(Some("idle".into())).await;
        let active = ctx.create_session(Some("active".into())).await;

        let turn = ctx.orchestrator().begin_turn(&active.id, "hi").await.unwrap();
        let summaries = ctx.session_summaries().await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, active.id);
        assert!(summaries[0].busy);
        assert_eq!(summaries[0].message_count, 2);
        assert_eq!(summaries[1].id, idle.id);
        assert!(!summaries[1].busy);

        drop(gate);
        turn.run().await;
        assert!(ctx.session_summaries().await.iter().all(|s| !s.busy));
    }

    #[tokio::test]
    async fn restore_without_repository_is_empty() {
        let ctx = context(ScriptedClient::default(), None);
        assert!(!ctx.is_persistent());
        assert_eq!(ctx.restore().await.unwrap(), 0);
    }
}
