//! Persistence port for chat sessions.
//!
//! Implemented by the SQLite adapter in `parley-infra`. The orchestrator only
//! ever calls `save`, after a turn reaches `Final` or `Failed`; storage
//! failures are logged there and never change in-memory state.

use std::future::Future;
use std::pin::Pin;

use parley_types::chat::{ChatSession, SessionId};
use parley_types::error::PersistenceError;

/// Storage for finished chat transcripts.
pub trait ChatRepository: Send + Sync {
    /// Upsert the session header and all of its messages.
    fn save(
        &self,
        session: &ChatSession,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Load a session with its full message history.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<ChatSession>, PersistenceError>> + Send;

    /// Session headers (no messages), most recently updated first.
    fn list(&self) -> impl Future<Output = Result<Vec<ChatSession>, PersistenceError>> + Send;

    /// Delete a session and its messages. Returns whether a row existed.
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`ChatRepository`].
pub trait ChatRepositoryDyn: Send + Sync {
    fn save_boxed<'a>(&'a self, session: &'a ChatSession) -> BoxFuture<'a, Result<(), PersistenceError>>;

    fn load_boxed<'a>(
        &'a self,
        id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<ChatSession>, PersistenceError>>;

    fn list_boxed(&self) -> BoxFuture<'_, Result<Vec<ChatSession>, PersistenceError>>;

    fn delete_boxed<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<bool, PersistenceError>>;
}

impl<T: ChatRepository> ChatRepositoryDyn for T {
    fn save_boxed<'a>(&'a self, session: &'a ChatSession) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(self.save(session))
    }

    fn load_boxed<'a>(
        &'a self,
        id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<ChatSession>, PersistenceError>> {
        Box::pin(self.load(id))
    }

    fn list_boxed(&self) -> BoxFuture<'_, Result<Vec<ChatSession>, PersistenceError>> {
        Box::pin(self.list())
    }

    fn delete_boxed<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<bool, PersistenceError>> {
        Box::pin(self.delete(id))
    }
}

/// Type-erased chat repository.
pub struct BoxChatRepository {
    inner: Box<dyn ChatRepositoryDyn>,
}

impl BoxChatRepository {
    pub fn new<T: ChatRepository + 'static>(repository: T) -> Self {
        Self {
            inner: Box::new(repository),
        }
    }

    pub async fn save(&self, session: &ChatSession) -> Result<(), PersistenceError> {
        self.inner.save_boxed(session).await
    }

    pub async fn load(&self, id: &SessionId) -> Result<Option<ChatSession>, PersistenceError> {
        self.inner.load_boxed(id).await
    }

    pub async fn list(&self) -> Result<Vec<ChatSession>, PersistenceError> {
        self.inner.list_boxed().await
    }

    pub async fn delete(&self, id: &SessionId) -> Result<bool, PersistenceError> {
        self.inner.delete_boxed(id).await
    }
}

impl std::fmt::Debug for BoxChatRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxChatRepository").finish_non_exhaustive()
    }
}
