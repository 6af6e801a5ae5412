//! In-memory registry of live chat sessions.
//!
//! Every session lives behind a [`SessionHandle`]: a `watch` channel holding
//! the authoritative [`ChatSession`] value plus the session's turn slot. The
//! registry map itself sits behind an async `RwLock`; lookups that must not
//! race with deletion (turn acquisition) happen under the read lock.
//!
//! Readers always receive owned snapshots, so a caller can never observe a
//! half-applied mutation or mutate the registry through a returned value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{watch, MutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use parley_types::chat::{ChatSession, MessageStatus, SessionId};
use parley_types::error::ChatError;

/// Shared state of one session.
pub struct SessionHandle {
    id: SessionId,
    state: watch::Sender<ChatSession>,
    /// `Some` while a turn is streaming. Holds the turn's cancellation token.
    turn: Mutex<Option<CancellationToken>>,
    /// Set once the session leaves the registry.
    deleted: AtomicBool,
    /// Serializes writes of this session to storage.
    storage: tokio::sync::Mutex<()>,
}

impl SessionHandle {
    fn new(session: ChatSession) -> Self {
        let (state, _) = watch::channel(session.clone());
        Self {
            id: session.id,
            state,
            turn: Mutex::new(None),
            deleted: AtomicBool::new(false),
            storage: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Owned copy of the current session value.
    pub fn snapshot(&self) -> ChatSession {
        self.state.borrow().clone()
    }

    /// Receiver notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<ChatSession> {
        self.state.subscribe()
    }

    /// Whether a turn is currently streaming.
    pub fn is_busy(&self) -> bool {
        self.turn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Claim the turn slot. Returns `None` if a turn is already in flight.
    pub(crate) fn try_begin_turn(&self) -> Option<CancellationToken> {
        let mut slot = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Some(token)
    }

    /// Release the turn slot.
    pub(crate) fn end_turn(&self) {
        self.turn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Cancel the in-flight turn, if any. Returns whether one was running.
    pub fn cancel_turn(&self) -> bool {
        let slot = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether the session has been removed from the registry.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    /// Exclusive access to this session's stored copy.
    ///
    /// Saves check [`is_deleted`](Self::is_deleted) while holding the guard,
    /// and deletion takes it after the flag is set, so a save can never land
    /// after the stored copy was removed.
    pub async fn lock_storage(&self) -> MutexGuard<'_, ()> {
        self.storage.lock().await
    }

    /// Apply a mutation atomically and notify subscribers.
    pub(crate) fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut ChatSession),
    {
        self.state.send_modify(mutate);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// Set of live sessions keyed by id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session and register it.
    #[tracing::instrument(skip(self, title))]
    pub async fn create(&self, user_id: i64, title: impl Into<String>) -> ChatSession {
        let mut session = ChatSession::new(user_id, title);
        let mut sessions = self.sessions.write().await;
        while sessions.contains_key(&session.id) {
            session.id = SessionId::new();
        }
        sessions.insert(session.id, Arc::new(SessionHandle::new(session.clone())));
        info!(session_id = %session.id, title = %session.title, "session created");
        session
    }

    /// Register a session loaded from storage.
    ///
    /// Assistant messages still marked `Pending` were interrupted by a
    /// shutdown and are restored as `Cancelled`. Returns `false` if a session
    /// with the same id is already live; the live one is kept.
    pub async fn restore(&self, mut session: ChatSession) -> bool {
        for message in session.messages.iter_mut().filter(|m| m.is_pending()) {
            message.status = MessageStatus::Cancelled;
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return false;
        }
        debug!(session_id = %session.id, messages = session.messages.len(), "session restored");
        sessions.insert(session.id, Arc::new(SessionHandle::new(session)));
        true
    }

    /// Snapshot of one session.
    pub async fn get(&self, id: &SessionId) -> Option<ChatSession> {
        self.sessions.read().await.get(id).map(|h| h.snapshot())
    }

    /// Shared handle to one session.
    pub async fn handle(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Snapshots of all sessions, most recently updated first.
    pub async fn list(&self) -> Vec<ChatSession> {
        let mut all: Vec<ChatSession> = self
            .sessions
            .read()
            .await
            .values()
            .map(|h| h.snapshot())
            .collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
        all
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove a session, cancelling its in-flight turn if there is one.
    ///
    /// The session leaves the map before the cancellation is delivered, so
    /// once this returns the id resolves to nothing and the orphaned turn
    /// can no longer be observed through the registry.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &SessionId) -> Result<ChatSession, ChatError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or(ChatError::NotFound(*id))?;

        handle.deleted.store(true, Ordering::SeqCst);
        if handle.cancel_turn() {
            debug!(session_id = %id, "cancelled in-flight turn of deleted session");
        }
        info!(session_id = %id, "session deleted");
        Ok(handle.snapshot())
    }

    /// Change notifications for one session.
    pub async fn subscribe(&self, id: &SessionId) -> Result<watch::Receiver<ChatSession>, ChatError> {
        self.handle(id)
            .await
            .map(|h| h.subscribe())
            .ok_or(ChatError::NotFound(*id))
    }

    pub async fn set_title(&self, id: &SessionId, title: impl Into<String>) -> Result<ChatSession, ChatError> {
        let handle = self.handle(id).await.ok_or(ChatError::NotFound(*id))?;
        let title = title.into();
        handle.update(|s| {
            s.title = title;
            s.touch();
        });
        Ok(handle.snapshot())
    }

    /// Reset the session's error field.
    pub async fn clear_error(&self, id: &SessionId) -> Result<(), ChatError> {
        let handle = self.handle(id).await.ok_or(ChatError::NotFound(*id))?;
        handle.update(|s| s.error = None);
        Ok(())
    }

    /// Cancel the in-flight turn of a session. Returns whether one was running.
    pub async fn cancel_turn(&self, id: &SessionId) -> Result<bool, ChatError> {
        let handle = self.handle(id).await.ok_or(ChatError::NotFound(*id))?;
        Ok(handle.cancel_turn())
    }

    /// Resolve a session and claim its turn slot in one step.
    ///
    /// Runs under the read lock so a concurrent delete either happens
    /// entirely before (the id is gone) or entirely after (the new turn is
    /// cancelled by the delete). On error nothing has been mutated.
    pub(crate) async fn acquire_turn(
        &self,
        id: &SessionId,
    ) -> Result<(Arc<SessionHandle>, CancellationToken), ChatError> {
        let sessions = self.sessions.read().await;
        let handle = sessions.get(id).ok_or(ChatError::NotFound(*id))?;
        let token = handle.try_begin_turn().ok_or(ChatError::Busy(*id))?;
        Ok((Arc::clone(handle), token))
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").finish_non_exhaustive()
    }
}
