use thiserror::Error;

use crate::chat::SessionId;

/// Errors a caller of the chat orchestrator can observe synchronously.
///
/// Completion-service failures never appear here: they are folded into the
/// session (failed message + session error field) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("session {0} is already streaming a response")]
    Busy(SessionId),
}

/// Errors from the persistence adapter. Logged, never surfaced as chat errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}
