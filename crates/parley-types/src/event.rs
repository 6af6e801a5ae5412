//! Events published while sessions change.
//!
//! Carried over the chat event bus to live observers (the SSE endpoint and
//! the interactive CLI). Serialized with a `type` tag for the wire.

use serde::{Deserialize, Serialize};

use crate::chat::{MessageId, MessageStatus, SessionId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    SessionCreated {
        session_id: SessionId,
        title: String,
    },

    SessionDeleted {
        session_id: SessionId,
    },

    /// A user message and its pending assistant reply were appended.
    TurnStarted {
        session_id: SessionId,
        user_message_id: MessageId,
        assistant_message_id: MessageId,
    },

    /// A fragment was appended to the pending assistant message.
    Fragment {
        session_id: SessionId,
        message_id: MessageId,
        text: String,
    },

    /// The assistant message reached a terminal status.
    TurnFinished {
        session_id: SessionId,
        message_id: MessageId,
        status: MessageStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ChatEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            ChatEvent::SessionCreated { session_id, .. }
            | ChatEvent::SessionDeleted { session_id }
            | ChatEvent::TurnStarted { session_id, .. }
            | ChatEvent::Fragment { session_id, .. }
            | ChatEvent::TurnFinished { session_id, .. } => *session_id,
        }
    }

    /// SSE event name for this variant.
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::SessionCreated { .. } => "session_created",
            ChatEvent::SessionDeleted { .. } => "session_deleted",
            ChatEvent::TurnStarted { .. } => "turn_started",
            ChatEvent::Fragment { .. } => "fragment",
            ChatEvent::TurnFinished { .. } => "turn_finished",
        }
    }
}
