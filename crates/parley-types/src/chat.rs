//! Chat session and message types for Parley.
//!
//! A session is one ongoing conversation holding an ordered, append-only
//! message history. The only in-place mutation is the content and status of
//! the single assistant message that is currently streaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::llm::{Message, MessageRole};

/// Unique identifier for a chat session, wrapping a UUID v7.
///
/// UUID v7 combines a millisecond timestamp with 74 random bits, so ids are
/// time-sortable and collisions are negligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a chat message, wrapping a UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Author of a chat message. System entries never live in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl From<ChatRole> for MessageRole {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => MessageRole::User,
            ChatRole::Assistant => MessageRole::Assistant,
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("invalid chat role: '{other}'")),
        }
    }
}

/// Lifecycle status of a chat message.
///
/// User messages are always `Final`. Assistant messages start `Pending` and
/// move exactly once to `Final`, `Failed`, or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Final,
    Pending,
    Failed,
    Cancelled,
}

impl MessageStatus {
    /// Whether the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::Pending)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Final => write!(f, "final"),
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "final" => Ok(MessageStatus::Final),
            "pending" => Ok(MessageStatus::Pending),
            "failed" => Ok(MessageStatus::Failed),
            "cancelled" => Ok(MessageStatus::Cancelled),
            other => Err(format!("invalid message status: '{other}'")),
        }
    }
}

/// A single message within a chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    /// Knowledge-base document ids the answer refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_items: Option<Vec<i64>>,
}

impl ChatMessage {
    /// A finished, immutable user message.
    pub fn user(session_id: SessionId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            status: MessageStatus::Final,
            related_items: None,
        }
    }

    /// An empty assistant message waiting for fragments.
    pub fn pending_assistant(session_id: SessionId) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            role: ChatRole::Assistant,
            content: String::new(),
            timestamp: Utc::now(),
            status: MessageStatus::Pending,
            related_items: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }

    /// Convert to the wire-neutral LLM message shape.
    pub fn to_llm_message(&self) -> Message {
        Message {
            role: self.role.into(),
            content: self.content.clone(),
        }
    }
}

/// A conversation between a user and the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub user_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    /// Description of the most recent failed turn, cleared when a new turn starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatSession {
    /// Create an empty session with a fresh id.
    pub fn new(user_id: i64, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id,
            title: title.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            error: None,
        }
    }

    /// Refresh `updated_at`. Called on every append or mutation.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a message and refresh `updated_at`.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.touch();
    }

    /// The message currently accumulating fragments, if any.
    pub fn pending_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.is_pending())
    }

    pub fn message(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == *id)
    }

    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == *id)
    }

    /// Conversation history to send to the completion service.
    ///
    /// Every message in order, including the partial text of failed and
    /// cancelled replies. The pending reply and assistant messages with no
    /// content are left out: OpenAI-compatible services reject empty
    /// assistant turns.
    pub fn history(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| {
                m.role == ChatRole::User || (m.status != MessageStatus::Pending && !m.content.is_empty())
            })
            .map(ChatMessage::to_llm_message)
            .collect()
    }
}

/// Session header for listings: everything but the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    /// Set while a reply is streaming.
    pub busy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionSummary {
    pub fn new(session: &ChatSession, busy: bool) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            message_count: session.messages.len(),
            busy,
            error: session.error.clone(),
        }
    }
}
