//! SQLite chat repository.
//!
//! Implements `ChatRepository` from `parley-core` with raw queries, private
//! Row structs, and the split reader/writer pool. A session is saved as one
//! transaction: the header is upserted, then the stored transcript is
//! replaced by the snapshot's messages. A snapshot older than the stored
//! header changes nothing.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use parley_core::chat::repository::ChatRepository;
use parley_types::chat::{ChatMessage, ChatRole, ChatSession, MessageId, MessageStatus, SessionId};
use parley_types::error::PersistenceError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    user_id: i64,
    title: String,
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_session(self, messages: Vec<ChatMessage>) -> Result<ChatSession, PersistenceError> {
        Ok(ChatSession {
            id: self
                .id
                .parse::<SessionId>()
                .map_err(|e| PersistenceError::Corrupt(format!("invalid session id: {e}")))?,
            user_id: self.user_id,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            messages,
            error: self.error,
        })
    }
}

struct MessageRow {
    id: String,
    session_id: String,
    role: String,
    content: String,
    status: String,
    related_items: Option<String>,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            status: row.try_get("status")?,
            related_items: row.try_get("related_items")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, PersistenceError> {
        let related_items = self
            .related_items
            .as_deref()
            .map(serde_json::from_str::<Vec<i64>>)
            .transpose()
            .map_err(|e| PersistenceError::Corrupt(format!("invalid related_items: {e}")))?;

        Ok(ChatMessage {
            id: self
                .id
                .parse::<MessageId>()
                .map_err(|e| PersistenceError::Corrupt(format!("invalid message id: {e}")))?,
            session_id: self
                .session_id
                .parse::<SessionId>()
                .map_err(|e| PersistenceError::Corrupt(format!("invalid session_id: {e}")))?,
            role: self.role.parse::<ChatRole>().map_err(PersistenceError::Corrupt)?,
            content: self.content,
            timestamp: parse_datetime(&self.created_at)?,
            status: self.status.parse::<MessageStatus>().map_err(PersistenceError::Corrupt)?,
            related_items,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Corrupt(format!("invalid datetime: {e}")))
}

/// Fixed-width RFC 3339 so stored timestamps sort as text.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn storage(e: sqlx::Error) -> PersistenceError {
    PersistenceError::Storage(e.to_string())
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn save(&self, session: &ChatSession) -> Result<(), PersistenceError> {
        let mut tx = self.pool.writer.begin().await.map_err(storage)?;

        // An older snapshot arriving late never rolls anything back.
        let header = sqlx::query(
            r#"INSERT INTO chat_sessions (id, user_id, title, error, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   title = excluded.title,
                   error = excluded.error,
                   updated_at = excluded.updated_at
               WHERE excluded.updated_at >= chat_sessions.updated_at"#,
        )
        .bind(session.id.to_string())
        .bind(session.user_id)
        .bind(&session.title)
        .bind(&session.error)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        if header.rows_affected() == 0 {
            tx.rollback().await.map_err(storage)?;
            tracing::debug!(session_id = %session.id, "stale session snapshot not saved");
            return Ok(());
        }

        sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(session.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        for (seq, message) in session.messages.iter().enumerate() {
            let related_items = message
                .related_items
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| PersistenceError::Storage(format!("related_items: {e}")))?;

            sqlx::query(
                r#"INSERT INTO chat_messages (id, session_id, seq, role, content, status, related_items, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(message.id.to_string())
            .bind(session.id.to_string())
            .bind(seq as i64)
            .bind(message.role.to_string())
            .bind(&message.content)
            .bind(message.status.to_string())
            .bind(related_items)
            .bind(format_datetime(&message.timestamp))
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        tracing::debug!(session_id = %session.id, messages = session.messages.len(), "session saved");
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<ChatSession>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(storage)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let header = SessionRow::from_row(&row).map_err(storage)?;

        let rows = sqlx::query("SELECT * FROM chat_messages WHERE session_id = ? ORDER BY seq ASC")
            .bind(id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(storage)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            messages.push(MessageRow::from_row(row).map_err(storage)?.into_message()?);
        }

        Ok(Some(header.into_session(messages)?))
    }

    async fn list(&self) -> Result<Vec<ChatSession>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM chat_sessions ORDER BY updated_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(storage)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            sessions.push(SessionRow::from_row(row).map_err(storage)?.into_session(Vec::new())?);
        }
        Ok(sessions)
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn repository() -> (SqliteChatRepository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(&dir.path().join("chat.db")).await.unwrap();
        (SqliteChatRepository::new(pool), dir)
    }

    fn transcript() -> ChatSession {
        let mut session = ChatSession::new(3, "Ventilation rules");
        let sid = session.id;
        session.push(ChatMessage::user(sid, "What airflow is required?"));
        let mut answer = ChatMessage::pending_assistant(sid);
        answer.content = "At least 30 m3/h per person.".into();
        answer.status = MessageStatus::Final;
        answer.related_items = Some(vec![12, 40]);
        session.push(answer);
        session.push(ChatMessage::user(sid, "And for kitchens?"));
        let mut failed = ChatMessage::pending_assistant(sid);
        failed.content = "Kitchens need".into();
        failed.status = MessageStatus::Failed;
        session.push(failed);
        session.error = Some("stream error: connection reset".into());
        session
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let (repo, _dir) = repository().await;
        let session = transcript();

        repo.save(&session).await.unwrap();
        let loaded = repo.load(&session.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.user_id, 3);
        assert_eq!(loaded.title, "Ventilation rules");
        assert_eq!(loaded.error, session.error);
        assert_eq!(loaded.messages.len(), 4);
        for (stored, original) in loaded.messages.iter().zip(&session.messages) {
            assert_eq!(stored.id, original.id);
            assert_eq!(stored.role, original.role);
            assert_eq!(stored.content, original.content);
            assert_eq!(stored.status, original.status);
            assert_eq!(stored.related_items, original.related_items);
        }
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let (repo, _dir) = repository().await;
        assert!(repo.load(&SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resave_appends_new_messages() {
        let (repo, _dir) = repository().await;
        let mut session = transcript();
        repo.save(&session).await.unwrap();

        session.push(ChatMessage::user(session.id, "Thanks"));
        session.error = None;
        repo.save(&session).await.unwrap();

        let loaded = repo.load(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 5);
        assert_eq!(loaded.messages[4].content, "Thanks");
        assert!(loaded.error.is_none());
    }

    #[tokio::test]
    async fn stale_snapshot_does_not_roll_back_session() {
        let (repo, _dir) = repository().await;
        let mut session = transcript();
        let stale = session.clone();

        session.title = "Renamed".into();
        session.messages[3].content = "Kitchens need 60 m3/h.".into();
        session.messages[3].status = MessageStatus::Final;
        session.push(ChatMessage::user(session.id, "Thanks"));
        session.updated_at = session.updated_at + Duration::seconds(5);
        repo.save(&session).await.unwrap();
        repo.save(&stale).await.unwrap();

        let loaded = repo.load(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Renamed");
        assert_eq!(loaded.messages.len(), 5);
        assert_eq!(loaded.messages[3].content, "Kitchens need 60 m3/h.");
        assert_eq!(loaded.messages[3].status, MessageStatus::Final);
    }

    #[tokio::test]
    async fn resave_replaces_stored_transcript() {
        let (repo, _dir) = repository().await;
        let mut session = transcript();
        repo.save(&session).await.unwrap();

        session.messages.truncate(2);
        session.updated_at = session.updated_at + Duration::seconds(1);
        repo.save(&session).await.unwrap();

        let loaded = repo.load(&session.id).await.unwrap().unwrap();
        let ids: Vec<MessageId> = loaded.messages.iter().map(|m| m.id).collect();
        let expected: Vec<MessageId> = session.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn list_orders_by_updated_at() {
        let (repo, _dir) = repository().await;
        let mut older = ChatSession::new(1, "older");
        older.updated_at = Utc::now() - Duration::hours(1);
        let newer = ChatSession::new(1, "newer");

        repo.save(&older).await.unwrap();
        repo.save(&newer).await.unwrap();

        let listed = repo.list().await.unwrap();
        let titles: Vec<&str> = listed.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["newer", "older"]);
        assert!(listed.iter().all(|s| s.messages.is_empty()));
    }

    #[tokio::test]
    async fn delete_cascades_to_messages() {
        let (repo, _dir) = repository().await;
        let session = transcript();
        repo.save(&session).await.unwrap();

        assert!(repo.delete(&session.id).await.unwrap());
        assert!(!repo.delete(&session.id).await.unwrap());
        assert!(repo.load(&session.id).await.unwrap().is_none());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&repo.pool.reader)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let a = format_datetime(&Utc::now());
        let b = format_datetime(&(Utc::now() + Duration::days(1)));
        assert_eq!(a.len(), b.len());
        assert!(a.ends_with('Z'));
    }
}
