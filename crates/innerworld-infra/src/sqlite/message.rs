//! SQLite durable message store.
//!
//! Implements `MessageStore` from `innerworld-core`. Rows are keyed by
//! `(conversation_id, sequence)`; the primary key is what turns a duplicate
//! append into a `Conflict`.

use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use innerworld_core::repository::MessageStore;
use innerworld_types::conversation::{ConversationMessage, MessageType};
use innerworld_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, map_sqlx_error, parse_datetime};

/// SQLite-backed implementation of `MessageStore`.
pub struct SqliteMessageStore {
    pool: DatabasePool,
}

impl SqliteMessageStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Remove every record past its expiry. Returns the number removed.
///
/// Runs inside each write so expired transcripts (including ones whose
/// cleanup failed) are physically dropped on the next store write.
async fn purge_expired(conn: &mut SqliteConnection) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM conversation_messages WHERE expires_at <= ?")
        .bind(format_datetime(&Utc::now()))
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct MessageRow {
    conversation_id: String,
    sequence: i64,
    message_id: String,
    session_id: String,
    user_id: String,
    persona: String,
    message_type: String,
    content: String,
    session_start: String,
    created_at: String,
    expires_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            conversation_id: row.try_get("conversation_id")?,
            sequence: row.try_get("sequence")?,
            message_id: row.try_get("message_id")?,
            session_id: row.try_get("session_id")?,
            user_id: row.try_get("user_id")?,
            persona: row.try_get("persona")?,
            message_type: row.try_get("message_type")?,
            content: row.try_get("content")?,
            session_start: row.try_get("session_start")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    fn into_message(self) -> Result<ConversationMessage, RepositoryError> {
        let message_type: MessageType = self
            .message_type
            .parse()
            .map_err(RepositoryError::Query)?;
        let sequence = u64::try_from(self.sequence)
            .map_err(|_| RepositoryError::Query(format!("negative sequence {}", self.sequence)))?;

        Ok(ConversationMessage {
            conversation_id: self.conversation_id,
            message_id: self.message_id,
            session_id: self.session_id,
            user_id: self.user_id,
            persona: self.persona,
            sequence,
            message_type,
            content: self.content,
            session_start: parse_datetime(&self.session_start)?,
            created_at: parse_datetime(&self.created_at)?,
            expires_at: parse_datetime(&self.expires_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// MessageStore impl
// ---------------------------------------------------------------------------

impl MessageStore for SqliteMessageStore {
    async fn append(&self, record: &ConversationMessage) -> Result<(), RepositoryError> {
        let sequence = i64::try_from(record.sequence)
            .map_err(|_| RepositoryError::InvalidInput("sequence out of range".into()))?;

        let mut tx = self.pool.writer.begin().await.map_err(map_sqlx_error)?;

        // An expired row no longer owns its key.
        let purged = purge_expired(&mut *tx).await?;
        if purged > 0 {
            tracing::debug!(purged, "expired messages removed");
        }

        sqlx::query(
            r#"INSERT INTO conversation_messages
               (conversation_id, sequence, message_id, session_id, user_id, persona,
                message_type, content, session_start, created_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&record.conversation_id)
        .bind(sequence)
        .bind(&record.message_id)
        .bind(&record.session_id)
        .bind(&record.user_id)
        .bind(&record.persona)
        .bind(record.message_type.to_string())
        .bind(&record.content)
        .bind(format_datetime(&record.session_start))
        .bind(format_datetime(&record.created_at))
        .bind(format_datetime(&record.expires_at))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM conversation_messages
               WHERE session_id = ? AND expires_at > ?
               ORDER BY sequence ASC"#,
        )
        .bind(session_id)
        .bind(format_datetime(&Utc::now()))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(r.into_message()?);
        }
        Ok(messages)
    }

    async fn delete_by_session(&self, session_id: &str) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(map_sqlx_error)?;
        let result = sqlx::query("DELETE FROM conversation_messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        purge_expired(&mut *tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
