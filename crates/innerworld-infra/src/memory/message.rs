//! In-memory durable message store.

use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};

use innerworld_core::repository::MessageStore;
use innerworld_types::conversation::ConversationMessage;
use innerworld_types::error::RepositoryError;

/// Records keyed by `(conversation_id, sequence)`.
///
/// Expired records are invisible to reads and are dropped on the next write.
#[derive(Default)]
pub struct InMemoryMessageStore {
    records: DashMap<(String, u64), ConversationMessage>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, live or expired.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn purge_expired(&self) {
        let now = Utc::now();
        self.records.retain(|_, r| r.expires_at > now);
    }
}

impl MessageStore for InMemoryMessageStore {
    async fn append(&self, record: &ConversationMessage) -> Result<(), RepositoryError> {
        self.purge_expired();
        let key = (record.conversation_id.clone(), record.sequence);
        match self.records.entry(key) {
            Entry::Occupied(mut existing) => {
                if existing.get().expires_at > Utc::now() {
                    return Err(RepositoryError::Conflict(format!(
                        "sequence {} already exists in {}",
                        record.sequence, record.conversation_id
                    )));
                }
                existing.insert(record.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }
        Ok(())
    }

    async fn get_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let now = Utc::now();
        let mut found: Vec<ConversationMessage> = self
            .records
            .iter()
            .filter(|r| r.session_id == session_id && r.expires_at > now)
            .map(|r| r.value().clone())
            .collect();
        found.sort_by_key(|r| r.sequence);
        Ok(found)
    }

    async fn delete_by_session(&self, session_id: &str) -> Result<u64, RepositoryError> {
        let before = self.records.len();
        self.records.retain(|_, r| r.session_id != session_id);
        let deleted = before.saturating_sub(self.records.len()) as u64;
        self.purge_expired();
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use innerworld_types::conversation::{MessageType, conversation_id};

    fn record(session: &str, sequence: u64, expires_at: DateTime<Utc>) -> ConversationMessage {
        let start = Utc::now();
        ConversationMessage {
            conversation_id: conversation_id(session, start),
            message_id: format!("msg_{sequence}"),
            session_id: session.to_string(),
            user_id: "user-1".to_string(),
            persona: "default".to_string(),
            sequence,
            message_type: if sequence % 2 == 0 {
                MessageType::User
            } else {
                MessageType::Assistant
            },
            content: format!("message {sequence}"),
            session_start: start,
            created_at: start,
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_append_and_read_in_sequence_order() {
        let store = InMemoryMessageStore::new();
        let later = Utc::now() + Duration::hours(1);
        for seq in [2, 0, 1] {
            store.append(&record("s1", seq, later)).await.unwrap();
        }
        store.append(&record("s2", 0, later)).await.unwrap();

        let found = store.get_by_session("s1").await.unwrap();
        let sequences: Vec<u64> = found.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_duplicate_sequence_conflicts() {
        let store = InMemoryMessageStore::new();
        let later = Utc::now() + Duration::hours(1);
        store.append(&record("s1", 0, later)).await.unwrap();

        let err = store.append(&record("s1", 0, later)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_records_hidden_and_replaceable() {
        let store = InMemoryMessageStore::new();
        let past = Utc::now() - Duration::seconds(1);
        store.append(&record("s1", 0, past)).await.unwrap();
        assert!(store.get_by_session("s1").await.unwrap().is_empty());

        let later = Utc::now() + Duration::hours(1);
        store.append(&record("s1", 0, later)).await.unwrap();
        assert_eq!(store.get_by_session("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_session_counts_removed() {
        let store = InMemoryMessageStore::new();
        let later = Utc::now() + Duration::hours(1);
        for seq in 0..4 {
            store.append(&record("s1", seq, later)).await.unwrap();
        }
        store.append(&record("s2", 0, later)).await.unwrap();

        assert_eq!(store.delete_by_session("s1").await.unwrap(), 4);
        assert_eq!(store.delete_by_session("s1").await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_session_removed_on_next_write() {
        let store = InMemoryMessageStore::new();
        let past = Utc::now() - Duration::seconds(1);
        let later = Utc::now() + Duration::hours(1);
        store.append(&record("stale", 0, past)).await.unwrap();
        store.append(&record("stale", 1, past)).await.unwrap();
        assert_eq!(store.len(), 1);

        store.append(&record("live", 0, later)).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_session("live").await.unwrap().len(), 1);
    }
}
