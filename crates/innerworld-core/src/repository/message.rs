//! Durable message store trait definition.
//!
//! Holds the per-session transcript: one record per user or assistant turn,
//! keyed by `(session_id, sequence)`.

use innerworld_types::conversation::ConversationMessage;
use innerworld_types::error::RepositoryError;

/// Append-only transcript storage.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait MessageStore: Send + Sync {
    /// Append a record.
    ///
    /// Returns `Conflict` if `(conversation_id, sequence)` already exists; records
    /// are never overwritten.
    fn append(
        &self,
        record: &ConversationMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All live records of a session, ordered by ascending sequence.
    fn get_by_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationMessage>, RepositoryError>> + Send;

    /// Delete every record of a session. Returns the number removed.
    ///
    /// A partially applied delete reports `Incomplete` so the caller can retry.
    fn delete_by_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
