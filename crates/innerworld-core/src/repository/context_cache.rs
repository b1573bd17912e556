//! Context cache store trait definition.

use innerworld_types::context::UserContext;
use innerworld_types::error::RepositoryError;

/// Per-user key/value cache with expiry.
///
/// Implementations must not return an entry whose `expires_at` has passed.
/// Implementations live in innerworld-infra.
pub trait ContextCacheStore: Send + Sync {
    fn get(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserContext>, RepositoryError>> + Send;

    /// Insert or overwrite the entry for `entry.user_id`.
    fn put(
        &self,
        entry: &UserContext,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
