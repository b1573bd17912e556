//! In-memory context cache store.

use chrono::Utc;
use dashmap::DashMap;

use innerworld_core::repository::ContextCacheStore;
use innerworld_types::context::UserContext;
use innerworld_types::error::RepositoryError;

/// One entry per user; expired entries read as a miss and are evicted.
#[derive(Default)]
pub struct InMemoryContextCache {
    entries: DashMap<String, UserContext>,
}

impl InMemoryContextCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContextCacheStore for InMemoryContextCache {
    async fn get(&self, user_id: &str) -> Result<Option<UserContext>, RepositoryError> {
        let now = Utc::now();
        let entry = self.entries.get(user_id).map(|e| e.value().clone());
        match entry {
            Some(entry) if entry.is_valid_at(now) => Ok(Some(entry)),
            Some(_) => {
                self.entries
                    .remove_if(user_id, |_, e| !e.is_valid_at(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &UserContext) -> Result<(), RepositoryError> {
        self.entries.insert(entry.user_id.clone(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use innerworld_types::context::ContextData;
    use serde_json::Value;

    fn context(user: &str, ttl: Duration) -> UserContext {
        let mut data = ContextData::new();
        data.insert("mood".into(), Value::String("calm".into()));
        UserContext::new(user, data, Utc::now(), ttl)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = InMemoryContextCache::new();
        cache.put(&context("u1", Duration::hours(1))).await.unwrap();

        let found = cache.get("u1").await.unwrap().unwrap();
        assert_eq!(found.context_data["mood"], "calm");
        assert!(cache.get("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = InMemoryContextCache::new();
        cache.put(&context("u1", Duration::seconds(-1))).await.unwrap();

        assert!(cache.get("u1").await.unwrap().is_none());
        assert!(cache.entries.is_empty());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = InMemoryContextCache::new();
        cache.put(&context("u1", Duration::hours(1))).await.unwrap();

        let mut updated = context("u1", Duration::hours(2));
        updated
            .context_data
            .insert("mood".into(), Value::String("hopeful".into()));
        cache.put(&updated).await.unwrap();

        let found = cache.get("u1").await.unwrap().unwrap();
        assert_eq!(found.context_data["mood"], "hopeful");
    }
}
