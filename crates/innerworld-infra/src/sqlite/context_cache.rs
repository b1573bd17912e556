//! SQLite context cache store.

use chrono::Utc;
use sqlx::Row;

use innerworld_core::repository::ContextCacheStore;
use innerworld_types::context::{ContextData, UserContext};
use innerworld_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, map_sqlx_error, parse_datetime};

/// SQLite-backed implementation of `ContextCacheStore`.
///
/// `context_data` is stored as a JSON object; expired rows read as a miss.
pub struct SqliteContextCache {
    pool: DatabasePool,
}

impl SqliteContextCache {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ContextRow {
    user_id: String,
    context_data: String,
    last_updated: String,
    expires_at: String,
}

impl ContextRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            context_data: row.try_get("context_data")?,
            last_updated: row.try_get("last_updated")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    fn into_context(self) -> Result<UserContext, RepositoryError> {
        let context_data: ContextData = serde_json::from_str(&self.context_data)
            .map_err(|e| RepositoryError::Query(format!("invalid context JSON: {e}")))?;
        Ok(UserContext {
            user_id: self.user_id,
            context_data,
            last_updated: parse_datetime(&self.last_updated)?,
            expires_at: parse_datetime(&self.expires_at)?,
        })
    }
}

impl ContextCacheStore for SqliteContextCache {
    async fn get(&self, user_id: &str) -> Result<Option<UserContext>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM user_context WHERE user_id = ? AND expires_at > ?")
            .bind(user_id)
            .bind(format_datetime(&Utc::now()))
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let r = ContextRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_context()?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &UserContext) -> Result<(), RepositoryError> {
        let data = serde_json::to_string(&entry.context_data)
            .map_err(|e| RepositoryError::InvalidInput(format!("serialize context: {e}")))?;

        sqlx::query(
            r#"INSERT INTO user_context (user_id, context_data, last_updated, expires_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                   context_data = excluded.context_data,
                   last_updated = excluded.last_updated,
                   expires_at = excluded.expires_at"#,
        )
        .bind(&entry.user_id)
        .bind(&data)
        .bind(format_datetime(&entry.last_updated))
        .bind(format_datetime(&entry.expires_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn make_context(user: &str, ttl: Duration) -> UserContext {
        let mut data = ContextData::new();
        data.insert("recent_themes".into(), json!(["exams", "friends"]));
        data.insert("context_source".into(), json!("graph"));
        UserContext::new(user, data, Utc::now(), ttl)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = SqliteContextCache::new(test_pool().await);
        let ctx = make_context("u1", Duration::hours(1));
        cache.put(&ctx).await.unwrap();

        let found = cache.get("u1").await.unwrap().unwrap();
        assert_eq!(found.context_data, ctx.context_data);
        assert_eq!(found.expires_at.timestamp(), ctx.expires_at.timestamp());
        assert!(cache.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_upserts() {
        let cache = SqliteContextCache::new(test_pool().await);
        cache.put(&make_context("u1", Duration::hours(1))).await.unwrap();

        let mut updated = make_context("u1", Duration::hours(2));
        updated.context_data.insert("mood".into(), json!("hopeful"));
        cache.put(&updated).await.unwrap();

        let found = cache.get("u1").await.unwrap().unwrap();
        assert_eq!(found.context_data["mood"], "hopeful");
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = SqliteContextCache::new(test_pool().await);
        cache.put(&make_context("u1", Duration::seconds(-5))).await.unwrap();
        assert!(cache.get("u1").await.unwrap().is_none());
    }
}
