//! Context cache manager.
//!
//! The cache mirrors a derived summary of the graph store. It is never
//! authoritative: a missing or unreadable entry is a miss, and the graph store
//! being down at login degrades to a synthesized minimal context.

use std::sync::Arc;

use chrono::Utc;
use innerworld_types::context::{ContextData, GraphSummary, UserContext};
use innerworld_types::error::{RepositoryError, ResilienceError};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::repository::{ContextCacheStore, GraphStore};
use crate::resilience::{Collaborator, Resilience, classify};

/// Marker written by session-end refreshes.
pub const REFRESH_SOURCE_SESSION: &str = "session_processing";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("context cache write failed: {0}")]
    Store(#[from] ResilienceError<RepositoryError>),

    /// The existing entry could not be read, so it could not be merged.
    #[error("context cache read failed: {0}")]
    Read(#[source] ResilienceError<RepositoryError>),
}

impl CacheError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CacheError::Store(e) | CacheError::Read(e) if e.is_cancelled())
    }
}

/// Populates, reads and refreshes per-user context entries.
pub struct ContextCacheManager<C: ContextCacheStore, G: GraphStore> {
    cache: Arc<C>,
    graph: Arc<G>,
    resilience: Arc<Resilience>,
    ttl: chrono::Duration,
}

impl<C: ContextCacheStore, G: GraphStore> ContextCacheManager<C, G> {
    pub fn new(
        cache: Arc<C>,
        graph: Arc<G>,
        resilience: Arc<Resilience>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            cache,
            graph,
            resilience,
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    // --- Login ---

    /// Build and store the context for a user logging in.
    ///
    /// Graph-store failure falls back to a synthesized context; only a failed
    /// cache write is an error.
    #[tracing::instrument(name = "context_populate", skip_all, fields(user_id = %user_id))]
    pub async fn populate(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<UserContext, CacheError> {
        let now = Utc::now();
        let data = match self.fetch_summary(user_id, cancel).await {
            Ok(summary) => graph_context(user_id, &summary, "graph"),
            Err(e @ ResilienceError::Cancelled) => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "graph summary unavailable, using synthesized context");
                synthesized_context(user_id)
            }
        };

        let entry = UserContext::new(user_id, data, now, self.ttl);
        self.store(&entry, cancel).await?;
        info!(expires_at = %entry.expires_at, "user context populated");
        Ok(entry)
    }

    // --- Session ---

    /// Read-through lookup. Absent, expired and unreadable entries are all misses.
    pub async fn get(&self, user_id: &str, cancel: &CancellationToken) -> Option<UserContext> {
        match self.read(user_id, cancel).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(user_id, error = %e, "context cache unavailable, treating as miss");
                None
            }
        }
    }

    /// Like [`get`](Self::get), but a failed read is an error rather than a miss.
    async fn read(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<UserContext>, ResilienceError<RepositoryError>> {
        let cache = &*self.cache;
        let entry = self
            .resilience
            .call(
                Collaborator::CacheStore,
                cancel,
                classify::cache_store,
                move |_| cache.get(user_id),
            )
            .await?;

        match entry {
            Some(entry) if entry.is_valid_at(Utc::now()) => Ok(Some(entry)),
            Some(_) => {
                debug!(user_id, "cached context expired");
                Ok(None)
            }
            None => {
                debug!(user_id, "no cached context");
                Ok(None)
            }
        }
    }

    // --- Session end ---

    /// Merge `data` into the user's entry and reset its expiry.
    ///
    /// New values win on key collisions. Applying the same data twice yields
    /// the same `context_data`. If the current entry cannot be read the
    /// refresh fails without writing, so existing fields are never dropped.
    #[tracing::instrument(name = "context_refresh", skip_all, fields(user_id = %user_id))]
    pub async fn refresh(
        &self,
        user_id: &str,
        data: ContextData,
        cancel: &CancellationToken,
    ) -> Result<UserContext, CacheError> {
        let mut merged = match self.read(user_id, cancel).await {
            Ok(Some(existing)) => existing.context_data,
            Ok(None) => ContextData::new(),
            Err(e) => return Err(CacheError::Read(e)),
        };
        merged.extend(data);

        let entry = UserContext::new(user_id, merged, Utc::now(), self.ttl);
        self.store(&entry, cancel).await?;
        debug!(fields = entry.context_data.len(), "user context refreshed");
        Ok(entry)
    }

    /// Refresh from the graph's updated summary plus `extra` fields.
    ///
    /// If the graph is unreachable only `extra` and the refresh marker are merged.
    pub async fn refresh_from_graph(
        &self,
        user_id: &str,
        extra: ContextData,
        cancel: &CancellationToken,
    ) -> Result<UserContext, CacheError> {
        let mut data = match self.fetch_summary(user_id, cancel).await {
            Ok(summary) => graph_context(user_id, &summary, "graph"),
            Err(e @ ResilienceError::Cancelled) => return Err(e.into()),
            Err(e) => {
                warn!(user_id, error = %e, "graph summary unavailable during refresh");
                ContextData::new()
            }
        };
        data.extend(extra);
        data.insert(
            "refresh_source".to_string(),
            Value::String(REFRESH_SOURCE_SESSION.to_string()),
        );
        self.refresh(user_id, data, cancel).await
    }

    async fn fetch_summary(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<GraphSummary, ResilienceError<RepositoryError>> {
        let graph = &*self.graph;
        self.resilience
            .call(
                Collaborator::GraphStore,
                cancel,
                classify::graph_store,
                move |_| graph.get_summary(user_id),
            )
            .await
    }

    async fn store(
        &self,
        entry: &UserContext,
        cancel: &CancellationToken,
    ) -> Result<(), ResilienceError<RepositoryError>> {
        let cache = &*self.cache;
        self.resilience
            .call(
                Collaborator::CacheStore,
                cancel,
                classify::cache_store,
                move |_| cache.put(entry),
            )
            .await
    }
}

/// Context fields derived from a graph summary.
fn graph_context(user_id: &str, summary: &GraphSummary, source: &str) -> ContextData {
    let mut data = summary.fields.clone();
    data.insert("user_id".into(), Value::String(user_id.to_string()));
    data.insert("summary".into(), Value::String(summary.summary.clone()));
    data.insert(
        "last_updated".into(),
        Value::String(summary.last_updated.to_rfc3339()),
    );
    data.insert("context_source".into(), Value::String(source.to_string()));
    data
}

/// Minimal context used when the graph store cannot be reached at login.
fn synthesized_context(user_id: &str) -> ContextData {
    let mut data = ContextData::new();
    data.insert("user_id".into(), Value::String(user_id.to_string()));
    data.insert(
        "summary".into(),
        Value::String("New conversation; no prior history available.".to_string()),
    );
    data.insert("recent_themes".into(), Value::Array(Vec::new()));
    data.insert(
        "context_source".into(),
        Value::String("synthesized".to_string()),
    );
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use serde_json::json;

    use crate::testing::{MemoryCache, MemoryGraph, fast_resilience};

    fn manager(
        cache: Arc<MemoryCache>,
        graph: Arc<MemoryGraph>,
    ) -> ContextCacheManager<MemoryCache, MemoryGraph> {
        ContextCacheManager::new(cache, graph, Arc::new(fast_resilience()), Duration::hours(1))
    }

    fn fields(value: serde_json::Value) -> ContextData {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_populate_uses_graph_summary() {
        let cache = Arc::new(MemoryCache::default());
        let graph = Arc::new(MemoryGraph::default());
        let m = manager(cache.clone(), graph);
        let cancel = CancellationToken::new();

        let entry = m.populate("u-1", &cancel).await.unwrap();
        assert_eq!(entry.context_data["context_source"], "graph");
        assert_eq!(entry.context_data["user_id"], "u-1");
        assert_eq!(entry.expires_at - entry.last_updated, Duration::hours(1));
        assert_eq!(cache.raw("u-1").unwrap(), entry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_populate_with_oversized_configured_ttl() {
        let ttl = innerworld_types::config::CacheConfig {
            ttl_secs: 10_000_000_000_000,
        }
        .ttl();
        let cache = Arc::new(MemoryCache::default());
        let m = ContextCacheManager::new(
            cache.clone(),
            Arc::new(MemoryGraph::default()),
            Arc::new(fast_resilience()),
            ttl,
        );

        let entry = m.populate("u", &CancellationToken::new()).await.unwrap();
        assert!(entry.is_valid_at(Utc::now()));
        assert!(m.get("u", &CancellationToken::new()).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_populate_falls_back_when_graph_down() {
        let cache = Arc::new(MemoryCache::default());
        let graph = Arc::new(MemoryGraph::default());
        graph.fail_summaries(RepositoryError::Unavailable("graph down".into()));
        let m = manager(cache.clone(), graph);

        let entry = m.populate("u-1", &CancellationToken::new()).await.unwrap();
        assert_eq!(entry.context_data["context_source"], "synthesized");
        assert!(cache.raw("u-1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_populate_fails_when_cache_write_fails() {
        let cache = Arc::new(MemoryCache::default());
        cache.fail_puts(RepositoryError::Unauthorized);
        let m = manager(cache, Arc::new(MemoryGraph::default()));

        let err = m.populate("u-1", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::Store(ResilienceError::NonRetryable(RepositoryError::Unauthorized))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_treats_expired_and_failed_reads_as_miss() {
        let cache = Arc::new(MemoryCache::default());
        let past = Utc::now() - Duration::hours(2);
        cache.insert_raw(UserContext::new("u-1", ContextData::new(), past, Duration::hours(1)));
        let m = manager(cache.clone(), Arc::new(MemoryGraph::default()));
        let cancel = CancellationToken::new();

        assert!(m.get("u-1", &cancel).await.is_none());
        assert!(m.get("nobody", &cancel).await.is_none());

        cache.fail_gets(RepositoryError::Throttled("busy".into()));
        assert!(m.get("u-1", &cancel).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_merges_new_over_old() {
        let cache = Arc::new(MemoryCache::default());
        cache.insert_raw(UserContext::new(
            "u-1",
            fields(json!({"a": 0, "b": "kept"})),
            Utc::now(),
            Duration::hours(1),
        ));
        let m = manager(cache, Arc::new(MemoryGraph::default()));

        let entry = m
            .refresh("u-1", fields(json!({"a": 1})), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entry.context_data["a"], 1);
        assert_eq!(entry.context_data["b"], "kept");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_fails_without_overwriting_when_read_fails() {
        let cache = Arc::new(MemoryCache::default());
        cache.insert_raw(UserContext::new(
            "u-1",
            fields(json!({"b": "kept"})),
            Utc::now(),
            Duration::hours(1),
        ));
        cache.fail_gets(RepositoryError::Unauthorized);
        let m = manager(cache.clone(), Arc::new(MemoryGraph::default()));

        let err = m
            .refresh("u-1", fields(json!({"a": 1})), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Read(_)), "got {err:?}");
        assert!(!err.is_cancelled());

        let stored = cache.raw("u-1").unwrap();
        assert_eq!(stored.context_data["b"], "kept");
        assert!(stored.context_data.get("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_twice_is_idempotent() {
        let cache = Arc::new(MemoryCache::default());
        let m = manager(cache, Arc::new(MemoryGraph::default()));
        let cancel = CancellationToken::new();

        let first = m.refresh("u", fields(json!({"a": 1})), &cancel).await.unwrap();
        let second = m.refresh("u", fields(json!({"a": 1})), &cancel).await.unwrap();
        assert_eq!(first.context_data, second.context_data);
        assert!(second.expires_at >= first.expires_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_from_graph_marks_source() {
        let cache = Arc::new(MemoryCache::default());
        let m = manager(cache, Arc::new(MemoryGraph::default()));

        let entry = m
            .refresh_from_graph(
                "u-1",
                fields(json!({"last_session_id": "s-9"})),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(entry.context_data["refresh_source"], REFRESH_SOURCE_SESSION);
        assert_eq!(entry.context_data["last_session_id"], "s-9");
        assert_eq!(entry.context_data["context_source"], "graph");
    }

    #[tokio::test(start_paused = true)]
    async fn test_populate_honours_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let m = manager(Arc::new(MemoryCache::default()), Arc::new(MemoryGraph::default()));
        let err = m.populate("u-1", &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
