//! Collaborator health checks.
//!
//! Each store is read once through [`Resilience::call`] with a sentinel id, so
//! an open breaker shows up as unhealthy without touching the store. The
//! generation service is not called and reports `Skipped`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use innerworld_types::error::RepositoryError;
use innerworld_types::health::{HealthReport, HealthStatus, ServiceHealth};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::repository::{ContextCacheStore, GraphStore, MessageStore};
use crate::resilience::{Collaborator, Resilience, classify};

/// Session and user id read by the checks. Never written.
pub const HEALTH_CHECK_ID: &str = "__health_check__";

/// A check slower than this reports `Degraded`.
pub const DEGRADED_AFTER: Duration = Duration::from_secs(5);

pub struct HealthChecker<M: MessageStore, C: ContextCacheStore, G: GraphStore> {
    messages: Arc<M>,
    cache: Arc<C>,
    graph: Arc<G>,
    resilience: Arc<Resilience>,
    degraded_after: Duration,
}

impl<M: MessageStore, C: ContextCacheStore, G: GraphStore> HealthChecker<M, C, G> {
    pub fn new(messages: Arc<M>, cache: Arc<C>, graph: Arc<G>, resilience: Arc<Resilience>) -> Self {
        Self {
            messages,
            cache,
            graph,
            resilience,
            degraded_after: DEGRADED_AFTER,
        }
    }

    pub fn with_degraded_after(mut self, threshold: Duration) -> Self {
        self.degraded_after = threshold;
        self
    }

    #[tracing::instrument(name = "health_check", skip_all)]
    pub async fn check(&self, cancel: &CancellationToken) -> HealthReport {
        let mut services = BTreeMap::new();

        let messages = &*self.messages;
        let durable = self
            .check_service(
                Collaborator::DurableStore,
                cancel,
                classify::durable_store,
                move |_| messages.get_by_session(HEALTH_CHECK_ID),
            )
            .await;
        services.insert(Collaborator::DurableStore.endpoint().to_string(), durable);

        let cache = &*self.cache;
        let cached = self
            .check_service(
                Collaborator::CacheStore,
                cancel,
                classify::cache_store,
                move |_| cache.get(HEALTH_CHECK_ID),
            )
            .await;
        services.insert(Collaborator::CacheStore.endpoint().to_string(), cached);

        let graph = &*self.graph;
        let summary = self
            .check_service(
                Collaborator::GraphStore,
                cancel,
                classify::graph_store,
                move |_| graph.get_summary(HEALTH_CHECK_ID),
            )
            .await;
        services.insert(Collaborator::GraphStore.endpoint().to_string(), summary);

        services.insert(
            Collaborator::Generation.endpoint().to_string(),
            ServiceHealth::skipped(),
        );

        let report = HealthReport::new(services, Utc::now());
        info!(status = %report.status, "health check completed");
        report
    }

    async fn check_service<T, F, Fut, P>(
        &self,
        collaborator: Collaborator,
        cancel: &CancellationToken,
        is_retryable: P,
        op: F,
    ) -> ServiceHealth
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
        P: Fn(&RepositoryError) -> bool,
    {
        let start = Instant::now();
        let result = self
            .resilience
            .call(collaborator, cancel, is_retryable, op)
            .await;
        let elapsed = start.elapsed();
        let response_time_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));

        match result {
            Ok(_) => ServiceHealth {
                status: if elapsed > self.degraded_after {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                },
                response_time_ms,
                error: None,
            },
            Err(e) => {
                warn!(endpoint = collaborator.endpoint(), error = %e, "health check failed");
                ServiceHealth {
                    status: HealthStatus::Unhealthy,
                    response_time_ms,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{MemoryCache, MemoryGraph, MemoryMessages, fast_resilience};

    struct Harness {
        checker: HealthChecker<MemoryMessages, MemoryCache, MemoryGraph>,
        graph: Arc<MemoryGraph>,
        resilience: Arc<Resilience>,
    }

    fn harness() -> Harness {
        let graph = Arc::new(MemoryGraph::default());
        let resilience = Arc::new(fast_resilience());
        let checker = HealthChecker::new(
            Arc::new(MemoryMessages::default()),
            Arc::new(MemoryCache::default()),
            graph.clone(),
            resilience.clone(),
        );
        Harness {
            checker,
            graph,
            resilience,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_stores_reachable_is_healthy() {
        let h = harness();
        let report = h.checker.check(&CancellationToken::new()).await;

        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.services.len(), 4);
        assert_eq!(report.services["graph_store"].status, HealthStatus::Healthy);
        assert_eq!(report.services["durable_store"].status, HealthStatus::Healthy);
        assert_eq!(report.services["generation"].status, HealthStatus::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_graph_is_unhealthy() {
        let h = harness();
        h.graph
            .fail_summaries(RepositoryError::Unavailable("graph down".into()));

        let report = h.checker.check(&CancellationToken::new()).await;
        assert!(report.is_unhealthy());
        let graph = &report.services["graph_store"];
        assert_eq!(graph.status, HealthStatus::Unhealthy);
        assert!(graph.error.as_deref().unwrap().contains("graph down"));
        assert_eq!(report.services["cache_store"].status, HealthStatus::Healthy);

        let breaker = h
            .resilience
            .snapshots()
            .into_iter()
            .find(|s| s.endpoint == "graph_store")
            .unwrap();
        assert_eq!(breaker.total_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_is_degraded() {
        let h = harness();
        h.graph.delay_summaries(Duration::from_secs(6));

        let report = h.checker.check(&CancellationToken::new()).await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.services["graph_store"].status, HealthStatus::Degraded);
        assert!(report.services["graph_store"].response_time_ms.unwrap() >= 6000);
    }
}
