//! Resilience layer: bounded retry with exponential backoff, guarded by a
//! per-endpoint circuit breaker.
//!
//! Every external call made by the cache manager, the conversation pipeline and
//! the session-end processor goes through [`Resilience::call`].

pub mod breaker;
pub mod classify;
pub mod retry;

use std::future::Future;
use std::sync::Arc;

use innerworld_types::config::{BreakerConfig, RetryConfig, RetryPolicies};
use innerworld_types::error::ResilienceError;
use tokio_util::sync::CancellationToken;

pub use breaker::{BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use retry::{backoff_delay, retry_with_backoff};

/// The external collaborator classes, each with its own retry policy and breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collaborator {
    CacheStore,
    DurableStore,
    GraphStore,
    Generation,
}

impl Collaborator {
    /// Breaker key for this collaborator.
    pub fn endpoint(self) -> &'static str {
        match self {
            Collaborator::CacheStore => "cache_store",
            Collaborator::DurableStore => "durable_store",
            Collaborator::GraphStore => "graph_store",
            Collaborator::Generation => "generation",
        }
    }
}

/// Retry policies plus the breaker registry, shared by every service.
#[derive(Debug)]
pub struct Resilience {
    policies: RetryPolicies,
    breakers: BreakerRegistry,
}

impl Resilience {
    pub fn new(policies: RetryPolicies, breaker: BreakerConfig) -> Self {
        Self {
            policies,
            breakers: BreakerRegistry::new(breaker),
        }
    }

    pub fn policy(&self, collaborator: Collaborator) -> &RetryConfig {
        match collaborator {
            Collaborator::CacheStore => &self.policies.cache_store,
            Collaborator::DurableStore => &self.policies.durable_store,
            Collaborator::GraphStore => &self.policies.graph_store,
            Collaborator::Generation => &self.policies.generation,
        }
    }

    pub fn breaker(&self, collaborator: Collaborator) -> Arc<CircuitBreaker> {
        self.breakers.get(collaborator.endpoint())
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }

    /// Call a collaborator through its breaker and retry policy.
    ///
    /// The breaker sees one outcome per call (the result of the whole retry
    /// loop), so an open breaker rejects before any attempt is made.
    pub async fn call<T, E, F, Fut, C>(
        &self,
        collaborator: Collaborator,
        cancel: &CancellationToken,
        is_retryable: C,
        op: F,
    ) -> Result<T, ResilienceError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let breaker = self.breaker(collaborator);
        let policy = self.policy(collaborator);
        breaker
            .call(|| retry_with_backoff(policy, cancel, is_retryable, op))
            .await
    }
}
