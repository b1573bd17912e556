//! Per-endpoint circuit breaker.
//!
//! Breakers are process-local and best-effort: each process instance keeps its
//! own state, so a fleet of instances may disagree about an endpoint's health.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use innerworld_types::config::BreakerConfig;
use innerworld_types::error::ResilienceError;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker state for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Rejecting calls until the reset timeout has elapsed since the last failure.
    Open,
    /// Letting calls through to test whether the endpoint recovered.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_error: Option<String>,
    total_calls: u64,
    total_failures: u64,
}

/// Point-in-time view of a breaker, for CLI display and logs.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub endpoint: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub total_calls: u64,
    pub total_failures: u64,
}

/// Three-state breaker guarding a single endpoint.
#[derive(Debug)]
pub struct CircuitBreaker {
    endpoint: String,
    max_failures: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(endpoint: impl Into<String>, config: &BreakerConfig) -> Self {
        Self::with_thresholds(endpoint, config.max_failures, config.reset_timeout())
    }

    pub fn with_thresholds(
        endpoint: impl Into<String>,
        max_failures: u32,
        reset_timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_failures: max_failures.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                last_error: None,
                total_calls: 0,
                total_failures: 0,
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state without triggering the Open -> HalfOpen transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            endpoint: self.endpoint.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            last_error: inner.last_error.clone(),
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
        }
    }

    /// Decide whether a call may proceed.
    ///
    /// An open breaker moves to HalfOpen once `reset_timeout` has elapsed since
    /// the last recorded failure.
    fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    info!(endpoint = %self.endpoint, "circuit breaker half-open, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.total_calls += 1;
        inner.failure_count = 0;
        if inner.state != CircuitState::Closed {
            info!(endpoint = %self.endpoint, "circuit breaker closed");
        }
        inner.state = CircuitState::Closed;
    }

    pub fn record_failure(&self, error: &str) {
        let mut inner = self.lock();
        inner.total_calls += 1;
        inner.total_failures += 1;
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_error = Some(error.to_string());

        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failure_count >= self.max_failures,
            CircuitState::Open => false,
        };
        if should_open {
            inner.state = CircuitState::Open;
            warn!(
                endpoint = %self.endpoint,
                failures = inner.failure_count,
                "circuit breaker opened"
            );
        }
    }

    /// Run `op` through the breaker.
    ///
    /// Cancellation is not counted as a failure; every other error is.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, ResilienceError<E>>
    where
        E: std::error::Error + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        if !self.try_acquire() {
            return Err(ResilienceError::CircuitOpen {
                endpoint: self.endpoint.clone(),
            });
        }

        let result = op().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(ResilienceError::Cancelled) => {}
            Err(e) => self.record_failure(&e.to_string()),
        }
        result
    }
}

/// Breakers keyed by endpoint name, created on first use.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn get(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(endpoint) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(endpoint, &self.config)));
        Arc::clone(entry.value())
    }

    /// Snapshots of every breaker created so far, sorted by endpoint.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut all: Vec<BreakerSnapshot> =
            self.breakers.iter().map(|b| b.value().snapshot()).collect();
        all.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        all
    }
}
