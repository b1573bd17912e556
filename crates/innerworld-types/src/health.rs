//! Collaborator health report shapes.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health of one collaborator, or of the system as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Reachable but slow.
    Degraded,
    Unhealthy,
    /// Not checked; the generation service is never called by a health check.
    Skipped,
}

impl HealthStatus {
    /// Any unhealthy service makes the system unhealthy; any degraded one
    /// degrades it. Skipped services do not count.
    pub fn rollup<'a>(statuses: impl IntoIterator<Item = &'a HealthStatus>) -> HealthStatus {
        let mut overall = HealthStatus::Healthy;
        for status in statuses {
            match status {
                HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
                HealthStatus::Degraded => overall = HealthStatus::Degraded,
                HealthStatus::Healthy | HealthStatus::Skipped => {}
            }
        }
        overall
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    pub fn skipped() -> Self {
        Self {
            status: HealthStatus::Skipped,
            response_time_ms: None,
            error: None,
        }
    }
}

/// Result of one health check run, keyed by collaborator endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, ServiceHealth>,
}

impl HealthReport {
    pub fn new(services: BTreeMap<String, ServiceHealth>, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: HealthStatus::rollup(services.values().map(|s| &s.status)),
            timestamp,
            services,
        }
    }

    pub fn is_unhealthy(&self) -> bool {
        self.status == HealthStatus::Unhealthy
    }
}
