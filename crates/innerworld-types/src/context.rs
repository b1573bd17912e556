//! Cached user context and graph summary types.
//!
//! `UserContext` is the per-user cache entry read by the conversation pipeline.
//! It mirrors the graph store's derived summary and is never authoritative.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Opaque map of semantic fields carried by a context entry.
pub type ContextData = serde_json::Map<String, serde_json::Value>;

/// A per-user context cache entry.
///
/// Created at login, overwritten on refresh, evicted once `expires_at` passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub user_id: String,
    pub context_data: ContextData,
    pub last_updated: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UserContext {
    /// Build an entry stamped at `now` that expires `ttl` later.
    pub fn new(
        user_id: impl Into<String>,
        context_data: ContextData,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            context_data,
            last_updated: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// An entry is valid only while its expiry lies strictly in the future.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Derived per-user summary returned by the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub user_id: String,
    /// Short free-text description of what the graph knows about the user.
    pub summary: String,
    pub last_updated: DateTime<Utc>,
    /// Additional derived fields (e.g. `recent_themes`, `element_counts`).
    #[serde(default)]
    pub fields: ContextData,
}
