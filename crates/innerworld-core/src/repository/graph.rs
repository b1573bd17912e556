//! Graph store trait definition.
//!
//! The graph store is the authoritative long-term memory: one node per
//! extracted conversation element, linked by temporal edges.

use chrono::{DateTime, Utc};
use innerworld_types::context::GraphSummary;
use innerworld_types::element::ElementType;
use innerworld_types::error::RepositoryError;

/// Edge type linking a user to an element in time order.
pub const TEMPORAL_EDGE: &str = "temporal";

/// Authoritative per-user element graph.
pub trait GraphStore: Send + Sync {
    /// Create a node for an element. Returns the new node id.
    fn create_node(
        &self,
        user_id: &str,
        element_type: ElementType,
        content: &str,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Create an edge from the user's timeline to `from_node`.
    fn create_edge(
        &self,
        user_id: &str,
        from_node: &str,
        edge_type: &str,
        timestamp: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Derived summary of everything the graph knows about a user.
    ///
    /// Users with no nodes still get a summary (empty fields).
    fn get_summary(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<GraphSummary, RepositoryError>> + Send;
}
