//! In-memory graph store.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use innerworld_core::repository::GraphStore;
use innerworld_types::context::GraphSummary;
use innerworld_types::element::ElementType;
use innerworld_types::error::RepositoryError;

use crate::summary::{NodeDigest, derive_summary};

#[derive(Debug, Clone)]
struct Node {
    id: String,
    element_type: ElementType,
    content: String,
    created_at: DateTime<Utc>,
}

/// A timeline edge from the user to one of their nodes.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from_node: String,
    pub edge_type: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-user nodes and timeline edges.
#[derive(Default)]
pub struct InMemoryGraphStore {
    nodes: DashMap<String, Vec<Node>>,
    edges: DashMap<String, Vec<Edge>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self, user_id: &str) -> usize {
        self.nodes.get(user_id).map(|n| n.len()).unwrap_or(0)
    }

    pub fn edge_count(&self, user_id: &str) -> usize {
        self.edges.get(user_id).map(|e| e.len()).unwrap_or(0)
    }

    /// The user's edges in creation order.
    pub fn edges(&self, user_id: &str) -> Vec<Edge> {
        self.edges.get(user_id).map(|e| e.value().clone()).unwrap_or_default()
    }
}

impl GraphStore for InMemoryGraphStore {
    async fn create_node(
        &self,
        user_id: &str,
        element_type: ElementType,
        content: &str,
    ) -> Result<String, RepositoryError> {
        if content.trim().is_empty() {
            return Err(RepositoryError::InvalidInput("node content is empty".into()));
        }
        let id = format!("node_{}", uuid::Uuid::now_v7().simple());
        self.nodes.entry(user_id.to_string()).or_default().push(Node {
            id: id.clone(),
            element_type,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn create_edge(
        &self,
        user_id: &str,
        from_node: &str,
        edge_type: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let known = self
            .nodes
            .get(user_id)
            .is_some_and(|nodes| nodes.iter().any(|n| n.id == from_node));
        if !known {
            return Err(RepositoryError::NotFound);
        }
        self.edges.entry(user_id.to_string()).or_default().push(Edge {
            from_node: from_node.to_string(),
            edge_type: edge_type.to_string(),
            timestamp,
        });
        Ok(())
    }

    async fn get_summary(&self, user_id: &str) -> Result<GraphSummary, RepositoryError> {
        let digests = self
            .nodes
            .get(user_id)
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|n| NodeDigest {
                        element_type: n.element_type,
                        content: n.content.clone(),
                        created_at: n.created_at,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(derive_summary(user_id, digests, Utc::now()))
    }
}
