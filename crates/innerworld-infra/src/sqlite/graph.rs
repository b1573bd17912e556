//! SQLite graph store.
//!
//! Nodes hold extracted elements; edges tie them to the user's timeline. The
//! summary is derived from the user's nodes on every read.

use chrono::{DateTime, Utc};
use sqlx::Row;

use innerworld_core::repository::GraphStore;
use innerworld_types::context::GraphSummary;
use innerworld_types::element::ElementType;
use innerworld_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, map_sqlx_error, parse_datetime};
use crate::summary::{NodeDigest, derive_summary};

/// SQLite-backed implementation of `GraphStore`.
pub struct SqliteGraphStore {
    pool: DatabasePool,
}

impl SqliteGraphStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub async fn edge_count(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM graph_edges WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }
}

fn digest_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<NodeDigest, RepositoryError> {
    let element_type: String = row
        .try_get("element_type")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let content: String = row
        .try_get("content")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(NodeDigest {
        element_type: element_type.parse().map_err(RepositoryError::Query)?,
        content,
        created_at: parse_datetime(&created_at)?,
    })
}

impl GraphStore for SqliteGraphStore {
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

        sqlx::query(
            "INSERT INTO graph_nodes (id, user_id, element_type, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(element_type.as_str())
        .bind(content)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn create_edge(
        &self,
        user_id: &str,
        from_node: &str,
        edge_type: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        // Selecting through graph_nodes keeps edges within the owning user.
        let result = sqlx::query(
            r#"INSERT INTO graph_edges (user_id, from_node, edge_type, timestamp)
               SELECT user_id, id, ?, ? FROM graph_nodes WHERE id = ? AND user_id = ?"#,
        )
        .bind(edge_type)
        .bind(format_datetime(&timestamp))
        .bind(from_node)
        .bind(user_id)
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_summary(&self, user_id: &str) -> Result<GraphSummary, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT element_type, content, created_at FROM graph_nodes
               WHERE user_id = ?
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        let digests = rows
            .iter()
            .map(digest_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(derive_summary(user_id, digests, Utc::now()))
    }
}
