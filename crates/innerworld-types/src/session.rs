//! Session-end request and result shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::element::{ConversationElement, ExtractionSource};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    Timeout,
    Manual,
    Disconnect,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Timeout => write!(f, "timeout"),
            EndReason::Manual => write!(f, "manual"),
            EndReason::Disconnect => write!(f, "disconnect"),
        }
    }
}

impl FromStr for EndReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "timeout" => Ok(EndReason::Timeout),
            "manual" => Ok(EndReason::Manual),
            "disconnect" => Ok(EndReason::Disconnect),
            other => Err(format!("invalid end reason: '{other}'")),
        }
    }
}

/// Request to process a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndRequest {
    pub session_id: String,
    pub user_id: String,
    pub reason: EndReason,
}

/// Outcome of session-end processing. Returned to the caller, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProcessingResult {
    pub session_id: String,
    pub processed_at: DateTime<Utc>,
    pub elements_extracted: Vec<ConversationElement>,
    pub graph_nodes_created: u32,
    pub graph_edges_created: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_source: Option<ExtractionSource>,
    /// Best-effort failures from graph writes, cache refresh, and cleanup.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SessionProcessingResult {
    /// A not-yet-successful result stamped at `processed_at`.
    pub fn pending(session_id: impl Into<String>, processed_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            processed_at,
            elements_extracted: Vec::new(),
            graph_nodes_created: 0,
            graph_edges_created: 0,
            success: false,
            error: None,
            extraction_source: None,
            warnings: Vec::new(),
        }
    }
}
