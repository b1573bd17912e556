//! Conversation transcript types.
//!
//! These types model the live, TTL-bounded transcript of a session: the
//! durable records appended by the conversation pipeline and the request/reply
//! shapes of a single message exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Author of a transcript record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Assistant,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::User => write!(f, "user"),
            MessageType::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageType::User),
            "assistant" => Ok(MessageType::Assistant),
            other => Err(format!("invalid message type: '{other}'")),
        }
    }
}

/// One append-only record in the durable message store.
///
/// Keyed by `(conversation_id, sequence)`. Records within a session are
/// ordered by `sequence`, which is strictly increasing and starts at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub conversation_id: String,
    pub message_id: String,
    pub session_id: String,
    pub user_id: String,
    pub persona: String,
    pub sequence: u64,
    pub message_type: MessageType,
    pub content: String,
    pub session_start: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Composite conversation key: the session plus the calendar day it started.
pub fn conversation_id(session_id: &str, session_start: DateTime<Utc>) -> String {
    format!("{session_id}_{}", session_start.format("%Y-%m-%d"))
}

/// One inbound user message, as handed to the conversation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInput {
    pub session_id: String,
    pub user_id: String,
    pub persona: String,
    pub message: String,
    pub session_start: DateTime<Utc>,
}

/// The assistant-visible reply to one user message.
///
/// Identical in shape whether the model answered or a fallback was used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReply {
    pub message_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}
