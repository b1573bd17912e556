//! Conversation elements extracted at session end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::context::ContextData;

/// Fixed vocabulary of semantic element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// Something that happened or is happening.
    Event,
    /// An emotion the user experienced.
    Feeling,
    /// Something that matters to the user or guides their decisions.
    Value,
    /// Something the user wants to achieve.
    Goal,
    /// A recurring behaviour pattern.
    Habit,
}

impl ElementType {
    pub const ALL: [ElementType; 5] = [
        ElementType::Event,
        ElementType::Feeling,
        ElementType::Value,
        ElementType::Goal,
        ElementType::Habit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Event => "Event",
            ElementType::Feeling => "Feeling",
            ElementType::Value => "Value",
            ElementType::Goal => "Goal",
            ElementType::Habit => "Habit",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "event" => Ok(ElementType::Event),
            "feeling" => Ok(ElementType::Feeling),
            "value" => Ok(ElementType::Value),
            "goal" => Ok(ElementType::Goal),
            "habit" => Ok(ElementType::Habit),
            other => Err(format!("invalid element type: '{other}'")),
        }
    }
}

/// A structured semantic record derived from a session transcript.
///
/// Never mutated after creation; written once to the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationElement {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub content: String,
    /// Model confidence, clamped to 0.0..=1.0.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: ContextData,
}

/// Where a session's elements came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// Parsed from the generation service's response.
    Model,
    /// Deterministic fallback derived from message count and persona.
    Synthetic,
}
