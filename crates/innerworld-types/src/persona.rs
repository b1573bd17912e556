//! Persona template type.

use serde::{Deserialize, Serialize};

/// A persona the assistant speaks as.
///
/// Only the injection contract matters to the pipeline: the system prompt,
/// the boundaries appended after it, and the tone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaTemplate {
    pub name: String,
    pub system_prompt: String,
    #[serde(default)]
    pub boundaries: Vec<String>,
    #[serde(default)]
    pub tone: String,
}
