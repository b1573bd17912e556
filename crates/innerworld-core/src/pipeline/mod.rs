//! Per-message conversation pipeline.
//!
//! Five sequential stages: input safety, persona/context injection,
//! generation, output safety, durable append. Every stage that can fail
//! degrades to a fixed fallback reply; only malformed input and cancellation
//! surface as errors.

pub mod conversation;

pub use conversation::ConversationPipeline;

/// Reply when the user's message trips the input safety check.
pub const INPUT_SAFETY_FALLBACK: &str = "I understand you might be going through a difficult \
time. Please consider talking to a trusted adult or calling 988 (Suicide & Crisis Lifeline) \
if you need immediate support.";

/// Reply when the generated response trips the output safety check.
pub const OUTPUT_SAFETY_FALLBACK: &str =
    "I want to support you in a safe and helpful way. Let's focus on something positive.";

/// Reply when the generation service could not produce a response.
pub const GENERATION_FALLBACK: &str =
    "I'm sorry, I'm having trouble generating a response right now.";

/// Reply when the generation service returned an empty completion.
pub const EMPTY_RESPONSE_FALLBACK: &str = "I'm here for you. What would you like to talk about?";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conversation cancelled")]
    Cancelled,
}
