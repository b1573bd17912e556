//! Offline generation service, used when no provider API key is configured.
//!
//! Persona requests get a fixed supportive reply. Extraction requests get an
//! empty JSON array, so session-end processing falls back to synthetic
//! elements.

use innerworld_core::llm::GenerationService;
use innerworld_core::session::extractor::EXTRACTION_SYSTEM_PROMPT;
use innerworld_types::llm::{CompletionRequest, CompletionResponse, LlmError, StopReason, Usage};

pub const OFFLINE_REPLY: &str =
    "Hello! I'm here to support you. (Offline reply: no generation provider is configured.)";

#[derive(Debug, Default)]
pub struct OfflineGenerator;

impl OfflineGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl GenerationService for OfflineGenerator {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let extraction = request.system.as_deref() == Some(EXTRACTION_SYSTEM_PROMPT);
        let content = if extraction { "[]" } else { OFFLINE_REPLY };

        Ok(CompletionResponse {
            id: format!("offline_{}", uuid::Uuid::now_v7().simple()),
            content: content.to_string(),
            model: "offline".to_string(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }
}
