//! GenerationService trait definition.
//!
//! The text-generation collaborator used for persona replies and for
//! session-end element extraction.

use innerworld_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for text-generation backends (OpenAI-compatible endpoints, offline).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in innerworld-infra.
pub trait GenerationService: Send + Sync {
    /// Human-readable backend name (e.g., "openrouter", "offline").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
