//! Generation service implementations.
//!
//! [`create_generation_service`] picks the OpenAI-compatible client when an
//! API key is available and the offline generator otherwise.

pub mod offline;
pub mod openai_compat;

use secrecy::SecretString;

use innerworld_core::llm::BoxGenerationService;
use innerworld_types::config::ProviderConfig;

pub use offline::OfflineGenerator;
pub use openai_compat::OpenAiCompatibleGenerator;

/// Build the generation backend for the configured provider.
pub fn create_generation_service(
    config: &ProviderConfig,
    api_key: Option<&SecretString>,
) -> BoxGenerationService {
    match api_key {
        Some(key) => {
            tracing::info!(provider = %config.name, model = %config.model, "using remote generation provider");
            BoxGenerationService::new(OpenAiCompatibleGenerator::new(config, key))
        }
        None => {
            tracing::warn!(
                env = %config.api_key_env,
                "no API key configured, using offline generation"
            );
            BoxGenerationService::new(OfflineGenerator::new())
        }
    }
}
