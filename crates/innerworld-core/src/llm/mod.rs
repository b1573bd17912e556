pub mod box_provider;
pub mod provider;

pub use box_provider::BoxGenerationService;
pub use provider::GenerationService;
