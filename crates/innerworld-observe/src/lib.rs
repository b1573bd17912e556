//! Observability setup for InnerWorld: subscriber initialization and
//! GenAI semantic-convention attribute names for generation spans.

pub mod genai_attrs;
pub mod tracing_setup;

pub use tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
