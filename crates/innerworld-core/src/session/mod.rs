//! Session-end processing: element extraction, graph update, context
//! refresh, and transcript cleanup.

pub mod extractor;
pub mod ledger;
pub mod processor;

use innerworld_types::error::{RepositoryError, ResilienceError};

pub use extractor::{ElementExtractor, Extraction};
pub use ledger::{GraphWriteLedger, WriteOutcome};
pub use processor::SessionEndProcessor;

/// Hard failures of session-end processing.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session processing cancelled")]
    Cancelled,

    #[error("failed to read session transcript: {0}")]
    Transcript(#[source] ResilienceError<RepositoryError>),
}
