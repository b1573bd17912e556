//! Retryability rules per collaborator class.
//!
//! Classifiers match on [`ErrorKind`], never on error text.

use innerworld_types::error::{ErrorKind, RepositoryError};
use innerworld_types::llm::LlmError;

/// Cache store: timeouts, throttling and temporary unavailability.
pub fn cache_store(error: &RepositoryError) -> bool {
    error.kind().is_transient()
}

/// Durable message store: transient kinds plus partially applied batches and
/// conditional-write conflicts.
///
/// Conflicts are only safe to retry when the operation recomputes its
/// conditional key (the next sequence number) on every attempt.
pub fn durable_store(error: &RepositoryError) -> bool {
    let kind = error.kind();
    kind.is_transient() || matches!(kind, ErrorKind::Incomplete | ErrorKind::Conflict)
}

/// Graph store: transient kinds plus concurrent-modification conflicts.
pub fn graph_store(error: &RepositoryError) -> bool {
    let kind = error.kind();
    kind.is_transient() || kind == ErrorKind::Conflict
}

/// Generation service: provider-side failures, rate limits, overload and timeouts.
pub fn generation(error: &LlmError) -> bool {
    error.kind().is_transient()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_store_classification() {
        assert!(cache_store(&RepositoryError::Throttled("x".into())));
        assert!(cache_store(&RepositoryError::Timeout("x".into())));
        assert!(!cache_store(&RepositoryError::Conflict("x".into())));
        assert!(!cache_store(&RepositoryError::InvalidInput("x".into())));
    }

    #[test]
    fn test_durable_store_classification() {
        assert!(durable_store(&RepositoryError::Unavailable("x".into())));
        assert!(durable_store(&RepositoryError::Incomplete("x".into())));
        assert!(durable_store(&RepositoryError::Conflict("x".into())));
        assert!(!durable_store(&RepositoryError::Unauthorized));
        assert!(!durable_store(&RepositoryError::Query("x".into())));
    }

    #[test]
    fn test_graph_store_classification() {
        assert!(graph_store(&RepositoryError::Conflict("x".into())));
        assert!(graph_store(&RepositoryError::Unavailable("x".into())));
        assert!(!graph_store(&RepositoryError::Incomplete("x".into())));
        assert!(!graph_store(&RepositoryError::NotFound));
    }

    #[test]
    fn test_generation_classification() {
        assert!(generation(&LlmError::Provider {
            message: "502".into()
        }));
        assert!(generation(&LlmError::RateLimited {
            retry_after_ms: Some(100)
        }));
        assert!(generation(&LlmError::Overloaded("busy".into())));
        assert!(generation(&LlmError::Timeout(30_000)));

        assert!(!generation(&LlmError::AuthenticationFailed));
        assert!(!generation(&LlmError::InvalidRequest("bad".into())));
        assert!(!generation(&LlmError::ContextLengthExceeded {
            max: 1,
            requested: 2
        }));
        assert!(!generation(&LlmError::Deserialization("eof".into())));
    }
}
