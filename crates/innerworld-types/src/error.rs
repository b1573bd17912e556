use std::fmt;

use thiserror::Error;

/// Structured classification of a collaborator failure.
///
/// Retry classifiers match on this value instead of inspecting error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The call did not complete within its deadline.
    Timeout,
    /// The collaborator asked us to slow down (429, throughput exceeded).
    Throttled,
    /// The collaborator is temporarily unreachable or overloaded.
    Unavailable,
    /// A conditional write collided with a concurrent writer.
    Conflict,
    /// A batch operation only partially applied.
    Incomplete,
    /// The request itself is malformed; retrying cannot help.
    InvalidInput,
    /// Credentials were missing or rejected.
    Unauthorized,
    /// The addressed entity does not exist.
    NotFound,
    /// Anything else the driver could not classify.
    Internal,
}

impl ErrorKind {
    /// Timeouts, throttling and temporary unavailability.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Throttled | ErrorKind::Unavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Throttled => "throttled",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Incomplete => "incomplete",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Errors from store collaborators (message store, context cache, graph store).
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("partially applied: {0}")]
    Incomplete(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("entity not found")]
    NotFound,

    #[error("query error: {0}")]
    Query(String),
}

impl RepositoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::Timeout(_) => ErrorKind::Timeout,
            RepositoryError::Throttled(_) => ErrorKind::Throttled,
            RepositoryError::Unavailable(_) => ErrorKind::Unavailable,
            RepositoryError::Conflict(_) => ErrorKind::Conflict,
            RepositoryError::Incomplete(_) => ErrorKind::Incomplete,
            RepositoryError::InvalidInput(_) => ErrorKind::InvalidInput,
            RepositoryError::Unauthorized => ErrorKind::Unauthorized,
            RepositoryError::NotFound => ErrorKind::NotFound,
            RepositoryError::Query(_) => ErrorKind::Internal,
        }
    }
}

/// Terminal outcome of a call mediated by the resilience layer.
///
/// `E` is the collaborator's own error type.
#[derive(Debug, Error)]
pub enum ResilienceError<E: std::error::Error + 'static> {
    /// The caller's cancellation token fired before the call completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The breaker for `endpoint` is open; the operation was not invoked.
    #[error("circuit breaker for '{endpoint}' is open, rejecting request")]
    CircuitOpen { endpoint: String },

    /// The classifier judged the error permanent; no further attempts were made.
    #[error("non-retryable error: {0}")]
    NonRetryable(#[source] E),

    /// Every attempt failed with a retryable error.
    #[error("retry exhausted after {attempts} attempts, last error: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E: std::error::Error + 'static> ResilienceError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Cancelled)
    }

    /// The underlying collaborator error, if one was observed.
    pub fn inner(&self) -> Option<&E> {
        match self {
            ResilienceError::NonRetryable(e) => Some(e),
            ResilienceError::Exhausted { source, .. } => Some(source),
            ResilienceError::Cancelled | ResilienceError::CircuitOpen { .. } => None,
        }
    }
}
