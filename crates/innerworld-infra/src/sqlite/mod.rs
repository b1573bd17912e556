//! SQLite storage layer.
//!
//! Store implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod context_cache;
pub mod graph;
pub mod message;
pub mod pool;

use chrono::{DateTime, SecondsFormat, Utc};
use innerworld_types::error::RepositoryError;

pub use context_cache::SqliteContextCache;
pub use graph::SqliteGraphStore;
pub use message::SqliteMessageStore;
pub use pool::DatabasePool;

/// SQLite result codes for a locked or busy database.
const BUSY_CODES: [&str; 4] = ["5", "6", "261", "517"];

/// Map a sqlx error onto the structured repository taxonomy.
///
/// Only the error's kind is inspected; the message is carried for display.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::PoolTimedOut => RepositoryError::Timeout(err.to_string()),
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            RepositoryError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() {
                RepositoryError::Conflict(db.message().to_string())
            } else if db.is_foreign_key_violation() {
                RepositoryError::NotFound
            } else if db
                .code()
                .is_some_and(|code| BUSY_CODES.iter().any(|busy| *busy == code))
            {
                RepositoryError::Unavailable(db.message().to_string())
            } else {
                RepositoryError::Query(err.to_string())
            }
        }
        _ => RepositoryError::Query(err.to_string()),
    }
}

/// Fixed-width UTC timestamps so text comparison in SQL orders correctly.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use innerworld_types::error::ErrorKind;

    #[test]
    fn test_pool_errors_are_transient() {
        assert_eq!(map_sqlx_error(sqlx::Error::PoolTimedOut).kind(), ErrorKind::Timeout);
        assert_eq!(map_sqlx_error(sqlx::Error::PoolClosed).kind(), ErrorKind::Unavailable);
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(map_sqlx_error(sqlx::Error::Io(io)).kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_row_errors_are_queries() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Query(_)));
    }

    #[test]
    fn test_datetime_format_is_fixed_width() {
        let a = format_datetime(&"2025-01-01T00:00:00Z".parse().unwrap());
        let b = format_datetime(&"2025-01-01T00:00:00.5Z".parse().unwrap());
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_datetime(&b).unwrap().timestamp_subsec_millis(), 500);
    }
}
