//! User context caching: login-time population, read-through lookup, and
//! session-end refresh.

pub mod manager;

pub use manager::{CacheError, ContextCacheManager};
