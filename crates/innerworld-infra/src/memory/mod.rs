//! In-memory collaborator stores.
//!
//! `DashMap`-backed implementations of the core store traits. They honour the
//! same contracts as the SQLite stores (TTL expiry, the
//! `(conversation_id, sequence)` conflict rule) and back the offline binary
//! mode and integration-style tests.

pub mod context_cache;
pub mod graph;
pub mod message;

pub use context_cache::InMemoryContextCache;
pub use graph::InMemoryGraphStore;
pub use message::InMemoryMessageStore;
