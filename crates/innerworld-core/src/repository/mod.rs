//! Collaborator trait definitions (ports).
//!
//! These traits define the storage interfaces that the infrastructure layer
//! (innerworld-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod context_cache;
pub mod graph;
pub mod message;

pub use context_cache::ContextCacheStore;
pub use graph::GraphStore;
pub use message::MessageStore;
