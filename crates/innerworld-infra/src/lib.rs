//! Infrastructure layer for InnerWorld.
//!
//! Contains implementations of the collaborator traits defined in
//! `innerworld-core`: SQLite storage with split reader/writer pools, in-memory
//! stores with TTL expiry, the OpenAI-compatible and offline generation
//! services, and the `config.toml` loader.

pub mod config;
pub mod llm;
pub mod memory;
pub mod sqlite;
pub mod summary;
