//! Shared domain types for the InnerWorld session lifecycle.
//!
//! This crate contains the data shapes passed between the conversation
//! pipeline, the context cache, and the session-end processor, plus the
//! structured error types every collaborator reports.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, chrono, thiserror.

pub mod config;
pub mod context;
pub mod conversation;
pub mod element;
pub mod error;
pub mod health;
pub mod llm;
pub mod persona;
pub mod session;
