//! Session lifecycle logic and collaborator trait definitions for InnerWorld.
//!
//! This crate defines the "ports" (collaborator traits) that the infrastructure
//! layer implements, plus the resilience layer, the context cache manager, the
//! per-message conversation pipeline, and the session-end processor. It depends
//! only on `innerworld-types` -- never on `innerworld-infra` or any IO crate.

pub mod cache;
pub mod health;
pub mod llm;
pub mod persona;
pub mod pipeline;
pub mod repository;
pub mod resilience;
pub mod safety;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
