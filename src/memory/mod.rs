//! Memory engine orchestrating embedding and SQLite operations.
//!
//! Saves chat messages with optional embeddings, and retrieves them by
//! semantic similarity, keyword, or conversation history.

mod crud;
mod search;

// pub(crate): module internals hidden; public items re-exported explicitly via lib.rs
pub(crate) mod store;

pub use store::MemoryEngine;
