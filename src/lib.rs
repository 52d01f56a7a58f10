//! mnemo - A local persistent memory store for chat agents.
//!
//! Saves conversation messages to SQLite, embeds them with a local model,
//! and retrieves the most relevant past messages by cosine similarity.
//! All operations are synchronous and take `&self`; one engine can be
//! shared between threads.
//!
//! # Example
//!
//! ```no_run
//! use mnemo::{Config, MemoryEngine};
//!
//! let engine = MemoryEngine::open(Config::load()?)?;
//!
//! engine.save("user", "I love Python programming", "chat-1", None, true)?;
//! engine.save("assistant", "Python is a fine choice", "chat-1", None, true)?;
//!
//! for memory in engine.retrieve("which language do I like?", 3, None, 0.0)? {
//!     println!("{:.2}: {}", memory.similarity, memory.content);
//! }
//!
//! engine.close()?;
//! # Ok::<(), mnemo::Error>(())
//! ```
//!
//! # Custom embedders
//!
//! Any [`Embedder`] can back the engine through [`MemoryEngine::new`]; the
//! bundled [`OnnxEmbedder`] is only the default.

pub mod config;
pub mod conversation;
pub mod embedding;
pub mod errors;
pub mod memory;
pub mod memory_types;
pub mod similarity;
pub mod sqlite;

// Re-export public API
pub use config::Config;
pub use conversation::{sanitize_conversation_id, DEFAULT_CONVERSATION_ID};
pub use embedding::{known_dimension, Embedder, LazyOnnxEmbedder, OnnxEmbedder, DEFAULT_MODEL};
pub use errors::Error;
pub use memory::MemoryEngine;
pub use memory_types::{EngineStats, NewMessage, RetrievedMemory};
pub use similarity::cosine_similarity;
pub use sqlite::Message;
