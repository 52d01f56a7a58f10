//! Memory engine data types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message to be saved, before the store assigns it an id.
///
/// Also the record format accepted by JSON imports.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl NewMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One ranked retrieval result.
///
/// Carries the stored message fields plus the cosine similarity (0.0 to 1.0)
/// between the message's embedding and the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedMemory {
    pub id: i64,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: String,
    pub similarity: f64,
    pub metadata: Option<Value>,
}

/// Store-wide aggregates plus the engine's own settings.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_messages: u64,
    /// Distinct conversation ids among stored messages.
    pub total_conversations: u64,
    pub total_embeddings: u64,
    pub first_message_time: Option<String>,
    pub last_message_time: Option<String>,
    pub database_path: PathBuf,
    pub embedding_model: String,
    /// Known output dimension of `embedding_model`, if it is in the lookup table.
    pub embedding_dimension: Option<usize>,
}
