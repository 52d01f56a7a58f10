//! Save, history, forget and stats operations for the memory engine.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::conversation::{sanitize_conversation_id, validate_message};
use crate::embedding::known_dimension;
use crate::errors::Error;
use crate::memory_types::{EngineStats, NewMessage};
use crate::sqlite::Message;

use super::store::MemoryEngine;

impl MemoryEngine {
    #[must_use = "handle the error or the message id is lost"]
    /// Persist one message and, when `want_embedding` is set, its embedding.
    ///
    /// The message is stored first. Embedding is best-effort: if the embedder
    /// fails, times out, or the vector cannot be written, the failure is
    /// logged at warn level and the message stays saved without a vector.
    ///
    /// # Arguments
    ///
    /// * `role` - Speaker role, conventionally "user", "assistant" or "system"
    /// * `content` - Message text
    /// * `conversation_id` - Raw conversation id; sanitized before use
    /// * `metadata` - Optional JSON metadata stored with the message
    /// * `want_embedding` - Whether to embed the content for retrieval
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Role, content or conversation id is empty
    /// - The engine is closed
    /// - The message cannot be written
    pub fn save(
        &self,
        role: &str,
        content: &str,
        conversation_id: &str,
        metadata: Option<&Value>,
        want_embedding: bool,
    ) -> Result<i64, Error> {
        validate_message(role, content, conversation_id)?;
        let conversation_id = sanitize_conversation_id(conversation_id);

        let message_id =
            self.with_db(|db| db.insert_message(&conversation_id, role, content, metadata))?;
        debug!(message_id, conversation = %conversation_id, role, "message saved");

        if want_embedding {
            let text = content.to_string();
            match self.call_embedder(move |embedder| embedder.embed(&text)) {
                Ok(vector) => self.store_embedding(message_id, &vector),
                Err(e) => warn!(message_id, error = %e, "embedding failed; message saved without vector"),
            }
        }

        Ok(message_id)
    }

    #[must_use = "handle the error or the message ids are lost"]
    /// Persist several messages of one conversation in a single transaction.
    ///
    /// All messages are validated before anything is written; an invalid one
    /// rejects the whole batch. Embeddings are produced in one batch call and
    /// follow the same best-effort policy as [`MemoryEngine::save`].
    ///
    /// Returns the new ids in input order.
    pub fn save_batch(
        &self,
        conversation_id: &str,
        messages: &[NewMessage],
        want_embedding: bool,
    ) -> Result<Vec<i64>, Error> {
        for message in messages {
            validate_message(&message.role, &message.content, conversation_id)?;
        }
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let conversation_id = sanitize_conversation_id(conversation_id);

        let ids = self.with_db(|db| db.insert_messages(&conversation_id, messages))?;
        info!(count = ids.len(), conversation = %conversation_id, "messages saved");

        if want_embedding {
            let texts: Vec<String> = messages.iter().map(|m| m.content.clone()).collect();
            let result = self.call_embedder(move |embedder| {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                embedder.embed_batch(&refs)
            });
            match result {
                Ok(vectors) if vectors.len() == ids.len() => {
                    for (id, vector) in ids.iter().zip(&vectors) {
                        self.store_embedding(*id, vector);
                    }
                }
                Ok(vectors) => warn!(
                    expected = ids.len(),
                    got = vectors.len(),
                    "embedder returned wrong number of vectors; messages saved without vectors"
                ),
                Err(e) => warn!(error = %e, "batch embedding failed; messages saved without vectors"),
            }
        }

        Ok(ids)
    }

    /// Best-effort write of one vector, tagged with the active model.
    fn store_embedding(&self, message_id: i64, vector: &[f32]) {
        let model = self.embedder.model();
        match self.with_db(|db| db.insert_embedding(message_id, vector, model)) {
            Ok(_) => debug!(message_id, dims = vector.len(), model, "embedding stored"),
            Err(e) => warn!(message_id, error = %e, "failed to store embedding"),
        }
    }

    #[must_use = "handle the error or results may be lost"]
    /// Oldest `limit` messages of a conversation, in chronological order.
    ///
    /// A limit of 0 returns nothing. Unknown conversations yield an empty list.
    pub fn history(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, Error> {
        let conversation_id = sanitize_conversation_id(conversation_id);
        self.with_db(|db| db.load_history(&conversation_id, limit))
    }

    /// Delete every message of a conversation along with its embeddings.
    ///
    /// Returns the number of messages removed; 0 for an unknown conversation.
    pub fn forget(&self, conversation_id: &str) -> Result<usize, Error> {
        let conversation_id = sanitize_conversation_id(conversation_id);
        let deleted = self.with_db(|db| db.delete_conversation(&conversation_id))?;
        info!(conversation = %conversation_id, deleted, "conversation forgotten");
        Ok(deleted)
    }

    #[must_use = "handle the error or results may be lost"]
    /// Store-wide counts and time range, plus this engine's settings.
    pub fn stats(&self) -> Result<EngineStats, Error> {
        let stats = self.with_db(|db| db.statistics())?;
        let model = self.embedder.model().to_string();

        Ok(EngineStats {
            total_messages: stats.total_messages,
            total_conversations: stats.total_conversations,
            total_embeddings: stats.total_embeddings,
            first_message_time: stats.first_message_time,
            last_message_time: stats.last_message_time,
            database_path: self.database_path().to_path_buf(),
            embedding_dimension: known_dimension(&model),
            embedding_model: model,
        })
    }
}
