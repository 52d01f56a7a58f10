//! Retrieval operations for the memory engine (semantic and keyword).

use tracing::{debug, warn};

use crate::conversation::{sanitize_conversation_id, DEFAULT_CONVERSATION_ID};
use crate::errors::Error;
use crate::memory_types::RetrievedMemory;
use crate::similarity::{rank, Candidate};
use crate::sqlite::Message;

use super::store::MemoryEngine;

impl MemoryEngine {
    #[must_use = "handle the error or results may be lost"]
    /// Rank stored messages by cosine similarity to `query`.
    ///
    /// Only embeddings produced by this engine's model take part; vectors
    /// from other models live in a different space. With `conversation_id`
    /// set, only that conversation is searched.
    ///
    /// # Arguments
    ///
    /// * `query` - Text to search for
    /// * `top_k` - Maximum number of results
    /// * `conversation_id` - Restrict to one conversation (sanitized), or `None` for all
    /// * `threshold` - Minimum similarity, inclusive
    ///
    /// # Returns
    ///
    /// Up to `top_k` memories, highest similarity first. Ties keep the store's
    /// newest-first order. An empty store gives an empty list.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Query is empty, or threshold is NaN
    /// - The engine is closed
    /// - The query cannot be embedded (`Error::Retrieval`) or the embedder
    ///   times out (`Error::EmbeddingTimeout`)
    /// - A stored vector's length differs from the query vector's
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        conversation_id: Option<&str>,
        threshold: f64,
    ) -> Result<Vec<RetrievedMemory>, Error> {
        self.ensure_open()?;
        if query.trim().is_empty() {
            return Err(Error::invalid(vec!["query"]));
        }
        if threshold.is_nan() {
            return Err(Error::invalid(vec!["threshold"]));
        }

        let text = query.to_string();
        let query_vector = match self.call_embedder(move |embedder| embedder.embed(&text)) {
            Ok(vector) => vector,
            Err(e @ Error::EmbeddingTimeout(_)) => return Err(e),
            Err(e) => return Err(Error::Retrieval(e.to_string())),
        };

        let stored = self.with_db(|db| db.load_all_embeddings())?;
        if stored.is_empty() {
            debug!("no stored embeddings to rank");
            return Ok(Vec::new());
        }

        let model = self.embedder.model();
        let conversation_id = conversation_id.map(sanitize_conversation_id);
        let total = stored.len();

        let candidates: Vec<Candidate<Message>> = stored
            .into_iter()
            .filter(|e| e.model == model)
            .filter(|e| {
                conversation_id
                    .as_deref()
                    .is_none_or(|c| e.message.conversation_id == c)
            })
            .map(|e| Candidate {
                id: e.message_id,
                vector: e.vector,
                payload: e.message,
            })
            .collect();

        if candidates.is_empty() && conversation_id.is_none() {
            warn!(model, total, "no stored embeddings were produced by the active model");
        }

        let ranked = rank(&query_vector, candidates, top_k, threshold)?;
        debug!(results = ranked.len(), total, "retrieval complete");

        Ok(ranked
            .into_iter()
            .map(|r| RetrievedMemory {
                id: r.id,
                conversation_id: r.payload.conversation_id,
                role: r.payload.role,
                content: r.payload.content,
                timestamp: r.payload.timestamp,
                similarity: r.score,
                metadata: r.payload.metadata,
            })
            .collect())
    }

    #[must_use = "handle the error or results may be lost"]
    /// Case-insensitive substring search over one conversation's history.
    ///
    /// Scans the oldest `keyword_scan_limit` messages (see [`crate::Config`])
    /// of the conversation, `"default"` when none is given, and returns the
    /// first `limit` matches in chronological order. Needs no embeddings.
    pub fn keyword_search(
        &self,
        keyword: &str,
        conversation_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>, Error> {
        self.ensure_open()?;
        if keyword.trim().is_empty() {
            return Err(Error::invalid(vec!["keyword"]));
        }
        let conversation_id =
            sanitize_conversation_id(conversation_id.unwrap_or(DEFAULT_CONVERSATION_ID));
        let needle = keyword.to_lowercase();

        let history =
            self.with_db(|db| db.load_history(&conversation_id, self.config.keyword_scan_limit))?;

        Ok(history
            .into_iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .take(limit)
            .collect())
    }
}
