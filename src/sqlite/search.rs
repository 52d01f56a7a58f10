//! Candidate loading for retrieval and aggregate statistics.

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use super::{embedding, row_to_message, Database, Message, Result};

/// An embedding joined with the message that owns it.
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub message_id: i64,
    pub vector: Vec<f32>,
    /// Model that produced `vector`.
    pub model: String,
    pub message: Message,
}

/// Aggregate counts over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_messages: u64,
    pub total_conversations: u64,
    pub total_embeddings: u64,
    pub first_message_time: Option<String>,
    pub last_message_time: Option<String>,
}

impl Database {
    /// Every embedding with its owning message, newest message first.
    ///
    /// This is the full candidate set for retrieval; no filtering happens here.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or a stored vector BLOB is malformed.
    pub fn load_all_embeddings(&self) -> Result<Vec<StoredEmbedding>> {
        self.with_reader(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT m.id, m.conversation_id, m.role, m.content, m.timestamp, m.metadata,
                       e.vector, e.model
                FROM messages m
                JOIN embeddings e ON e.message_id = m.id
                ORDER BY m.timestamp DESC, m.id DESC, e.id ASC
                "#,
            )?;

            let rows = stmt.query_map([], |row| {
                Ok((
                    row_to_message(row)?,
                    row.get::<_, Vec<u8>>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?;

            let mut candidates = Vec::new();
            for row_result in rows {
                let (message, blob, model) = row_result?;
                candidates.push(StoredEmbedding {
                    message_id: message.id,
                    vector: embedding::blob_to_vec(&blob)?,
                    model,
                    message,
                });
            }

            debug!(count = candidates.len(), "loaded embeddings");
            Ok(candidates)
        })
    }

    /// Store-wide counts and the creation-time range of stored messages.
    ///
    /// The conversation count is taken from distinct `conversation_id`s among
    /// messages, not from the conversations table.
    ///
    /// # Errors
    ///
    /// Returns error if any aggregate query fails.
    pub fn statistics(&self) -> Result<Statistics> {
        self.with_reader(|conn| {
            let (total_messages, total_conversations, first, last) = conn.query_row(
                r#"
                SELECT COUNT(*), COUNT(DISTINCT conversation_id), MIN(timestamp), MAX(timestamp)
                FROM messages
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )?;

            Ok(Statistics {
                total_messages: total_messages as u64,
                total_conversations: total_conversations as u64,
                total_embeddings: count_embeddings(conn)?,
                first_message_time: first,
                last_message_time: last,
            })
        })
    }
}

fn count_embeddings(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(&path, Duration::from_secs(5)).unwrap();
        (dir, db)
    }

    #[test]
    fn test_load_all_embeddings_empty() {
        let (_dir, db) = create_test_db();
        db.insert_message("c1", "user", "no vector", None).unwrap();
        assert!(db.load_all_embeddings().unwrap().is_empty());
    }

    #[test]
    fn test_load_all_embeddings_joins_message() {
        let (_dir, db) = create_test_db();
        let id = db.insert_message("c1", "user", "rust", None).unwrap();
        db.insert_embedding(id, &[0.5, 0.25, -1.0], "model-a").unwrap();

        let all = db.load_all_embeddings().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].message_id, id);
        assert_eq!(all[0].vector, vec![0.5, 0.25, -1.0]);
        assert_eq!(all[0].model, "model-a");
        assert_eq!(all[0].message.content, "rust");
    }

    #[test]
    fn test_load_all_embeddings_newest_first() {
        let (_dir, db) = create_test_db();
        let older = db.insert_message("c1", "user", "older", None).unwrap();
        let newer = db.insert_message("c2", "user", "newer", None).unwrap();
        db.insert_embedding(older, &[1.0], "m").unwrap();
        db.insert_embedding(newer, &[1.0], "m").unwrap();

        let all = db.load_all_embeddings().unwrap();
        assert_eq!(all[0].message_id, newer);
        assert_eq!(all[1].message_id, older);
    }

    #[test]
    fn test_load_all_embeddings_keeps_every_model() {
        let (_dir, db) = create_test_db();
        let id = db.insert_message("c1", "user", "twice", None).unwrap();
        db.insert_embedding(id, &[1.0, 0.0], "small").unwrap();
        db.insert_embedding(id, &[1.0, 0.0, 0.0, 0.0], "large").unwrap();

        let all = db.load_all_embeddings().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].model, "small");
        assert_eq!(all[1].model, "large");
    }

    #[test]
    fn test_statistics_empty_store() {
        let (_dir, db) = create_test_db();
        let stats = db.statistics().unwrap();
        assert_eq!(stats, Statistics::default());
    }

    #[test]
    fn test_statistics_counts() {
        let (_dir, db) = create_test_db();
        let a = db.insert_message("c1", "user", "a", None).unwrap();
        db.insert_message("c1", "assistant", "b", None).unwrap();
        let c = db.insert_message("c2", "user", "c", None).unwrap();
        db.insert_embedding(a, &[1.0], "m").unwrap();
        db.insert_embedding(c, &[1.0], "m").unwrap();

        let stats = db.statistics().unwrap();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.total_conversations, 2);
        assert_eq!(stats.total_embeddings, 2);
        let first = stats.first_message_time.unwrap();
        let last = stats.last_message_time.unwrap();
        assert!(first <= last);
    }

    #[test]
    fn test_statistics_ignore_stale_conversation_rows() {
        let (_dir, db) = create_test_db();
        db.insert_message("c1", "user", "a", None).unwrap();
        db.writer()
            .execute(
                "INSERT INTO conversations (id, created_at, updated_at) VALUES ('ghost', 'x', 'x')",
                [],
            )
            .unwrap();

        assert_eq!(db.statistics().unwrap().total_conversations, 1);
    }
}
