//! SQLite backend for mnemo message storage.
//!
//! This module provides:
//! - `Database`: connection management, transactional writes, history queries
//! - `Message`: a stored conversational turn
//! - `embedding`: BLOB conversion for vectors
//! - `search`: candidate loading for retrieval and aggregate statistics
//!
//! Writes go through a single writer connection behind a mutex. Reads check
//! out a read-only connection from a small pool, so with WAL journaling they
//! never wait on an in-progress write.

pub mod embedding;
mod schema;
pub mod search;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, Row, Transaction};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::memory_types::NewMessage;

pub use self::embedding::{blob_to_vec, vec_to_blob};
pub use self::search::{Statistics, StoredEmbedding};

/// Idle read connections kept around for reuse.
const MAX_IDLE_READERS: usize = 4;

/// A single stored message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    /// Creation time (RFC 3339, UTC). Set once at insert.
    pub timestamp: String,
    pub metadata: Option<Value>,
}

/// Error types for SQLite operations.
#[derive(Debug)]
pub enum Error {
    Sqlite(String),
    InvalidBlobSize { actual: usize },
    Metadata(String),
    Lock(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Sqlite(msg) => write!(f, "Database error: {}", msg),
            Error::InvalidBlobSize { actual } => {
                write!(
                    f,
                    "Invalid BLOB size: {} bytes is not a whole number of f32 values",
                    actual
                )
            }
            Error::Metadata(msg) => write!(f, "Invalid metadata: {}", msg),
            Error::Lock(msg) => write!(f, "Connection lock poisoned: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Sqlite(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// SQLite database backend for mnemo.
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
}

impl Database {
    /// Open or create a SQLite database at the given path.
    ///
    /// Switches the file to WAL journaling and initializes the schema if the
    /// database is new. `busy_timeout` bounds how long any connection waits on
    /// a lock held by another connection.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or schema initialization fails.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::configure(&conn, busy_timeout)?;
        schema::apply_schema(&conn)?;
        info!(path = %path.display(), "opened message store");

        Ok(Self {
            path: path.to_path_buf(),
            busy_timeout,
            writer: Mutex::new(conn),
            readers: Mutex::new(Vec::new()),
        })
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a message, creating or refreshing its conversation record.
    ///
    /// Conversation upsert and message insert commit together or not at all.
    ///
    /// # Errors
    ///
    /// Returns error if metadata cannot be serialized or the write fails.
    pub fn insert_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
        metadata: Option<&Value>,
    ) -> Result<i64> {
        let metadata = encode_metadata(metadata)?;

        // Clock is read under the writer lock so timestamps follow id order.
        let mut conn = self.lock_writer()?;
        let now = now_timestamp();
        let tx = conn.transaction()?;
        touch_conversation(&tx, conversation_id, &now)?;
        let id = insert_message_row(&tx, conversation_id, role, content, metadata.as_deref(), &now)?;
        tx.commit()?;

        debug!(message_id = id, conversation_id, "inserted message");
        Ok(id)
    }

    /// Insert several messages into one conversation in a single transaction.
    ///
    /// Returns the assigned ids in input order. Either every message is
    /// stored or none is.
    ///
    /// # Errors
    ///
    /// Returns error if any metadata cannot be serialized or the write fails.
    pub fn insert_messages(&self, conversation_id: &str, messages: &[NewMessage]) -> Result<Vec<i64>> {
        let encoded = messages
            .iter()
            .map(|m| encode_metadata(m.metadata.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.lock_writer()?;
        let tx = conn.transaction()?;
        let now = now_timestamp();
        touch_conversation(&tx, conversation_id, &now)?;

        let mut ids = Vec::with_capacity(messages.len());
        for (message, metadata) in messages.iter().zip(&encoded) {
            // Per-row timestamps keep chronological order stable within the batch.
            let ts = now_timestamp();
            ids.push(insert_message_row(
                &tx,
                conversation_id,
                &message.role,
                &message.content,
                metadata.as_deref(),
                &ts,
            )?);
        }
        tx.commit()?;

        debug!(conversation_id, count = ids.len(), "inserted message batch");
        Ok(ids)
    }

    /// Attach a vector to an existing message.
    ///
    /// # Errors
    ///
    /// Returns error if `message_id` does not reference a stored message
    /// (foreign key violation) or the write fails.
    pub fn insert_embedding(&self, message_id: i64, vector: &[f32], model: &str) -> Result<i64> {
        let blob = vec_to_blob(vector);

        let conn = self.lock_writer()?;
        let now = now_timestamp();
        conn.execute(
            r#"
            INSERT INTO embeddings (message_id, vector, model, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![message_id, &blob, model, &now],
        )?;
        let id = conn.last_insert_rowid();

        debug!(embedding_id = id, message_id, model, dims = vector.len(), "inserted embedding");
        Ok(id)
    }

    /// Messages of one conversation in creation order, at most `limit` of them.
    ///
    /// A limit of 0 yields no rows.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn load_history(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.with_reader(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, conversation_id, role, content, timestamp, metadata
                FROM messages
                WHERE conversation_id = ?1
                ORDER BY timestamp ASC, id ASC
                LIMIT ?2
                "#,
            )?;
            let messages = stmt
                .query_map(params![conversation_id, limit], row_to_message)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(messages)
        })
    }

    /// Delete every message of a conversation (embeddings cascade), then the
    /// conversation record.
    ///
    /// Returns the number of messages removed; 0 when the conversation is unknown.
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails. Nothing is removed in that case.
    pub fn delete_conversation(&self, conversation_id: &str) -> Result<usize> {
        let mut conn = self.lock_writer()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            [conversation_id],
        )?;
        tx.execute("DELETE FROM conversations WHERE id = ?1", [conversation_id])?;
        tx.commit()?;

        info!(conversation_id, deleted, "deleted conversation");
        Ok(deleted)
    }

    /// Close every connection, reporting a failure to close the writer.
    ///
    /// # Errors
    ///
    /// Returns error if SQLite refuses to close the writer connection.
    pub fn close(self) -> Result<()> {
        let readers = self
            .readers
            .into_inner()
            .map_err(|e| Error::Lock(e.to_string()))?;
        drop(readers);

        let writer = self
            .writer
            .into_inner()
            .map_err(|e| Error::Lock(e.to_string()))?;
        writer.close().map_err(|(_, e)| Error::from(e))?;

        info!(path = %self.path.display(), "closed message store");
        Ok(())
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer.lock().map_err(|e| Error::Lock(e.to_string()))
    }

    /// Run `f` on a pooled read-only connection, opening one if none is idle.
    pub(crate) fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let idle = self
            .readers
            .lock()
            .map_err(|e| Error::Lock(e.to_string()))?
            .pop();
        let conn = match idle {
            Some(conn) => conn,
            None => self.open_reader()?,
        };

        let result = f(&conn);

        if let Ok(mut pool) = self.readers.lock() {
            if pool.len() < MAX_IDLE_READERS {
                pool.push(conn);
            }
        }
        result
    }

    fn open_reader(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    /// Writer connection, for tests that need to poke at raw tables.
    #[cfg(test)]
    pub(crate) fn writer(&self) -> MutexGuard<'_, Connection> {
        self.writer.lock().unwrap()
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_metadata(metadata: Option<&Value>) -> Result<Option<String>> {
    match metadata {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::to_string(value)
            .map(Some)
            .map_err(|e| Error::Metadata(e.to_string())),
    }
}

fn touch_conversation(tx: &Transaction<'_>, conversation_id: &str, now: &str) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO conversations (id, created_at, updated_at)
        VALUES (?1, ?2, ?2)
        ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at
        "#,
        params![conversation_id, now],
    )?;
    Ok(())
}

fn insert_message_row(
    tx: &Transaction<'_>,
    conversation_id: &str,
    role: &str,
    content: &str,
    metadata: Option<&str>,
    now: &str,
) -> Result<i64> {
    tx.execute(
        r#"
        INSERT INTO messages (conversation_id, role, content, timestamp, metadata, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?4)
        "#,
        params![conversation_id, role, content, now, metadata],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Map `id, conversation_id, role, content, timestamp, metadata` columns.
pub(crate) fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let metadata: Option<String> = row.get(5)?;
    let metadata = metadata
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        timestamp: row.get(4)?,
        metadata,
    })
}
