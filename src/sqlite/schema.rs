//! SQLite DDL for the mnemo store.
//!
//! Every statement uses `IF NOT EXISTS`, so applying the schema to an
//! existing database is a no-op.

use std::time::Duration;

use rusqlite::Connection;

pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL,
    role            TEXT NOT NULL,
    content         TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    metadata        TEXT,               -- JSON, stored verbatim
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS embeddings (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    vector     BLOB NOT NULL,           -- little-endian f32
    model      TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    id         TEXT PRIMARY KEY,
    title      TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    metadata   TEXT
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp    ON messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_embeddings_message    ON embeddings(message_id);
"#;

/// Connection-level settings shared by the writer and every reader.
pub(crate) fn configure(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Switch the file to WAL and create tables and indexes.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode answers with the resulting mode, so it needs the checked variant.
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
