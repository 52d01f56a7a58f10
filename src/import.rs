//! Message import from JSON exports.
//!
//! The file holds a JSON array of records:
//!
//! ```json
//! [
//!   {"role": "user", "content": "hi", "conversation_id": "c1"},
//!   {"role": "assistant", "content": "hello", "metadata": {"model": "x"}}
//! ]
//! ```
//!
//! Records without `conversation_id` go to the conversation given on the
//! command line.

use std::collections::HashSet;
use std::path::Path;

use mnemo::conversation::sanitize_conversation_id;
use mnemo::{Error, MemoryEngine, NewMessage};
use serde::Deserialize;
use tracing::{info, warn};

/// One record of a JSON export.
#[derive(Debug, Deserialize)]
pub struct ImportRecord {
    #[serde(flatten)]
    pub message: NewMessage,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Import statistics for reporting.
#[derive(Debug, Default, Clone)]
pub struct ImportStats {
    pub total_messages: usize,
    pub imported: usize,
    pub skipped_invalid: usize,
    pub conversations: HashSet<String>,
}

/// Read and parse an export file.
pub fn read_records(path: &Path) -> Result<Vec<ImportRecord>, Error> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Save `records` through the engine.
///
/// Records with empty role or content are skipped and counted. Consecutive
/// records of the same conversation are saved as one batch, so each batch
/// commits atomically. With `dry_run` nothing is written.
pub fn import_records(
    engine: &MemoryEngine,
    records: Vec<ImportRecord>,
    default_conversation: &str,
    want_embedding: bool,
    dry_run: bool,
) -> Result<ImportStats, Error> {
    let mut stats = ImportStats {
        total_messages: records.len(),
        ..ImportStats::default()
    };

    let mut batches: Vec<(String, Vec<NewMessage>)> = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        if record.message.role.trim().is_empty() || record.message.content.trim().is_empty() {
            warn!(index, "skipping record with empty role or content");
            stats.skipped_invalid += 1;
            continue;
        }

        let conversation = sanitize_conversation_id(
            record.conversation_id.as_deref().unwrap_or(default_conversation),
        );
        stats.conversations.insert(conversation.clone());

        match batches.last_mut() {
            Some((current, messages)) if *current == conversation => messages.push(record.message),
            _ => batches.push((conversation, vec![record.message])),
        }
    }

    for (conversation, messages) in &batches {
        if dry_run {
            stats.imported += messages.len();
            continue;
        }
        let ids = engine.save_batch(conversation, messages, want_embedding)?;
        stats.imported += ids.len();
    }

    info!(
        imported = stats.imported,
        skipped = stats.skipped_invalid,
        batches = batches.len(),
        dry_run,
        "import complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_parsing() {
        let raw = r#"[
            {"role": "user", "content": "hi", "conversation_id": "c1"},
            {"role": "assistant", "content": "hello", "metadata": {"k": 1}}
        ]"#;
        let records: Vec<ImportRecord> = serde_json::from_str(raw).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].conversation_id.as_deref(), Some("c1"));
        assert_eq!(records[1].conversation_id, None);
        assert_eq!(records[1].message.metadata, Some(serde_json::json!({"k": 1})));
    }

    #[test]
    fn test_record_missing_content_rejected() {
        let raw = r#"[{"role": "user"}]"#;
        assert!(serde_json::from_str::<Vec<ImportRecord>>(raw).is_err());
    }

    #[test]
    fn test_read_records_missing_file() {
        let result = read_records(Path::new("/nonexistent/export.json"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_import_groups_by_conversation_and_skips_invalid() {
        use mnemo::{Config, LazyOnnxEmbedder, DEFAULT_MODEL};
        use std::sync::Arc;

        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            database_path: dir.path().join("memories.db"),
            ..Config::default()
        };
        let embedder = Arc::new(LazyOnnxEmbedder::new(DEFAULT_MODEL, None));
        let engine = MemoryEngine::new(config, embedder).unwrap();

        let raw = r#"[
            {"role": "user", "content": "first", "conversation_id": "c1"},
            {"role": "assistant", "content": "second", "conversation_id": "c1"},
            {"role": "user", "content": "  "},
            {"role": "user", "content": "elsewhere"}
        ]"#;
        let records: Vec<ImportRecord> = serde_json::from_str(raw).unwrap();

        let stats = import_records(&engine, records, "imported", false, false).unwrap();
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.imported, 3);
        assert_eq!(stats.skipped_invalid, 1);
        assert_eq!(stats.conversations.len(), 2);

        assert_eq!(engine.history("c1", 10).unwrap().len(), 2);
        assert_eq!(engine.history("imported", 10).unwrap()[0].content, "elsewhere");
    }

    #[test]
    fn test_import_dry_run_writes_nothing() {
        use mnemo::{Config, LazyOnnxEmbedder, DEFAULT_MODEL};
        use std::sync::Arc;

        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            database_path: dir.path().join("memories.db"),
            ..Config::default()
        };
        let engine =
            MemoryEngine::new(config, Arc::new(LazyOnnxEmbedder::new(DEFAULT_MODEL, None))).unwrap();

        let records: Vec<ImportRecord> =
            serde_json::from_str(r#"[{"role": "user", "content": "hi"}]"#).unwrap();
        let stats = import_records(&engine, records, "c1", true, true).unwrap();

        assert_eq!(stats.imported, 1);
        assert_eq!(engine.stats().unwrap().total_messages, 0);
    }
}
