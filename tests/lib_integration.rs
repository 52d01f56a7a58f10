//! Integration tests exercising the mnemo library API from an external crate.

use std::path::PathBuf;
use std::sync::Arc;

use mnemo::errors::Error;
use mnemo::{Config, Embedder, MemoryEngine, NewMessage};
use serde_json::json;
use tempfile::TempDir;

/// Bag-of-words embedder over a tiny fixed vocabulary.
///
/// Each vocabulary word that appears in the text sets one component, so
/// texts sharing words score higher.
struct VocabularyEmbedder;

const VOCABULARY: [&str; 6] = ["python", "javascript", "web", "learning", "coffee", "tea"];

impl Embedder for VocabularyEmbedder {
    fn model(&self) -> &str {
        "vocabulary-test"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let lower = text.to_lowercase();
        Ok(VOCABULARY
            .iter()
            .map(|word| if lower.contains(word) { 1.0 } else { 0.0 })
            .collect())
    }
}

fn open_engine() -> (TempDir, MemoryEngine) {
    let dir = TempDir::new().expect("create temp dir");
    let config = Config {
        database_path: dir.path().join("memories.db"),
        embedding_model: "vocabulary-test".to_string(),
        ..Config::default()
    };
    let engine = MemoryEngine::new(config, Arc::new(VocabularyEmbedder)).expect("open engine");
    (dir, engine)
}

/// Save then retrieve returns the closest message first.
#[test]
fn test_save_then_retrieve_returns_closest_message() {
    let (_dir, engine) = open_engine();

    let python = engine
        .save("user", "I love Python programming", "chat", None, true)
        .unwrap();
    engine
        .save("user", "JavaScript is great for web development", "chat", None, true)
        .unwrap();
    engine
        .save("assistant", "Coffee or tea?", "chat", None, true)
        .unwrap();

    let results = engine.retrieve("python tips", 3, None, 0.0).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, python);
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
    assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

/// A threshold drops weaker matches entirely.
#[test]
fn test_retrieve_threshold_excludes_weak_matches() {
    let (_dir, engine) = open_engine();
    engine
        .save("user", "python and web", "chat", None, true)
        .unwrap();
    engine.save("user", "just tea", "chat", None, true).unwrap();

    let results = engine.retrieve("python", 5, None, 0.5).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "python and web");
    assert!(results[0].similarity >= 0.5);
}

/// Messages saved in one engine are visible to the next one on the same file.
#[test]
fn test_memories_persist_across_engines() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        database_path: dir.path().join("memories.db"),
        embedding_model: "vocabulary-test".to_string(),
        ..Config::default()
    };

    let first = MemoryEngine::new(config.clone(), Arc::new(VocabularyEmbedder)).unwrap();
    first
        .save("user", "remember the coffee order", "chat", Some(&json!({"k": "v"})), true)
        .unwrap();
    first.close().unwrap();

    let second = MemoryEngine::new(config, Arc::new(VocabularyEmbedder)).unwrap();
    let history = second.history("chat", 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].metadata, Some(json!({"k": "v"})));
    assert_eq!(second.retrieve("coffee", 1, None, 0.0).unwrap().len(), 1);
}

/// Empty role and content are both reported.
#[test]
fn test_save_with_empty_fields_returns_validation_error() {
    let (_dir, engine) = open_engine();
    match engine.save(" ", "", "chat", None, true) {
        Err(Error::Validation { fields }) => assert_eq!(fields, vec!["role", "content"]),
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// Empty query is rejected before anything is embedded.
#[test]
fn test_retrieve_with_empty_query_returns_error() {
    let (_dir, engine) = open_engine();
    assert!(matches!(
        engine.retrieve("   ", 5, None, 0.0),
        Err(Error::Validation { .. })
    ));
}

/// Forgetting one conversation leaves the others intact.
#[test]
fn test_forget_only_touches_one_conversation() {
    let (_dir, engine) = open_engine();
    engine
        .save_batch(
            "a",
            &[NewMessage::new("user", "python"), NewMessage::new("assistant", "web")],
            true,
        )
        .unwrap();
    engine.save("user", "tea", "b", None, true).unwrap();

    assert_eq!(engine.forget("a").unwrap(), 2);

    let stats = engine.stats().unwrap();
    assert_eq!(stats.total_messages, 1);
    assert_eq!(stats.total_conversations, 1);
    assert_eq!(stats.total_embeddings, 1);
    assert!(engine.retrieve("python", 5, None, 0.5).unwrap().is_empty());
}

/// Keyword search needs no embeddings.
#[test]
fn test_keyword_search_without_embeddings() {
    let (_dir, engine) = open_engine();
    engine
        .save("user", "Meeting moved to Friday", "default", None, false)
        .unwrap();
    engine
        .save("user", "Lunch on friday?", "default", None, false)
        .unwrap();
    engine.save("user", "Monday standup", "default", None, false).unwrap();

    let results = engine.keyword_search("FRIDAY", None, 10).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(engine.stats().unwrap().total_embeddings, 0);
}

/// The engine can be shared by reference across threads.
#[test]
fn test_engine_shared_between_threads() {
    let (_dir, engine) = open_engine();

    std::thread::scope(|scope| {
        for t in 0..3 {
            let engine = &engine;
            scope.spawn(move || {
                for i in 0..5 {
                    engine
                        .save("user", &format!("python note {i}"), &format!("t{t}"), None, true)
                        .unwrap();
                    engine.retrieve("python", 3, None, 0.0).unwrap();
                }
            });
        }
    });

    assert_eq!(engine.stats().unwrap().total_messages, 15);
}

/// Operations fail once the engine is closed.
#[test]
fn test_closed_engine_rejects_operations() {
    let (_dir, engine) = open_engine();
    engine.close().unwrap();

    assert!(engine.is_closed());
    assert!(matches!(engine.stats(), Err(Error::Closed)));
    assert!(engine.close().is_ok());
}

/// Path traversal in the database path is rejected.
#[test]
fn test_engine_new_with_path_traversal_returns_error() {
    let config = Config {
        database_path: PathBuf::from("../../../etc/memories.db"),
        ..Config::default()
    };
    let result = MemoryEngine::new(config, Arc::new(VocabularyEmbedder));
    assert!(result.is_err());
}

/// Symlinked parent directories resolve and are accepted.
#[cfg(unix)]
#[test]
fn test_engine_new_through_symlinked_directory() {
    let dir = TempDir::new().unwrap();
    let real = dir.path().join("real");
    std::fs::create_dir(&real).unwrap();
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let config = Config {
        database_path: link.join("memories.db"),
        embedding_model: "vocabulary-test".to_string(),
        ..Config::default()
    };
    let engine = MemoryEngine::new(config, Arc::new(VocabularyEmbedder)).unwrap();
    engine.save("user", "tea", "chat", None, true).unwrap();
    assert!(real.join("memories.db").exists());
}

/// Default configuration is valid without any environment overrides.
#[test]
fn test_config_default_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.embedding_model, mnemo::DEFAULT_MODEL);
}

/// Retrieval against the bundled ONNX model (downloads on first run).
#[ignore]
#[test]
fn test_onnx_engine_semantic_retrieval() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        database_path: dir.path().join("memories.db"),
        model_cache: dir.path().join("models"),
        ..Config::default()
    };
    let engine = MemoryEngine::open(config).expect("open engine with ONNX model");

    engine
        .save("user", "Alice works at Microsoft", "chat", None, true)
        .unwrap();
    engine
        .save("user", "The weather is sunny today", "chat", None, true)
        .unwrap();

    let results = engine
        .retrieve("where does alice work", 1, None, 0.0)
        .unwrap();
    assert_eq!(results[0].content, "Alice works at Microsoft");
}
