//! Configuration system for mnemo.
//!
//! A `Config` value is built once and handed to `MemoryEngine::new`; nothing
//! reads configuration from global state afterwards.

mod env_parser;
mod loader;
mod overrides;
mod paths;
mod validation;

#[cfg(test)]
mod tests_utils;

use crate::embedding::DEFAULT_MODEL;
use crate::errors::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use loader::ConfigFile;

/// Configuration values with priority: defaults < config file < env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database.
    pub database_path: PathBuf,

    /// Embedding model identifier, recorded with every stored vector.
    pub embedding_model: String,

    /// Directory for caching ONNX models.
    pub model_cache: PathBuf,

    /// Upper bound on a single embedding call, in seconds. 0 disables it.
    pub embedding_timeout_secs: u64,

    /// How long a connection waits on another connection's lock, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Default number of messages returned by history.
    pub history_limit: usize,

    /// Messages scanned by keyword search before filtering.
    pub keyword_scan_limit: usize,

    /// Default number of retrieval results.
    pub retrieval_top_k: usize,

    /// Default minimum similarity for retrieval results.
    pub retrieval_threshold: f64,

    /// Default log filter for the CLI when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        // Use home directory with sensible fallback for systems without HOME
        let home = dirs::home_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        let mnemo_dir = home.join(".mnemo");

        Self {
            database_path: mnemo_dir.join("memories.db"),
            embedding_model: DEFAULT_MODEL.to_string(),
            model_cache: mnemo_dir.join("models"),
            embedding_timeout_secs: loader::default_embedding_timeout_secs(),
            busy_timeout_ms: loader::default_busy_timeout_ms(),
            history_limit: loader::default_history_limit(),
            keyword_scan_limit: loader::default_keyword_scan_limit(),
            retrieval_top_k: loader::default_retrieval_top_k(),
            retrieval_threshold: 0.0,
            log_level: loader::default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with defaults, the user config file, and environment overrides.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(None)
    }

    /// Like [`Config::load`], reading `path` instead of the default config file location.
    pub fn load_from(path: Option<&Path>) -> Result<Self, Error> {
        let file_config = match path {
            Some(path) => Some(loader::load_from_path(path)?),
            None => loader::load_from_file()?,
        };

        let mut config = Config::default();

        if let Some(mut file) = file_config {
            paths::expand_tilde(&mut file.database_path);
            paths::expand_tilde(&mut file.model_cache);
            config.merge_from_file(file);
        }

        overrides::apply_env_overrides(&mut config)?;

        config.validate()?;

        Ok(config)
    }

    /// Timeout applied to each embedding call, if any.
    pub fn embedding_timeout(&self) -> Option<Duration> {
        (self.embedding_timeout_secs > 0).then(|| Duration::from_secs(self.embedding_timeout_secs))
    }

    /// SQLite busy timeout.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Merge configuration from a file into this config.
    fn merge_from_file(&mut self, file: ConfigFile) {
        if !file.database_path.as_os_str().is_empty() {
            self.database_path = file.database_path;
        }
        if !file.embedding_model.is_empty() {
            self.embedding_model = file.embedding_model;
        }
        if !file.model_cache.as_os_str().is_empty() {
            self.model_cache = file.model_cache;
        }
        if !file.log_level.is_empty() {
            self.log_level = file.log_level;
        }
        self.embedding_timeout_secs = file.embedding_timeout_secs;
        self.busy_timeout_ms = file.busy_timeout_ms;
        self.history_limit = file.history_limit;
        self.keyword_scan_limit = file.keyword_scan_limit;
        self.retrieval_top_k = file.retrieval_top_k;
        self.retrieval_threshold = file.retrieval_threshold;
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), Error> {
        validation::ConfigValidator { config: self }.validate()
    }

    /// Ensure parent directories for database and cache paths exist.
    pub fn ensure_directories(&self) -> Result<(), Error> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        if !self.model_cache.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.model_cache).map_err(|e| {
                Error::Config(format!(
                    "Failed to create model cache directory {}: {e}",
                    self.model_cache.display()
                ))
            })?;
        }

        Ok(())
    }
}
