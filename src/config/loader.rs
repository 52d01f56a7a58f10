//! Configuration file loading and parsing.

use crate::errors::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration loaded from TOML file.
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database_path: PathBuf,

    #[serde(default)]
    pub embedding_model: String,

    #[serde(default)]
    pub model_cache: PathBuf,

    #[serde(default = "default_embedding_timeout_secs")]
    pub embedding_timeout_secs: u64,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_keyword_scan_limit")]
    pub keyword_scan_limit: usize,

    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,

    #[serde(default)]
    pub retrieval_threshold: f64,

    #[serde(default)]
    pub log_level: String,
}

pub(super) fn default_embedding_timeout_secs() -> u64 {
    30
}

pub(super) fn default_busy_timeout_ms() -> u64 {
    5_000
}

pub(super) fn default_history_limit() -> usize {
    50
}

pub(super) fn default_keyword_scan_limit() -> usize {
    1_000
}

pub(super) fn default_retrieval_top_k() -> usize {
    5
}

pub(super) fn default_log_level() -> String {
    "warn".to_string()
}

/// Load configuration from the user's config directory, if a file exists there.
pub fn load_from_file() -> Result<Option<ConfigFile>, Error> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let config_dir = dirs::config_dir().unwrap_or_else(|| home.join(".config"));

    let config_path = config_dir.join("mnemo/config.toml");

    if config_path.exists() {
        load_from_path(&config_path).map(Some)
    } else {
        Ok(None)
    }
}

/// Load configuration from an explicit TOML file.
pub fn load_from_path(config_path: &Path) -> Result<ConfigFile, Error> {
    if !config_path.exists() {
        return Err(Error::FileNotFound(config_path.to_path_buf()));
    }

    let content = std::fs::read_to_string(config_path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {e}",
            config_path.display()
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file {}: {e}",
            config_path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_toml() {
        let content = r#"
This is not valid TOML
 [[unclosed bracket
 "#;

        let result: Result<ConfigFile, _> = toml::from_str(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_config_file_uses_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert!(config.database_path.as_os_str().is_empty());
        assert!(config.embedding_model.is_empty());
        assert_eq!(config.embedding_timeout_secs, 30);
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.keyword_scan_limit, 1_000);
        assert_eq!(config.retrieval_top_k, 5);
    }

    #[test]
    fn test_config_file_partial_toml() {
        let content = r#"
            database_path = "/test/db.db"
            embedding_timeout_secs = 0
        "#;

        let config: ConfigFile = toml::from_str(content).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/test/db.db"));
        assert_eq!(config.embedding_timeout_secs, 0);
        assert_eq!(config.retrieval_top_k, 5);
    }
}
