//! Environment variable parsing utilities for configuration.

use crate::errors::Error;
use std::path::PathBuf;
use std::str::FromStr;

use super::paths;

/// Parse environment variable value or return error if empty/whitespace.
fn parse_env_string(name: &str, value: &str) -> Result<String, Error> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} cannot be empty")));
    }
    Ok(value.trim().to_string())
}

/// Parse environment variable as a path, expanding tilde.
fn parse_env_path(name: &str, value: &str) -> Result<PathBuf, Error> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} cannot be empty")));
    }
    Ok(paths::expand_tilde_path(&PathBuf::from(value)))
}

/// Parse environment variable as a number. Range checks happen in validation.
fn parse_env_number<T>(name: &str, value: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} cannot be empty")));
    }
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {name} value: {e}")))
}

fn read(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Apply MNEMO_DATABASE_PATH environment variable override.
pub fn apply_database_path_override(database_path: &mut PathBuf) -> Result<(), Error> {
    if let Some(val) = read("MNEMO_DATABASE_PATH") {
        *database_path = parse_env_path("MNEMO_DATABASE_PATH", &val)?;
    }
    Ok(())
}

/// Apply MNEMO_EMBEDDING_MODEL environment variable override.
pub fn apply_embedding_model_override(embedding_model: &mut String) -> Result<(), Error> {
    if let Some(val) = read("MNEMO_EMBEDDING_MODEL") {
        *embedding_model = parse_env_string("MNEMO_EMBEDDING_MODEL", &val)?;
    }
    Ok(())
}

/// Apply MNEMO_MODEL_CACHE environment variable override.
pub fn apply_model_cache_override(model_cache: &mut PathBuf) -> Result<(), Error> {
    if let Some(val) = read("MNEMO_MODEL_CACHE") {
        *model_cache = parse_env_path("MNEMO_MODEL_CACHE", &val)?;
    }
    Ok(())
}

/// Apply MNEMO_EMBEDDING_TIMEOUT_SECS environment variable override.
pub fn apply_embedding_timeout_override(timeout_secs: &mut u64) -> Result<(), Error> {
    if let Some(val) = read("MNEMO_EMBEDDING_TIMEOUT_SECS") {
        *timeout_secs = parse_env_number("MNEMO_EMBEDDING_TIMEOUT_SECS", &val)?;
    }
    Ok(())
}

/// Apply MNEMO_RETRIEVAL_THRESHOLD environment variable override.
pub fn apply_retrieval_threshold_override(threshold: &mut f64) -> Result<(), Error> {
    if let Some(val) = read("MNEMO_RETRIEVAL_THRESHOLD") {
        *threshold = parse_env_number("MNEMO_RETRIEVAL_THRESHOLD", &val)?;
    }
    Ok(())
}

/// Apply MNEMO_LOG_LEVEL environment variable override.
pub fn apply_log_level_override(log_level: &mut String) -> Result<(), Error> {
    if let Some(val) = read("MNEMO_LOG_LEVEL") {
        *log_level = parse_env_string("MNEMO_LOG_LEVEL", &val)?;
    }
    Ok(())
}
