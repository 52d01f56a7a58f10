//! Environment variable overrides for configuration.

use crate::errors::Error;

use super::env_parser;
use super::Config;

/// Apply every `MNEMO_*` environment override to `config`.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), Error> {
    env_parser::apply_database_path_override(&mut config.database_path)?;
    env_parser::apply_embedding_model_override(&mut config.embedding_model)?;
    env_parser::apply_model_cache_override(&mut config.model_cache)?;
    env_parser::apply_embedding_timeout_override(&mut config.embedding_timeout_secs)?;
    env_parser::apply_retrieval_threshold_override(&mut config.retrieval_threshold)?;
    env_parser::apply_log_level_override(&mut config.log_level)?;
    Ok(())
}
