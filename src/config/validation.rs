//! Configuration validation logic.

use crate::errors::Error;

use super::Config;

/// Validates configuration values.
pub struct ConfigValidator<'a> {
    pub config: &'a Config,
}

impl ConfigValidator<'_> {
    /// Validate all configuration values for correctness and constraints.
    ///
    /// Checks that:
    /// - Retrieval threshold is finite and between 0.0 and 1.0
    /// - Embedding model and database path are not empty
    /// - History, keyword scan, and top-k limits are positive
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any validation check fails.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_retrieval_threshold()?;
        self.validate_embedding_model()?;
        self.validate_database_path()?;
        self.validate_limits()?;

        Ok(())
    }

    fn validate_retrieval_threshold(&self) -> Result<(), Error> {
        let threshold = self.config.retrieval_threshold;
        if threshold.is_nan() || threshold.is_infinite() {
            return Err(Error::Config(
                "Invalid retrieval threshold: NaN and infinity are not allowed".into(),
            ));
        }

        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "Invalid retrieval threshold: {} (must be between 0.0 and 1.0)",
                threshold
            )));
        }

        Ok(())
    }

    fn validate_embedding_model(&self) -> Result<(), Error> {
        if self.config.embedding_model.trim().is_empty() {
            return Err(Error::Config("Embedding model cannot be empty".to_string()));
        }

        Ok(())
    }

    fn validate_database_path(&self) -> Result<(), Error> {
        if self.config.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        Ok(())
    }

    fn validate_limits(&self) -> Result<(), Error> {
        let limits = [
            ("history_limit", self.config.history_limit),
            ("keyword_scan_limit", self.config.keyword_scan_limit),
            ("retrieval_top_k", self.config.retrieval_top_k),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than 0")));
            }
        }

        Ok(())
    }
}
