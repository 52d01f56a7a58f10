//! Shared test utilities for config module tests.

use std::sync::Mutex;

/// Mutex to serialize environment variable tests and prevent race conditions.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Every environment variable the config layer reads.
pub const ENV_VARS: &[&str] = &[
    "MNEMO_DATABASE_PATH",
    "MNEMO_EMBEDDING_MODEL",
    "MNEMO_MODEL_CACHE",
    "MNEMO_EMBEDDING_TIMEOUT_SECS",
    "MNEMO_RETRIEVAL_THRESHOLD",
    "MNEMO_LOG_LEVEL",
];

/// Set an environment variable. Callers must hold `ENV_MUTEX`.
pub fn set_env_var(name: &str, value: &str) {
    // SAFETY: env mutation is serialized by ENV_MUTEX.
    #[allow(clippy::disallowed_methods)]
    unsafe {
        std::env::set_var(name, value);
    }
}

/// Clean up environment variables used by mnemo config. Callers must hold `ENV_MUTEX`.
pub fn cleanup_env_vars(vars: &[&str]) {
    for var in vars {
        // SAFETY: env mutation is serialized by ENV_MUTEX.
        #[allow(clippy::disallowed_methods)]
        unsafe {
            std::env::remove_var(var);
        }
    }
}
