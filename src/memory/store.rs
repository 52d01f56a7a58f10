//! Core memory engine struct: lifecycle, shared helpers, and the embedding call.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, RwLock};
use std::thread;

use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::{Embedder, OnnxEmbedder};
use crate::errors::Error;
use crate::sqlite::{self, Database};

/// Memory engine combining message persistence, embedding generation and
/// similarity ranking.
///
/// Every method takes `&self`; one engine can be shared across threads
/// (for example behind an `Arc`) by several conversation sessions.
///
/// # Lifecycle
///
/// An engine is open from construction until [`MemoryEngine::close`]. After
/// that every operation returns [`Error::Closed`]. Closing twice is a no-op.
pub struct MemoryEngine {
    pub(crate) db: RwLock<Option<Database>>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) config: Config,
    database_path: PathBuf,
}

impl MemoryEngine {
    /// Open the store at `config.database_path` and use `embedder` for vectors.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The configuration is invalid
    /// - Database path contains path traversal sequences (e.g., "../")
    /// - Parent directory cannot be canonicalized
    /// - Database cannot be opened
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self, Error> {
        config.validate()?;
        check_database_path(&config.database_path)?;

        if embedder.model() != config.embedding_model {
            warn!(
                configured = %config.embedding_model,
                embedder = embedder.model(),
                "embedder model differs from configured model; stored vectors use the embedder's name"
            );
        }

        let db = Database::open(&config.database_path, config.busy_timeout())?;
        info!(
            path = %config.database_path.display(),
            model = embedder.model(),
            "memory engine ready"
        );

        Ok(MemoryEngine {
            db: RwLock::new(Some(db)),
            embedder,
            database_path: config.database_path.clone(),
            config,
        })
    }

    /// Open an engine backed by the local ONNX model named in `config`.
    ///
    /// Downloads the model on first use.
    pub fn open(config: Config) -> Result<Self, Error> {
        config.ensure_directories()?;
        let embedder = OnnxEmbedder::new(&config.embedding_model, Some(&config.model_cache))?;
        Self::new(config, Arc::new(embedder))
    }

    /// Release the store's connections. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Returns error if the database refuses to close; the engine is closed
    /// regardless.
    pub fn close(&self) -> Result<(), Error> {
        let taken = self
            .db
            .write()
            .map_err(|e| sqlite::Error::Lock(e.to_string()))?
            .take();

        if let Some(db) = taken {
            db.close()?;
            info!("memory engine closed");
        }
        Ok(())
    }

    /// Whether [`MemoryEngine::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.db.read().map(|db| db.is_none()).unwrap_or(true)
    }

    /// Configuration this engine was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Name of the embedding model vectors are produced and compared with.
    pub fn embedding_model(&self) -> &str {
        self.embedder.model()
    }

    /// Path of the backing database file.
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Run `f` against the open store.
    pub(crate) fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, sqlite::Error>,
    ) -> Result<T, Error> {
        let guard = self
            .db
            .read()
            .map_err(|e| sqlite::Error::Lock(e.to_string()))?;
        let db = guard.as_ref().ok_or(Error::Closed)?;
        Ok(f(db)?)
    }

    pub(crate) fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Run a job against the embedder, bounded by the configured timeout.
    ///
    /// [`Embedder::prepare`] runs first and is not timed. With a timeout the
    /// job runs on its own thread; if it does not finish in time the thread
    /// is abandoned and `Error::EmbeddingTimeout` returned. Callers decide
    /// what a failure means.
    pub(crate) fn call_embedder<T, F>(&self, job: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Embedder) -> Result<T, Error> + Send + 'static,
    {
        self.embedder.prepare()?;

        let Some(timeout) = self.config.embedding_timeout() else {
            return job(self.embedder.as_ref());
        };

        let embedder = Arc::clone(&self.embedder);
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("mnemo-embed".to_string())
            .spawn(move || {
                // The receiver is gone if we already timed out.
                let _ = tx.send(job(embedder.as_ref()));
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Error::EmbeddingTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Embedding(
                "embedding worker exited without a result".to_string(),
            )),
        }
    }
}

impl fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("database_path", &self.database_path)
            .field("embedding_model", &self.embedder.model())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Reject traversal components and parents that do not exist.
fn check_database_path(db_path: &Path) -> Result<(), Error> {
    use std::path::Component;

    for component in db_path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(Error::Config(
                "Invalid database path: contains '..' which may escape the intended directory"
                    .to_string(),
            ));
        }
    }

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::canonicalize(parent).map_err(|e| {
                Error::Config(format!(
                    "Invalid database path: parent directory not accessible: {}",
                    e
                ))
            })?;
        }
    }
    Ok(())
}
