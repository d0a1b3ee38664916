//! Whole-document persistence
//!
//! Every piece of state the engine keeps (recipient list, last template,
//! progress snapshot, last result) is a single document that is always
//! read and written in full. [`DocumentStore`] abstracts where those
//! documents live so the engine can run against files in production and
//! memory in tests.
//!
//! Writes are last-write-wins. There is no locking across documents or
//! across writers.

pub mod error;
pub mod progress;
pub mod recipients;
pub mod results;
pub mod templates;

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub use error::PersistenceError;
pub use progress::{ProgressSnapshot, ProgressStatus, ProgressTracker, ProgressUpdate};
pub use recipients::{MergeOutcome, RecipientStore};
pub use results::ResultStore;
pub use templates::TemplateStore;

/// Document holding the newline-delimited recipient list
pub const RECIPIENTS_DOC: &str = "recipients.txt";

/// Document holding the last saved HTML template
pub const TEMPLATE_DOC: &str = "template.html";

/// Document holding the progress snapshot
pub const PROGRESS_DOC: &str = "progress.json";

/// Document holding the last campaign result
pub const RESULT_DOC: &str = "last_send_result.json";

/// Read/write whole named documents
pub trait DocumentStore: Send + Sync {
    /// Read a document, `None` if it has never been written
    fn read(&self, name: &str) -> Result<Option<String>, PersistenceError>;

    /// Replace a document. Readers never observe a partial write.
    fn write(&self, name: &str, contents: &str) -> Result<(), PersistenceError>;

    /// Delete a document if present
    fn remove(&self, name: &str) -> Result<(), PersistenceError>;
}

/// Shared handle to a document store
pub type SharedStore = Arc<dyn DocumentStore>;

// ============================================================================
// File Store
// ============================================================================

/// Documents stored as files in one directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a data directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| PersistenceError::Io {
            name: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a named document
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl DocumentStore for FileStore {
    fn read(&self, name: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_of(name)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn write(&self, name: &str, contents: &str) -> Result<(), PersistenceError> {
        let path = self.path_of(name);
        let io_err = |source| PersistenceError::Io {
            name: name.to_string(),
            source,
        };

        // Unique temp name so concurrent writers never share a temp file
        let temp_path = self
            .root
            .join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));

        fs::write(&temp_path, contents).map_err(io_err)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(io_err(e));
        }

        tracing::trace!(path = %path.display(), bytes = contents.len(), "Document written");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path_of(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// Documents kept in process memory
#[derive(Debug, Default)]
pub struct MemoryStore(Mutex<HashMap<String, String>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn docs(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.docs().get(name).cloned())
    }

    fn write(&self, name: &str, contents: &str) -> Result<(), PersistenceError> {
        self.docs().insert(name.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), PersistenceError> {
        self.docs().remove(name);
        Ok(())
    }
}
