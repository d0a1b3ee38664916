//! Persistence error type

use thiserror::Error;

/// Failures reading or writing stored documents
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Filesystem failure
    #[error("I/O error on '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Document could not be encoded
    #[error("Failed to encode '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Document exists but is not valid JSON for its type
    #[error("Failed to decode '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}
