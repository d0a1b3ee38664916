//! Unified error handling for the relaymail crate
//!
//! Domain modules keep their own error enums. [`Error`] wraps them so
//! triggers can classify any failure with [`ErrorCategory`]:
//!
//! - `Config` and `Validation` are returned to the caller before a
//!   campaign starts
//! - `TransientDelivery` and `PermanentDelivery` only ever reach the
//!   per-recipient tally
//! - `Persistence` failures are logged and absorbed inside campaigns
//!
//! # Usage
//!
//! ```rust,ignore
//! use relaymail::error::{Error, ErrorCategory, RelayErrorTrait};
//!
//! fn report(err: &Error) {
//!     if err.category().is_caller_error() {
//!         eprintln!("Rejected: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::campaign::{DispatchError, ValidationError};
pub use crate::config::ConfigError;
pub use crate::relay::{DeliveryError, TransportError};
pub use crate::storage::PersistenceError;

/// Common trait for relaymail error types
pub trait RelayErrorTrait: std::error::Error {
    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or invalid settings
    Config,
    /// Rejected input: no recipients, empty subject or body
    Validation,
    /// Rate limiting, 5xx or network failures
    TransientDelivery,
    /// Rejected by the relay
    PermanentDelivery,
    /// Document store failures
    Persistence,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether the trigger should report this synchronously as bad input
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::Config | Self::Validation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Validation => "validation",
            Self::TransientDelivery => "transient_delivery",
            Self::PermanentDelivery => "permanent_delivery",
            Self::Persistence => "persistence",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the relaymail crate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Campaign input rejected
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Relay delivery errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Transport construction or request errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Document store errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Background dispatch errors
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RelayErrorTrait for Error {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Delivery(e) if e.is_transient() => ErrorCategory::TransientDelivery,
            Self::Delivery(_) => ErrorCategory::PermanentDelivery,
            Self::Transport(TransportError::Build(_)) => ErrorCategory::Config,
            Self::Transport(_) | Self::Http(_) => ErrorCategory::TransientDelivery,
            Self::Persistence(_) | Self::Io(_) => ErrorCategory::Persistence,
            Self::Json(_) | Self::Dispatch(_) => ErrorCategory::Other,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
