//! Error types for relay delivery
//!
//! Transport errors describe a request that never produced a response.
//! Delivery errors describe why a single recipient was not delivered.

use thiserror::Error;

/// Errors raised by the transport before any HTTP response was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish a connection (DNS, refused, reset, proxy)
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Connect or read timeout elapsed
    #[error("Request timeout")]
    Timeout,

    /// The HTTP client could not be constructed
    #[error("Client build failed: {0}")]
    Build(String),

    /// Any other request or body error
    #[error("Request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether the failure happened at the connection level and may be
    /// retried by the transport itself
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() {
            Self::Build(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Reasons a single message was not delivered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Relay answered 429
    #[error("Rate limited by relay")]
    RateLimited,

    /// Relay answered with a 5xx status
    #[error("Relay server error: {0}")]
    ServerError(u16),

    /// Relay processed the message but rejected it
    #[error("Rejected by relay: {0}")]
    Rejected(String),

    /// Non-retryable HTTP status
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Transport failure surfaced to the delivery policy
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Retryable failures continued until the attempt budget ran out
    #[error("Gave up after {attempts} attempts: {last}")]
    AttemptsExhausted { attempts: u32, last: String },
}

impl DeliveryError {
    /// Transient errors are retried by the delivery policy; everything
    /// else is a permanent failure for the recipient
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError(_) | Self::Transport(_)
        )
    }
}
