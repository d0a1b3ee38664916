//! Relay delivery
//!
//! Two retry tiers cooperate here:
//! - [`transport`] retries connection failures and retryable status codes
//!   without looking at the response body
//! - [`policy`] interprets 429 back-pressure, surviving 5xx responses and
//!   the relay's JSON success flag, driven per recipient by [`mailer`]

pub mod error;
pub mod mailer;
pub mod message;
pub mod policy;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;

pub use error::{DeliveryError, TransportError};
pub use mailer::{DeliveryReport, Mailer};
pub use message::{RelayResponse, SendMessageRequest};
pub use policy::{AttemptOutcome, DeliveryPolicy, DeliveryState, MAX_ATTEMPTS};
pub use transport::{create_client, HttpTransport, Transport, TransportConfig, TransportRetry};
