//! Delivery attempt policy
//!
//! Interprets application-level relay signals that the transport cannot
//! see: 429 back-pressure, 5xx responses that survived transport retry,
//! and the `status` flag of the JSON reply. The policy is a pure
//! transition function over [`DeliveryState`] so it can be tested without
//! any HTTP traffic.

use std::time::Duration;

use super::error::{DeliveryError, TransportError};
use super::message::{RelayResponse, SendMessageReply};
use super::transport::parse_retry_after;

/// Attempts made per recipient before giving up
pub const MAX_ATTEMPTS: u32 = 4;

/// Result of one HTTP request/response cycle
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// The relay answered
    Response(RelayResponse),

    /// No response was received
    TransportFailed(TransportError),
}

/// States of a single-recipient delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    /// About to issue an attempt
    Sending,

    /// Relay asked us to slow down
    WaitingRateLimit(Duration),

    /// Backing off after a server or transport failure
    WaitingRetry(Duration),

    /// Relay accepted the message
    Succeeded,

    /// Delivery will not be retried
    PermanentlyFailed(DeliveryError),
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::PermanentlyFailed(_))
    }

    /// Wait required before the next attempt, if this is a waiting state
    pub fn wait(&self) -> Option<Duration> {
        match self {
            Self::WaitingRateLimit(d) | Self::WaitingRetry(d) => Some(*d),
            _ => None,
        }
    }
}

/// Status-code aware retry policy
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    /// Maximum attempts per recipient
    pub max_attempts: u32,

    /// Per-attempt fallback wait on 429 without a usable `Retry-After`
    pub rate_limit_step: Duration,

    /// Lower bound of any 429 wait
    pub rate_limit_floor: Duration,

    /// Upper bound of any 429 wait
    pub rate_limit_ceiling: Duration,

    /// Upper bound of the `2^attempt` seconds 5xx backoff
    pub server_backoff_cap: Duration,

    /// Per-attempt wait after a transport failure
    pub transport_backoff_step: Duration,

    /// Upper bound of the transport failure wait
    pub transport_backoff_cap: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            rate_limit_step: Duration::from_secs(30),
            rate_limit_floor: Duration::from_secs(10),
            rate_limit_ceiling: Duration::from_secs(180),
            server_backoff_cap: Duration::from_secs(60),
            transport_backoff_step: Duration::from_secs(3),
            transport_backoff_cap: Duration::from_secs(45),
        }
    }
}

impl DeliveryPolicy {
    /// Decide the next state after `attempt` (1-based) produced `outcome`
    ///
    /// Retryable outcomes on the final attempt fail permanently without a
    /// trailing wait.
    pub fn next(&self, attempt: u32, outcome: &AttemptOutcome) -> DeliveryState {
        let can_retry = attempt < self.max_attempts;

        match outcome {
            AttemptOutcome::Response(response) => match response.status {
                429 if can_retry => {
                    DeliveryState::WaitingRateLimit(self.rate_limit_wait(attempt, response))
                }
                429 => self.exhausted(attempt, DeliveryError::RateLimited),
                status if status >= 500 && can_retry => {
                    DeliveryState::WaitingRetry(self.server_backoff(attempt))
                }
                status if status >= 500 => {
                    self.exhausted(attempt, DeliveryError::ServerError(status))
                }
                200 => Self::evaluate_reply(&response.body),
                status => DeliveryState::PermanentlyFailed(DeliveryError::UnexpectedStatus {
                    status,
                    body: response.body.clone(),
                }),
            },
            AttemptOutcome::TransportFailed(_) if can_retry => {
                DeliveryState::WaitingRetry(self.transport_backoff(attempt))
            }
            AttemptOutcome::TransportFailed(error) => {
                self.exhausted(attempt, DeliveryError::Transport(error.clone()))
            }
        }
    }

    /// Wait after a 429: `Retry-After` when usable, else `30s * attempt`,
    /// clamped to the floor/ceiling window
    pub fn rate_limit_wait(&self, attempt: u32, response: &RelayResponse) -> Duration {
        let requested = response
            .retry_after
            .as_deref()
            .and_then(parse_retry_after)
            .unwrap_or(self.rate_limit_step * attempt);
        requested.clamp(self.rate_limit_floor, self.rate_limit_ceiling)
    }

    /// Wait after a 5xx: `min(cap, 2^attempt)` seconds
    pub fn server_backoff(&self, attempt: u32) -> Duration {
        let secs = 2_u64.saturating_pow(attempt);
        Duration::from_secs(secs).min(self.server_backoff_cap)
    }

    /// Wait after a transport failure: `min(cap, step * attempt)`
    pub fn transport_backoff(&self, attempt: u32) -> Duration {
        (self.transport_backoff_step * attempt).min(self.transport_backoff_cap)
    }

    fn evaluate_reply(body: &str) -> DeliveryState {
        match serde_json::from_str::<SendMessageReply>(body) {
            Ok(reply) if reply.is_success() => DeliveryState::Succeeded,
            Ok(reply) => DeliveryState::PermanentlyFailed(DeliveryError::Rejected(reply.message())),
            Err(e) => DeliveryState::PermanentlyFailed(DeliveryError::Rejected(format!(
                "unreadable reply: {e}"
            ))),
        }
    }

    fn exhausted(&self, attempt: u32, last: DeliveryError) -> DeliveryState {
        DeliveryState::PermanentlyFailed(DeliveryError::AttemptsExhausted {
            attempts: attempt,
            last: last.to_string(),
        })
    }
}
