//! Per-recipient send routine
//!
//! Drives the [`DeliveryPolicy`] state machine against a [`Transport`],
//! sleeping through the waiting states until a terminal state is reached.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::DeliveryError;
use super::message::{message_url, SendMessageRequest};
use super::policy::{AttemptOutcome, DeliveryPolicy, DeliveryState};
use super::transport::Transport;
use crate::config::CampaignSettings;

/// Outcome of delivering one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipient address
    pub recipient: String,

    /// HTTP attempts issued by the policy
    pub attempts: u32,

    /// Failure reason, `None` when delivered
    pub error: Option<DeliveryError>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// Sends single-recipient messages through a relay transport
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn Transport>,
    policy: DeliveryPolicy,
}

impl Mailer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_policy(transport, DeliveryPolicy::default())
    }

    pub fn with_policy(transport: Arc<dyn Transport>, policy: DeliveryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    /// Deliver `body` to `recipient`
    ///
    /// Never returns an error: every failure is folded into the report so
    /// a campaign can continue with the next recipient.
    pub async fn send(
        &self,
        settings: &CampaignSettings,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> DeliveryReport {
        let url = message_url(&settings.endpoint);
        let message = SendMessageRequest::new(settings, recipient, subject, body);

        let mut attempts = 0;
        let mut state = DeliveryState::Sending;

        while !state.is_terminal() {
            state = match state {
                DeliveryState::Sending => {
                    attempts += 1;
                    let outcome = match self
                        .transport
                        .post_message(&url, &settings.api_key, &message)
                        .await
                    {
                        Ok(response) => AttemptOutcome::Response(response),
                        Err(e) => AttemptOutcome::TransportFailed(e),
                    };
                    self.policy.next(attempts, &outcome)
                }
                DeliveryState::WaitingRateLimit(delay) => {
                    warn!(
                        recipient,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Relay rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    DeliveryState::Sending
                }
                DeliveryState::WaitingRetry(delay) => {
                    debug!(
                        recipient,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying delivery"
                    );
                    tokio::time::sleep(delay).await;
                    DeliveryState::Sending
                }
                terminal => terminal,
            };
        }

        match state {
            DeliveryState::PermanentlyFailed(error) => {
                warn!(recipient, attempts, error = %error, "Delivery failed");
                DeliveryReport {
                    recipient: recipient.to_string(),
                    attempts,
                    error: Some(error),
                }
            }
            _ => {
                info!(recipient, attempts, "Delivered");
                DeliveryReport {
                    recipient: recipient.to_string(),
                    attempts,
                    error: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testing::ScriptedTransport;
    use crate::relay::{RelayResponse, TransportError};
    use std::time::Duration;
    use tokio::time::Instant;

    fn settings() -> CampaignSettings {
        CampaignSettings {
            endpoint: "http://relay.test".into(),
            api_key: "key".into(),
            from_name: "Desk".into(),
            from_email: "desk@example.com".into(),
            proxy: None,
            subject: "Hi".into(),
            rate_per_minute: 0.0,
        }
    }

    const SUCCESS: &str = r#"{"status":"success","data":{"message_id":"abc"}}"#;

    #[tokio::test(start_paused = true)]
    async fn test_delivers_first_try() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(RelayResponse::new(200, SUCCESS))]));
        let mailer = Mailer::new(transport.clone());

        let report = mailer.send(&settings(), "a@x.com", "Hi", "<p>hi</p>").await;

        assert!(report.is_delivered());
        assert_eq!(report.attempts, 1);
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://relay.test/api/v1/send/message");
        assert_eq!(requests[0].api_key, "key");
        assert_eq!(requests[0].message.to, vec!["a@x.com".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_then_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(RelayResponse::new(429, "").with_retry_after("5")),
            Ok(RelayResponse::new(200, SUCCESS)),
        ]));
        let mailer = Mailer::new(transport.clone());

        let start = Instant::now();
        let report = mailer.send(&settings(), "a@x.com", "Hi", "body").await;
        let waited = start.elapsed();

        assert!(report.is_delivered());
        assert_eq!(report.attempts, 2);
        assert!(waited >= Duration::from_secs(5), "waited {waited:?}");
        assert!(waited <= Duration::from_secs(180), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_retry_after_is_clamped() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(RelayResponse::new(429, "").with_retry_after("99999999999999999999999")),
            Ok(RelayResponse::new(429, "").with_retry_after("1e300")),
            Ok(RelayResponse::new(200, SUCCESS)),
        ]));
        let mailer = Mailer::new(transport.clone());

        let start = Instant::now();
        let report = mailer.send(&settings(), "a@x.com", "Hi", "body").await;
        let waited = start.elapsed();

        assert!(report.is_delivered());
        assert_eq!(report.attempts, 3);
        assert!(waited >= Duration::from_secs(360), "waited {waited:?}");
        assert!(waited < Duration::from_secs(361), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(RelayResponse::new(200, r#"{"status":"error"}"#)),
            Ok(RelayResponse::new(200, SUCCESS)),
        ]));
        let mailer = Mailer::new(transport.clone());

        let report = mailer.send(&settings(), "a@x.com", "Hi", "body").await;

        assert!(!report.is_delivered());
        assert_eq!(report.attempts, 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_exhaust_attempts() {
        let transport = Arc::new(ScriptedTransport::repeating(Ok(RelayResponse::new(503, ""))));
        let mailer = Mailer::new(transport.clone());

        let start = Instant::now();
        let report = mailer.send(&settings(), "a@x.com", "Hi", "body").await;

        assert!(!report.is_delivered());
        assert_eq!(report.attempts, 4);
        assert!(matches!(
            report.error,
            Some(DeliveryError::AttemptsExhausted { attempts: 4, .. })
        ));
        // 2 + 4 + 8 seconds between the four attempts
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(14), "waited {waited:?}");
        assert!(waited < Duration::from_secs(15), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_then_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(TransportError::Connect("connection reset".into())),
            Err(TransportError::Timeout),
            Ok(RelayResponse::new(200, SUCCESS)),
        ]));
        let mailer = Mailer::new(transport.clone());

        let start = Instant::now();
        let report = mailer.send(&settings(), "a@x.com", "Hi", "body").await;

        assert!(report.is_delivered());
        assert_eq!(report.attempts, 3);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3 + 6), "waited {waited:?}");
        assert!(waited < Duration::from_secs(10), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_is_permanent() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(RelayResponse::new(
            403,
            "forbidden",
        ))]));
        let mailer = Mailer::new(transport);

        let report = mailer.send(&settings(), "a@x.com", "Hi", "body").await;

        assert_eq!(report.attempts, 1);
        assert_eq!(
            report.error,
            Some(DeliveryError::UnexpectedStatus {
                status: 403,
                body: "forbidden".into()
            })
        );
    }
}
