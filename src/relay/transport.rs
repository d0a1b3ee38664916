//! HTTP transport for the relay API
//!
//! The transport owns connection-level concerns:
//! - Proxy routing for all traffic
//! - Connect and read timeouts
//! - Retry of connection failures and 429/500/502/503/504 responses with
//!   exponential backoff, honouring `Retry-After`
//!
//! It never interprets the relay's JSON payload. The final response,
//! retryable or not, is handed back to the delivery policy as-is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::RETRY_AFTER, Client, Proxy};
use std::time::Duration;
use tracing::{debug, warn};

use super::error::TransportError;
use super::message::{RelayResponse, SendMessageRequest, API_KEY_HEADER};

/// Something that can deliver a send-message request to the relay
///
/// The production implementation is [`HttpTransport`]; tests script
/// responses through in-memory implementations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `message` to `url` authenticated with `api_key`
    async fn post_message(
        &self,
        url: &str,
        api_key: &str,
        message: &SendMessageRequest,
    ) -> Result<RelayResponse, TransportError>;
}

/// Backoff configuration for transport-level retries
#[derive(Debug, Clone)]
pub struct TransportRetry {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Upper bound applied to server-supplied `Retry-After` values
    pub max_retry_after: Duration,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            max_retry_after: Duration::from_secs(120),
        }
    }
}

impl TransportRetry {
    /// Disable transport-level retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Custom attempt count and base delay
    pub fn with_delays(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            ..Default::default()
        }
    }

    /// Backoff before the attempt following `attempt` (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponential =
            self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        Duration::from_millis((exponential as u64).min(self.max_delay_ms))
    }

    /// Status codes the transport retries on its own
    pub fn should_retry(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }
}

/// Transport construction options
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Outbound proxy URL applied to every scheme
    pub proxy: Option<String>,

    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,

    /// Timeout between reads of the response
    pub read_timeout: Duration,

    /// Connection-level retry policy
    pub retry: TransportRetry,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(20),
            retry: TransportRetry::default(),
        }
    }
}

impl TransportConfig {
    pub fn with_proxy(proxy: Option<String>) -> Self {
        Self {
            proxy,
            ..Default::default()
        }
    }
}

/// reqwest-backed relay transport
pub struct HttpTransport {
    client: Client,
    retry: TransportRetry,
}

impl HttpTransport {
    /// Build a transport from explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Build` if the proxy URL is invalid or the
    /// client cannot be created
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(concat!("relaymail/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy =
                Proxy::all(proxy.trim()).map_err(|e| TransportError::Build(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self {
            client,
            retry: config.retry,
        })
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Build the default relay transport, optionally routed through `proxy`
pub fn create_client(proxy: Option<&str>) -> Result<HttpTransport, TransportError> {
    HttpTransport::new(TransportConfig::with_proxy(proxy.map(str::to_string)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_message(
        &self,
        url: &str,
        api_key: &str,
        message: &SendMessageRequest,
    ) -> Result<RelayResponse, TransportError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let has_budget = attempt < self.retry.max_attempts;

            let result = self
                .client
                .post(url)
                .header(API_KEY_HEADER, api_key)
                .json(message)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);

                    if has_budget && TransportRetry::should_retry(status) {
                        let delay = retry_after
                            .as_deref()
                            .and_then(parse_retry_after)
                            .map(|d| d.min(self.retry.max_retry_after))
                            .unwrap_or_else(|| self.retry.calculate_delay(attempt));
                        debug!(
                            attempt,
                            status,
                            delay_ms = delay.as_millis() as u64,
                            "Transport retrying status"
                        );
                        self.pause(delay).await;
                        continue;
                    }

                    let body = response.text().await.map_err(TransportError::from)?;
                    return Ok(RelayResponse {
                        status,
                        retry_after,
                        body,
                    });
                }
                Err(e) => {
                    let error = TransportError::from(e);
                    if has_budget && error.is_connection_level() {
                        let delay = self.retry.calculate_delay(attempt);
                        warn!(
                            attempt,
                            error = %error,
                            delay_ms = delay.as_millis() as u64,
                            "Transport retrying connection failure"
                        );
                        self.pause(delay).await;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }
}

/// Parse a `Retry-After` value as delta-seconds or an HTTP-date
///
/// Returns `None` for anything unparseable. Dates in the past yield zero;
/// delays too large for a [`Duration`] saturate to [`Duration::MAX`] and are
/// left to the caller's cap.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_finite() && secs >= 0.0 {
            return Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX));
        }
        return None;
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc) - Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry() {
        for status in [429, 500, 502, 503, 504] {
            assert!(TransportRetry::should_retry(status));
        }
        for status in [200, 400, 401, 403, 404, 501] {
            assert!(!TransportRetry::should_retry(status));
        }
    }

    #[test]
    fn test_calculate_delay() {
        let retry = TransportRetry::default();

        assert_eq!(retry.calculate_delay(0), Duration::ZERO);
        assert_eq!(retry.calculate_delay(1), Duration::from_millis(500));
        assert_eq!(retry.calculate_delay(2), Duration::from_millis(1000));
        assert_eq!(retry.calculate_delay(3), Duration::from_millis(2000));
        assert_eq!(retry.calculate_delay(4), Duration::from_millis(4000));
    }

    #[test]
    fn test_max_delay_cap() {
        let retry = TransportRetry {
            max_delay_ms: 1500,
            ..Default::default()
        };
        assert_eq!(retry.calculate_delay(10), Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 120 "), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("1.5"), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_retry_after_invalid() {
        assert_eq!(parse_retry_after(""), None);
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-3"), None);
    }

    #[test]
    fn test_parse_retry_after_oversized_saturates() {
        assert_eq!(parse_retry_after("1e300"), Some(Duration::MAX));
        assert_eq!(
            parse_retry_after("99999999999999999999999"),
            Some(Duration::MAX)
        );
    }

    #[test]
    fn test_parse_retry_after_past_date() {
        let parsed = parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parsed, Some(Duration::ZERO));
    }

    #[test]
    fn test_transport_creation() {
        assert!(create_client(None).is_ok());
        assert!(create_client(Some("")).is_ok());
        assert!(create_client(Some("http://127.0.0.1:3128")).is_ok());
    }

    #[test]
    fn test_transport_rejects_bad_proxy() {
        let result = create_client(Some("::not a proxy::"));
        assert!(matches!(result, Err(TransportError::Build(_))));
    }
}
