//! Common test utilities

use std::time::Duration;

use relaymail::config::CampaignSettings;
use relaymail::relay::{DeliveryPolicy, HttpTransport, TransportConfig, TransportRetry};

/// Relay reply accepting a message
pub const ACCEPTED: &str = r#"{"status":"success","data":{"message_id":"m-1"}}"#;

/// Campaign settings pointing at a mock relay
pub fn settings_for(endpoint: &str) -> CampaignSettings {
    CampaignSettings {
        endpoint: endpoint.to_string(),
        api_key: "test-key".to_string(),
        from_name: "News Desk".to_string(),
        from_email: "news@example.com".to_string(),
        proxy: None,
        subject: "Weekly digest".to_string(),
        rate_per_minute: 0.0,
    }
}

/// Transport with millisecond backoff so retries stay fast
#[allow(dead_code)]
pub fn fast_transport(max_attempts: u32) -> HttpTransport {
    HttpTransport::new(TransportConfig {
        retry: TransportRetry::with_delays(max_attempts, 10),
        ..Default::default()
    })
    .unwrap()
}

/// Delivery policy with the default attempt budget and millisecond waits
#[allow(dead_code)]
pub fn fast_policy() -> DeliveryPolicy {
    DeliveryPolicy {
        rate_limit_step: Duration::from_millis(10),
        rate_limit_floor: Duration::from_millis(10),
        rate_limit_ceiling: Duration::from_millis(50),
        server_backoff_cap: Duration::from_millis(10),
        transport_backoff_step: Duration::from_millis(10),
        transport_backoff_cap: Duration::from_millis(50),
        ..Default::default()
    }
}

/// Owned address list
#[allow(dead_code)]
pub fn addresses(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
