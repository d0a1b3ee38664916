//! Wire types for the Postal send-message API

use serde::{Deserialize, Serialize};

use crate::config::CampaignSettings;

/// Path of the send endpoint relative to the relay base URL
pub const SEND_MESSAGE_PATH: &str = "/api/v1/send/message";

/// Header carrying the relay API key
pub const API_KEY_HEADER: &str = "X-Server-API-Key";

/// JSON body of a send-message request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub from: String,
    pub sender: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

impl SendMessageRequest {
    /// Build a single-recipient request from the campaign settings
    pub fn new(settings: &CampaignSettings, recipient: &str, subject: &str, html_body: &str) -> Self {
        Self {
            from: format!("{} <{}>", settings.from_name, settings.from_email),
            sender: settings.from_email.clone(),
            to: vec![recipient.to_string()],
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        }
    }
}

/// Raw relay response handed from the transport to the delivery policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    /// HTTP status code
    pub status: u16,

    /// Raw `Retry-After` header value, if present
    pub retry_after: Option<String>,

    /// Response body as text
    pub body: String,
}

impl RelayResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }
}

/// Application-level payload returned by the relay on HTTP 200
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageReply {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl SendMessageReply {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Rejection message reported by the relay, if any
    pub fn message(&self) -> String {
        self.data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("unknown error (status: {})", self.status))
    }
}

/// Join the relay base URL and the send-message path
pub fn message_url(endpoint: &str) -> String {
    format!("{}{SEND_MESSAGE_PATH}", endpoint.trim_end_matches('/'))
}
