//! In-memory transport that replays scripted relay responses
//!
//! Used to exercise the delivery policy and campaign runner without a
//! network. Every request is recorded for later inspection.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::TransportError;
use super::message::{RelayResponse, SendMessageRequest};
use super::transport::Transport;

/// Relay reply used by [`ScriptedTransport::always_success`]
pub const SUCCESS_REPLY: &str = r#"{"status":"success","data":{"message_id":"scripted"}}"#;

type Scripted = Result<RelayResponse, TransportError>;

/// A request observed by [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub api_key: String,
    pub message: SendMessageRequest,
}

/// Transport replaying a fixed sequence of outcomes
///
/// Once the script is drained the fallback outcome is returned forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    /// Replay `script`, then answer with a generic 500
    pub fn new(script: Vec<Scripted>) -> Self {
        Self::with_fallback(script, Ok(RelayResponse::new(500, "script exhausted")))
    }

    pub fn with_fallback(script: Vec<Scripted>, fallback: Scripted) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `outcome`
    pub fn repeating(outcome: Scripted) -> Self {
        Self::with_fallback(Vec::new(), outcome)
    }

    /// Accept every message
    pub fn always_success() -> Self {
        Self::repeating(Ok(RelayResponse::new(200, SUCCESS_REPLY)))
    }

    /// Requests observed so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Recipients addressed so far, in order
    pub fn recipients(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .flat_map(|r| r.message.to)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_message(
        &self,
        url: &str,
        api_key: &str,
        message: &SendMessageRequest,
    ) -> Result<RelayResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                url: url.to_string(),
                api_key: api_key.to_string(),
                message: message.clone(),
            });

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
