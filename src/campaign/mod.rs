//! Campaign orchestration
//!
//! A campaign is one pass over a fixed recipient sequence:
//! - [`pacing`] turns the messages-per-minute budget into a sleep
//! - [`runner`] renders, sends, reports progress and stores the result
//! - [`dispatch`] runs campaigns in the background

pub mod dispatch;
pub mod pacing;
pub mod runner;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::MessagePair;

pub use dispatch::{CampaignHandle, DispatchError, DispatchMode, Dispatcher};
pub use pacing::{delay_seconds, send_delay};
pub use runner::CampaignRunner;

/// How the recipient set of a campaign was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignMode {
    /// Addresses supplied with the trigger
    List,
    /// Every address in the recipient store
    All,
    /// Per-recipient bodies from tabular input
    Excel,
}

impl std::fmt::Display for CampaignMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::All => write!(f, "all"),
            Self::Excel => write!(f, "excel"),
        }
    }
}

/// Final record of one campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignResult {
    pub mode: CampaignMode,

    /// Recipients delivered
    pub success: usize,

    /// Recipients attempted
    pub total: usize,

    pub finished_at: DateTime<Utc>,
}

impl CampaignResult {
    pub fn new(mode: CampaignMode, success: usize, total: usize) -> Self {
        Self {
            mode,
            success,
            total,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(&self) -> usize {
        self.total.saturating_sub(self.success)
    }
}

/// Inputs rejected before any network activity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No recipients")]
    NoRecipients,

    #[error("Subject is empty")]
    EmptySubject,

    #[error("Message body is empty")]
    EmptyBody,
}

/// Messages of a campaign
#[derive(Debug, Clone)]
pub enum JobContent {
    /// One template rendered per recipient
    Template {
        recipients: Vec<String>,
        template: String,
    },

    /// Bodies supplied per recipient, sent verbatim
    Pairs(Vec<MessagePair>),
}

/// A campaign ready to be dispatched
///
/// Recipients are sent exactly as given: duplicates are not removed here.
#[derive(Debug, Clone)]
pub struct CampaignJob {
    pub mode: CampaignMode,
    pub subject: String,
    pub content: JobContent,
}

impl CampaignJob {
    /// Templated campaign over `recipients`
    pub fn templated(
        mode: CampaignMode,
        subject: impl Into<String>,
        recipients: Vec<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            subject: subject.into(),
            content: JobContent::Template {
                recipients,
                template: template.into(),
            },
        }
    }

    /// Per-recipient body campaign
    pub fn pairs(subject: impl Into<String>, pairs: Vec<MessagePair>) -> Self {
        Self {
            mode: CampaignMode::Excel,
            subject: subject.into(),
            content: JobContent::Pairs(pairs),
        }
    }

    /// Number of messages the job will attempt
    pub fn len(&self) -> usize {
        match &self.content {
            JobContent::Template { recipients, .. } => recipients.len(),
            JobContent::Pairs(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject empty recipient sets, subjects and bodies
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::NoRecipients);
        }
        if self.subject.trim().is_empty() {
            return Err(ValidationError::EmptySubject);
        }
        if let JobContent::Template { template, .. } = &self.content {
            if template.trim().is_empty() {
                return Err(ValidationError::EmptyBody);
            }
        }
        Ok(())
    }
}
