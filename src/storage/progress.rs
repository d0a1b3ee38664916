//! Best-effort progress reporting
//!
//! A single JSON snapshot describes the most recent campaign. It is
//! created when a campaign starts, updated after every attempt and left
//! in the `completed` state at the end. Persistence failures are logged
//! and swallowed so reporting can never abort a campaign.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PersistenceError, SharedStore, PROGRESS_DOC};
use crate::campaign::CampaignMode;

/// Lifecycle of the progress snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// No campaign has ever reported
    #[default]
    Idle,
    Running,
    Completed,
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Persisted view of the in-flight (or last) campaign
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<CampaignMode>,

    pub status: ProgressStatus,

    /// Recipients attempted so far
    #[serde(default)]
    pub sent: usize,

    /// Recipients delivered so far
    #[serde(default)]
    pub success: usize,

    /// Recipients in the campaign
    #[serde(default)]
    pub total: usize,

    /// Last attempted address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressSnapshot {
    /// Snapshot reported when nothing has been written yet
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.status == ProgressStatus::Idle
    }

    /// Completion percentage, 100 for an empty campaign
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.sent as f64 / self.total as f64) * 100.0
    }
}

/// Fields to merge into the snapshot; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub mode: Option<CampaignMode>,
    pub status: Option<ProgressStatus>,
    pub sent: Option<usize>,
    pub success: Option<usize>,
    pub total: Option<usize>,
    pub current: Option<String>,
}

impl ProgressUpdate {
    /// Update recorded after one attempt
    pub fn attempt(sent: usize, success: usize, current: &str) -> Self {
        Self {
            sent: Some(sent),
            success: Some(success),
            current: Some(current.to_string()),
            ..Default::default()
        }
    }

    fn apply(self, snapshot: &mut ProgressSnapshot) {
        if let Some(mode) = self.mode {
            snapshot.mode = Some(mode);
        }
        if let Some(status) = self.status {
            snapshot.status = status;
        }
        if let Some(sent) = self.sent {
            snapshot.sent = sent;
        }
        if let Some(success) = self.success {
            snapshot.success = success;
        }
        if let Some(total) = self.total {
            snapshot.total = total;
        }
        if let Some(current) = self.current {
            snapshot.current = Some(current);
        }
    }
}

/// Reads and writes the progress snapshot
#[derive(Clone)]
pub struct ProgressTracker {
    store: SharedStore,
}

impl ProgressTracker {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Replace the snapshot with a fresh `running` one
    pub fn begin(&self, mode: CampaignMode, total: usize) {
        let snapshot = ProgressSnapshot {
            mode: Some(mode),
            status: ProgressStatus::Running,
            sent: 0,
            success: 0,
            total,
            current: None,
            updated_at: Some(Utc::now()),
        };
        self.persist(&snapshot);
    }

    /// Merge `update` into the persisted snapshot and stamp the time
    pub fn update(&self, update: ProgressUpdate) {
        let mut snapshot = match self.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => ProgressSnapshot::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable progress snapshot");
                ProgressSnapshot::default()
            }
        };

        update.apply(&mut snapshot);
        snapshot.updated_at = Some(Utc::now());
        self.persist(&snapshot);
    }

    /// Mark the campaign finished
    pub fn complete(&self, total: usize) {
        self.update(ProgressUpdate {
            status: Some(ProgressStatus::Completed),
            sent: Some(total),
            ..Default::default()
        });
    }

    /// Current snapshot, idle when none has been written
    pub fn read(&self) -> ProgressSnapshot {
        match self.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => ProgressSnapshot::idle(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read progress snapshot");
                ProgressSnapshot::idle()
            }
        }
    }

    fn load(&self) -> Result<Option<ProgressSnapshot>, PersistenceError> {
        let Some(doc) = self.store.read(PROGRESS_DOC)? else {
            return Ok(None);
        };
        serde_json::from_str(&doc)
            .map(Some)
            .map_err(|source| PersistenceError::Decode {
                name: PROGRESS_DOC.to_string(),
                source,
            })
    }

    fn persist(&self, snapshot: &ProgressSnapshot) {
        let result = serde_json::to_string(snapshot)
            .map_err(|source| PersistenceError::Encode {
                name: PROGRESS_DOC.to_string(),
                source,
            })
            .and_then(|doc| self.store.write(PROGRESS_DOC, &doc));

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist progress snapshot");
        }
    }
}
