//! Background campaign dispatch
//!
//! Triggers hand a campaign to the [`Dispatcher`] and return at once.
//! In [`DispatchMode::Serialized`] a single worker drains a queue, so
//! campaigns never overlap. [`DispatchMode::Detached`] spawns every
//! campaign on its own task: two campaigns then race on the progress and
//! result documents, and a reader may see one campaign's `mode` next to
//! the other's `current` address.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{CampaignJob, CampaignResult, CampaignRunner};
use crate::config::CampaignSettings;

/// How submitted campaigns are executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// One campaign at a time, in submission order
    #[default]
    Serialized,

    /// Every campaign on its own task, unguarded
    Detached,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Dispatch worker has shut down")]
    Closed,
}

struct Submission {
    runner: CampaignRunner,
    job: CampaignJob,
    settings: CampaignSettings,
    done: oneshot::Sender<CampaignResult>,
}

impl Submission {
    async fn execute(self) {
        let result = self.runner.run_job(&self.job, &self.settings).await;
        // nobody waiting is fine
        let _ = self.done.send(result);
    }
}

/// Completion handle for a submitted campaign
///
/// Dropping it does not cancel the campaign.
#[derive(Debug)]
pub struct CampaignHandle {
    done: oneshot::Receiver<CampaignResult>,
}

impl CampaignHandle {
    /// Wait for the campaign to finish, `None` if its task died
    pub async fn wait(self) -> Option<CampaignResult> {
        self.done.await.ok()
    }
}

/// Fire-and-forget campaign launcher
#[derive(Clone)]
pub struct Dispatcher {
    mode: DispatchMode,
    queue: Option<mpsc::UnboundedSender<Submission>>,
}

impl Dispatcher {
    /// Create a dispatcher. Must be called inside a tokio runtime.
    pub fn new(mode: DispatchMode) -> Self {
        let queue = match mode {
            DispatchMode::Serialized => {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(worker(rx));
                Some(tx)
            }
            DispatchMode::Detached => None,
        };
        Self { mode, queue }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Start `job` in the background without waiting for it
    pub fn submit(
        &self,
        runner: CampaignRunner,
        job: CampaignJob,
        settings: CampaignSettings,
    ) -> Result<CampaignHandle, DispatchError> {
        let (done, handle) = oneshot::channel();
        let submission = Submission {
            runner,
            job,
            settings,
            done,
        };

        info!(
            mode = %submission.job.mode,
            recipients = submission.job.len(),
            dispatch = ?self.mode,
            "Campaign submitted"
        );

        match &self.queue {
            Some(queue) => queue.send(submission).map_err(|_| {
                warn!("Campaign rejected: dispatch worker is gone");
                DispatchError::Closed
            })?,
            None => {
                tokio::spawn(submission.execute());
            }
        }

        Ok(CampaignHandle { done: handle })
    }
}

async fn worker(mut queue: mpsc::UnboundedReceiver<Submission>) {
    debug!("Dispatch worker started");
    while let Some(submission) = queue.recv().await {
        // a panicking campaign must not take the queue down with it
        if let Err(e) = tokio::spawn(submission.execute()).await {
            error!(error = %e, "Campaign task failed");
        }
    }
    debug!("Dispatch worker stopped");
}
