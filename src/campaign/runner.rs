//! Campaign runner
//!
//! Sends one message per recipient, in the order given, through the
//! [`Mailer`]. A failed delivery never stops the loop. Progress is
//! persisted after every attempt and the final [`CampaignResult`]
//! replaces the previous one.

use std::borrow::Cow;

use tracing::{info, warn};

use super::pacing::send_delay;
use super::{CampaignJob, CampaignMode, CampaignResult, JobContent};
use crate::config::CampaignSettings;
use crate::input::MessagePair;
use crate::relay::Mailer;
use crate::storage::{ProgressTracker, ProgressUpdate, ResultStore, SharedStore};
use crate::template::render;

/// Executes campaigns and records their outcome
#[derive(Clone)]
pub struct CampaignRunner {
    mailer: Mailer,
    progress: ProgressTracker,
    results: ResultStore,
}

impl CampaignRunner {
    /// Runner persisting progress and results in `store`
    pub fn new(mailer: Mailer, store: SharedStore) -> Self {
        Self {
            mailer,
            progress: ProgressTracker::new(store.clone()),
            results: ResultStore::new(store),
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Send `body_template` rendered for each of `recipients`
    ///
    /// Duplicates in `recipients` are sent twice; de-duplication is the
    /// caller's job.
    pub async fn run(
        &self,
        mode: CampaignMode,
        recipients: &[String],
        subject: &str,
        body_template: &str,
        settings: &CampaignSettings,
    ) -> CampaignResult {
        let messages = recipients.iter().enumerate().map(|(i, address)| {
            (
                address.as_str(),
                Cow::Owned(render(body_template, address, i + 1)),
            )
        });
        self.execute(mode, subject, settings, recipients.len(), messages)
            .await
    }

    /// Send each pair's body verbatim to its address
    pub async fn run_pairs(
        &self,
        pairs: &[MessagePair],
        subject: &str,
        settings: &CampaignSettings,
    ) -> CampaignResult {
        let messages = pairs
            .iter()
            .map(|pair| (pair.email.trim(), Cow::Borrowed(pair.body.trim())));
        self.execute(CampaignMode::Excel, subject, settings, pairs.len(), messages)
            .await
    }

    /// Run a dispatched job
    pub async fn run_job(&self, job: &CampaignJob, settings: &CampaignSettings) -> CampaignResult {
        match &job.content {
            JobContent::Template {
                recipients,
                template,
            } => {
                self.run(job.mode, recipients, &job.subject, template, settings)
                    .await
            }
            JobContent::Pairs(pairs) => self.run_pairs(pairs, &job.subject, settings).await,
        }
    }

    async fn execute<'a, I>(
        &self,
        mode: CampaignMode,
        subject: &str,
        settings: &CampaignSettings,
        total: usize,
        messages: I,
    ) -> CampaignResult
    where
        I: Iterator<Item = (&'a str, Cow<'a, str>)>,
    {
        let delay = send_delay(settings.rate_per_minute);
        info!(
            mode = %mode,
            total,
            delay_ms = delay.as_millis() as u64,
            "Campaign started"
        );

        self.progress.begin(mode, total);

        let mut success = 0;
        for (i, (address, body)) in messages.enumerate() {
            let index = i + 1;

            let report = self.mailer.send(settings, address, subject, &body).await;
            if report.is_delivered() {
                success += 1;
            }

            self.progress
                .update(ProgressUpdate::attempt(index, success, address));

            if index < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let result = CampaignResult::new(mode, success, total);
        if let Err(e) = self.results.save(&result) {
            warn!(error = %e, "Failed to persist campaign result");
        }
        self.progress.complete(total);

        info!(
            mode = %mode,
            success = result.success,
            total = result.total,
            "Campaign completed"
        );
        result
    }
}
