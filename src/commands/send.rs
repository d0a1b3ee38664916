use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use relaymail::campaign::{CampaignJob, CampaignMode, CampaignRunner, JobContent};
use relaymail::input::parse_recipient_blob;
use relaymail::relay::{create_client, Mailer};
use relaymail::storage::{RecipientStore, TemplateStore};

use super::{load_config, open_store};

/// Parameters for a foreground campaign
pub struct SendParams {
    pub config_path: PathBuf,
    pub recipients: Option<PathBuf>,
    pub template: PathBuf,
    pub subject: Option<String>,
    pub all: bool,
}

/// Run one campaign in the foreground and print its result
pub async fn send(params: SendParams) -> Result<()> {
    let config = load_config(&params.config_path)?;
    let settings = config
        .campaign_settings(params.subject.as_deref())
        .context("Configuration is not usable for sending")?;

    let store = open_store(&config)?;
    let recipient_store = RecipientStore::new(store.clone());

    let template = fs::read_to_string(&params.template)
        .with_context(|| format!("Failed to read template {}", params.template.display()))?;

    let (mode, recipients) = if params.all {
        (CampaignMode::All, recipient_store.load_all()?)
    } else {
        let Some(path) = params.recipients.as_ref() else {
            bail!("--recipients is required unless --all is given");
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read recipients {}", path.display()))?;
        (CampaignMode::List, parse_recipient_blob(&text))
    };

    let job = CampaignJob::templated(mode, settings.subject.clone(), recipients, template);
    job.validate()?;

    if let JobContent::Template {
        recipients,
        template,
    } = &job.content
    {
        if mode == CampaignMode::List {
            let outcome = recipient_store.merge(recipients.as_slice())?;
            println!(
                "Recipient store: {} new, {} stored",
                outcome.appended, outcome.total
            );
        }
        if let Err(e) = TemplateStore::new(store.clone()).save(template) {
            tracing::warn!(error = %e, "Failed to save template");
        }
    }

    let transport = create_client(settings.proxy.as_deref())?;
    let runner = CampaignRunner::new(Mailer::new(Arc::new(transport)), store);

    println!("Sending campaign");
    println!("================");
    println!("  Mode: {mode}");
    println!("  Recipients: {}", job.len());
    println!("  Subject: {}", job.subject);
    println!(
        "  Rate: {}",
        if settings.rate_per_minute > 0.0 {
            format!("{} per minute", settings.rate_per_minute)
        } else {
            "unlimited".to_string()
        }
    );
    println!();

    let result = runner.run_job(&job, &settings).await;

    println!("Campaign finished");
    println!("  Delivered: {}/{}", result.success, result.total);
    println!("  Failed: {}", result.failed());
    Ok(())
}
