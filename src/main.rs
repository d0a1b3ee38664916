use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaymail::config::DEFAULT_CONFIG_PATH;

mod commands;

#[derive(Parser)]
#[command(
    name = "relaymail",
    version,
    about = "Bulk mail dispatch through a transactional mail relay",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control surface
    Serve {
        /// Bind address, overrides [server].bind_address
        #[arg(short, long)]
        bind: Option<String>,

        /// Run every campaign on its own task instead of queueing them
        #[arg(long, default_value = "false")]
        detached: bool,
    },

    /// Run a campaign in the foreground
    Send {
        /// File with addresses separated by whitespace, commas or semicolons
        #[arg(short, long, required_unless_present = "all")]
        recipients: Option<PathBuf>,

        /// HTML template file
        #[arg(short, long)]
        template: PathBuf,

        /// Subject, overrides [setting].subject
        #[arg(short, long)]
        subject: Option<String>,

        /// Send to every stored recipient
        #[arg(long, default_value = "false", conflicts_with = "recipients")]
        all: bool,
    },

    /// Manage the recipient store
    Recipients {
        #[command(subcommand)]
        action: RecipientsAction,
    },

    /// Print campaign progress
    Progress,

    /// Print the last campaign result
    LastResult,
}

#[derive(Subcommand)]
enum RecipientsAction {
    /// Merge addresses from a file
    Add {
        file: PathBuf,
    },

    /// Show the stored count and a preview
    List {
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Remove every stored address
    Clear,

    /// Print the stored list
    Export,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Serve { bind, detached } => {
            tracing::info!(bind = ?bind, detached = %detached, "Starting serve command");
            commands::serve(commands::ServeParams {
                config_path: cli.config,
                bind,
                detached,
            })
            .await?;
        }

        Commands::Send {
            recipients,
            template,
            subject,
            all,
        } => {
            tracing::info!(
                recipients = ?recipients,
                template = %template.display(),
                all = %all,
                "Starting send command"
            );
            commands::send(commands::SendParams {
                config_path: cli.config,
                recipients,
                template,
                subject,
                all,
            })
            .await?;
        }

        Commands::Recipients { action } => match action {
            RecipientsAction::Add { file } => commands::add_recipients(&cli.config, &file)?,
            RecipientsAction::List { limit } => commands::list_recipients(&cli.config, limit)?,
            RecipientsAction::Clear => commands::clear_recipients(&cli.config)?,
            RecipientsAction::Export => commands::export_recipients(&cli.config)?,
        },

        Commands::Progress => commands::progress(&cli.config)?,

        Commands::LastResult => commands::last_result(&cli.config)?,
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("relaymail=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("relaymail=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
