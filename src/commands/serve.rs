use std::path::PathBuf;

use anyhow::{Context, Result};

use relaymail::api::MailServer;
use relaymail::campaign::DispatchMode;

use super::load_config;

/// Parameters for the control server
pub struct ServeParams {
    pub config_path: PathBuf,
    pub bind: Option<String>,
    pub detached: bool,
}

/// Run the HTTP control surface until Ctrl+C
pub async fn serve(params: ServeParams) -> Result<()> {
    let ServeParams {
        config_path,
        bind,
        detached,
    } = params;

    let mut config = load_config(&config_path)?;
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }

    let mode = if detached {
        DispatchMode::Detached
    } else {
        DispatchMode::Serialized
    };

    let server = MailServer::new(&config_path, &config, mode)
        .context("Failed to create control server")?;

    println!("Starting relaymail control server");
    println!("=================================");
    println!("  Config: {}", config_path.display());
    println!("  Data directory: {}", config.storage.data_dir.display());
    println!(
        "  Dispatch: {}",
        match mode {
            DispatchMode::Serialized => "serialized",
            DispatchMode::Detached => "detached (campaigns may overlap)",
        }
    );
    println!();
    println!("API Endpoints:");
    println!("  GET    /api/health             - Health check");
    println!("  GET    /api/config             - Read configuration");
    println!("  POST   /api/config             - Replace configuration");
    println!("  POST   /api/send               - Start a templated campaign");
    println!("  POST   /api/send/pairs         - Start a per-recipient body campaign");
    println!("  GET    /api/recipients         - Count and preview stored recipients");
    println!("  POST   /api/recipients         - Merge recipients without sending");
    println!("  DELETE /api/recipients         - Clear stored recipients");
    println!("  GET    /api/recipients/export  - Download stored recipients");
    println!("  GET    /api/template           - Last saved template");
    println!("  GET    /api/progress           - Campaign progress");
    println!("  GET    /api/last_result        - Last campaign result");
    println!();
    println!("Listening on http://{}", server.bind_address());
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Control server stopped.");
    Ok(())
}
