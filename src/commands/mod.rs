pub mod recipients;
pub mod send;
pub mod serve;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use relaymail::config::Config;
use relaymail::storage::{FileStore, SharedStore};

// Re-export command functions for convenience
pub use recipients::{add_recipients, clear_recipients, export_recipients, list_recipients};
pub use send::{send, SendParams};
pub use serve::{serve, ServeParams};
pub use status::{last_result, progress};

/// Load the configuration file with environment overrides applied
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env_overrides();
    Ok(config)
}

/// Open the document store under the configured data directory
pub fn open_store(config: &Config) -> Result<SharedStore> {
    let store = FileStore::new(&config.storage.data_dir).with_context(|| {
        format!(
            "Failed to open data directory {}",
            config.storage.data_dir.display()
        )
    })?;
    Ok(Arc::new(store))
}
