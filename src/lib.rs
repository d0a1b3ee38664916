//! relaymail - bulk mail dispatch through a transactional mail relay
//!
//! Delivers one message per recipient through an HTTP mail API while
//! honouring a messages-per-minute budget, retrying transient relay
//! failures and persisting live progress.
//!
//! # Architecture
//!
//! - [`relay`] - HTTP transport with connection-level retry and the
//!   per-message delivery policy
//! - [`campaign`] - pacing, the campaign runner and background dispatch
//! - [`storage`] - whole-document persistence: recipients, template,
//!   progress and last result
//! - [`template`] - `{{email}}`, `{{index}}` and `{{domain}}` rendering
//! - [`input`] - recipient blob and row-pair normalisation
//! - [`config`] - TOML configuration and campaign settings snapshots
//! - [`api`] - axum control surface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use relaymail::campaign::{CampaignMode, CampaignRunner};
//! use relaymail::config::Config;
//! use relaymail::relay::{create_client, Mailer};
//! use relaymail::storage::FileStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.toml".as_ref())?;
//!     let settings = config.campaign_settings(None)?;
//!     let transport = create_client(settings.proxy.as_deref())?;
//!     let store = FileStore::new(&config.storage.data_dir)?;
//!     let runner = CampaignRunner::new(Mailer::new(Arc::new(transport)), Arc::new(store));
//!
//!     let recipients = vec!["a@example.com".to_string()];
//!     let result = runner
//!         .run(CampaignMode::List, &recipients, &settings.subject, "<p>Hi {{email}}</p>", &settings)
//!         .await;
//!     println!("{}/{} delivered", result.success, result.total);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod campaign;
pub mod config;
pub mod error;
pub mod input;
pub mod relay;
pub mod storage;
pub mod template;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::campaign::{
        CampaignJob, CampaignMode, CampaignResult, CampaignRunner, DispatchMode, Dispatcher,
    };
    pub use crate::config::{CampaignSettings, Config};
    pub use crate::error::{Error, ErrorCategory, RelayErrorTrait, Result};
    pub use crate::relay::{HttpTransport, Mailer, Transport};
    pub use crate::storage::{DocumentStore, FileStore, MemoryStore, SharedStore};
}

// Direct re-exports for convenience
pub use campaign::{CampaignMode, CampaignResult};
pub use config::{CampaignSettings, Config};
