//! Control surface server
//!
//! Owns the shared state handed to every handler and wires the router
//! with its CORS and tracing layers.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::campaign::{CampaignRunner, DispatchMode, Dispatcher};
use crate::config::{CampaignSettings, Config, ConfigError};
use crate::relay::{create_client, Mailer, TransportError};
use crate::storage::{
    FileStore, ProgressTracker, RecipientStore, ResultStore, SharedStore, TemplateStore,
};

use super::routes::create_router;

// ============================================================================
// App State
// ============================================================================

/// Builds the mailer for one campaign from its settings snapshot
pub type MailerFactory =
    Arc<dyn Fn(&CampaignSettings) -> Result<Mailer, TransportError> + Send + Sync>;

/// Mailers backed by a real HTTP transport honouring the configured proxy
pub fn http_mailers() -> MailerFactory {
    Arc::new(|settings: &CampaignSettings| -> Result<Mailer, TransportError> {
        let transport = create_client(settings.proxy.as_deref())?;
        Ok(Mailer::new(Arc::new(transport)))
    })
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration file, re-read on every request
    pub config_path: PathBuf,

    /// Backing document store
    pub store: SharedStore,

    pub recipients: RecipientStore,
    pub templates: TemplateStore,
    pub progress: ProgressTracker,
    pub results: ResultStore,

    /// Background campaign launcher
    pub dispatcher: Dispatcher,

    pub mailers: MailerFactory,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config_path: impl Into<PathBuf>,
        store: SharedStore,
        dispatcher: Dispatcher,
        mailers: MailerFactory,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            recipients: RecipientStore::new(store.clone()),
            templates: TemplateStore::new(store.clone()),
            progress: ProgressTracker::new(store.clone()),
            results: ResultStore::new(store.clone()),
            store,
            dispatcher,
            mailers,
            start_time: Instant::now(),
        }
    }

    /// Configuration exactly as stored on disk
    pub fn stored_config(&self) -> Result<Config, ConfigError> {
        Config::load_or_default(&self.config_path)
    }

    /// Configuration with environment overrides, as campaigns see it
    pub fn effective_config(&self) -> Result<Config, ConfigError> {
        let mut config = self.stored_config()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Runner for one campaign, with a transport built from `settings`
    pub fn runner_for(&self, settings: &CampaignSettings) -> Result<CampaignRunner, TransportError> {
        let mailer = (self.mailers)(settings)?;
        Ok(CampaignRunner::new(mailer, self.store.clone()))
    }
}

// ============================================================================
// Mail Server
// ============================================================================

/// HTTP control surface for campaigns
pub struct MailServer {
    bind_address: SocketAddr,
    enable_cors: bool,
    enable_request_logging: bool,
    state: AppState,
}

impl MailServer {
    /// Create a server storing its documents under the configured data
    /// directory. Must be called inside a tokio runtime.
    pub fn new(
        config_path: impl AsRef<Path>,
        config: &Config,
        mode: DispatchMode,
    ) -> Result<Self, ServerError> {
        let bind_address: SocketAddr = config.server.bind_address.parse().map_err(|_| {
            ServerError::Config(ConfigError::InvalidValue {
                field: "server.bind_address".to_string(),
                reason: format!("'{}' is not a socket address", config.server.bind_address),
            })
        })?;

        let store = FileStore::new(&config.storage.data_dir)
            .map_err(|e| ServerError::Init(e.to_string()))?;

        let state = AppState::new(
            config_path.as_ref(),
            Arc::new(store),
            Dispatcher::new(mode),
            http_mailers(),
        );

        Ok(Self {
            bind_address,
            enable_cors: config.server.enable_cors,
            enable_request_logging: config.server.enable_request_logging,
            state,
        })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.bind_address;

        tracing::info!(
            %addr,
            dispatch = ?self.state.dispatcher.mode(),
            "Starting relaymail control server"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Control server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Server Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Initialization error: {0}")]
    Init(String),

    #[error("Failed to bind: {0}")]
    Bind(String),

    #[error("Server error: {0}")]
    Serve(String),
}
