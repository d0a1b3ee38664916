//! Configuration management for relaymail
//!
//! Settings live in a TOML file with a `[postal]` section describing the
//! relay and a `[setting]` section describing the campaign defaults.
//! Optional `[server]` and `[storage]` sections configure the control
//! surface and data directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::campaign::pacing;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Relay connection settings
    #[serde(default)]
    pub postal: PostalConfig,

    /// Campaign defaults
    #[serde(default)]
    pub setting: SendSetting,

    /// Control surface settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Data directory settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Relay endpoint and sender identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostalConfig {
    /// Relay base URL
    #[serde(default)]
    pub server: String,

    /// Relay API key
    #[serde(default)]
    pub key: String,

    /// Sender display name
    #[serde(default)]
    pub from_name: String,

    /// Sender address
    #[serde(default)]
    pub from_email: String,
}

/// Campaign defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendSetting {
    /// Default subject line
    #[serde(default)]
    pub subject: String,

    /// Messages per minute, 0 means unlimited
    #[serde(default)]
    pub limit: f64,

    /// Outbound proxy URL, empty means direct
    #[serde(default)]
    pub proxy: String,
}

/// HTTP control surface configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable permissive CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Enable request tracing
    #[serde(default = "default_true")]
    pub enable_request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

/// Data directory configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding recipients, template, progress and result files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_bind_address() -> String {
    String::from("0.0.0.0:6253")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_true() -> bool {
    true
}

/// Immutable settings snapshot used for one campaign
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSettings {
    /// Relay base URL
    pub endpoint: String,

    /// Relay API key
    pub api_key: String,

    /// Sender display name
    pub from_name: String,

    /// Sender address
    pub from_email: String,

    /// Outbound proxy
    pub proxy: Option<String>,

    /// Subject line
    pub subject: String,

    /// Messages per minute, 0 means unlimited
    pub rate_per_minute: f64,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required field is empty or absent
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A field has an unusable value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// The configuration file could not be read or written
    #[error("Config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write configuration to a TOML file, replacing it atomically
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let temp_path = path.with_extension(format!("toml.{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&temp_path, content).map_err(io_err)?;
        fs::rename(&temp_path, path).map_err(io_err)?;

        tracing::debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Apply `RELAYMAIL_POSTAL_KEY` and `RELAYMAIL_PROXY` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("RELAYMAIL_POSTAL_KEY") {
            self.postal.key = key;
        }
        if let Ok(proxy) = std::env::var("RELAYMAIL_PROXY") {
            self.setting.proxy = proxy;
        }
    }

    /// Validate the fields a campaign needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("postal.server", &self.postal.server),
            ("postal.key", &self.postal.key),
            ("postal.from_email", &self.postal.from_email),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        let server = self.postal.server.trim();
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "postal.server".to_string(),
                reason: format!("expected an http(s) URL, got '{server}'"),
            });
        }

        if !self.setting.limit.is_finite() || self.setting.limit < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "setting.limit".to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        if !pacing::is_representable(self.setting.limit) {
            return Err(ConfigError::InvalidValue {
                field: "setting.limit".to_string(),
                reason: format!("{} per minute is too small to pace", self.setting.limit),
            });
        }

        Ok(())
    }

    /// Produce the immutable settings snapshot for one campaign
    ///
    /// A non-empty `subject_override` replaces the configured subject.
    pub fn campaign_settings(
        &self,
        subject_override: Option<&str>,
    ) -> Result<CampaignSettings, ConfigError> {
        self.validate()?;

        let subject = subject_override
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.setting.subject.trim())
            .to_string();

        let proxy = Some(self.setting.proxy.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(CampaignSettings {
            endpoint: self.postal.server.trim().to_string(),
            api_key: self.postal.key.trim().to_string(),
            from_name: self.postal.from_name.trim().to_string(),
            from_email: self.postal.from_email.trim().to_string(),
            proxy,
            subject,
            rate_per_minute: self.setting.limit,
        })
    }
}
