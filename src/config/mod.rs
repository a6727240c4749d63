//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod accrual;
mod auth;
mod storage;
mod worker;

pub use accrual::AccrualConfig;
pub use auth::{AuthConfig, DEFAULT_TOKEN_VALIDITY_SECS};
pub use storage::StorageConfig;
pub use worker::WorkerConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "LOYALTY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "LOYALTY";
/// Environment variable for logging configuration.
pub use crate::utils::bootstrap::LOG_ENV_VAR;

use serde::Deserialize;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("Failed to read secret file {path}: {source}")]
    SecretFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Accrual oracle client configuration.
    pub accrual: AccrualConfig,
    /// Token signing configuration.
    pub auth: AuthConfig,
    /// Reconciliation worker configuration.
    pub worker: WorkerConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. Un-prefixed environment variables (legacy)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .add_source(Environment::default().separator("__").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check the settings the worker cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accrual.address.trim().is_empty() {
            return Err(ConfigError::Missing("accrual.address"));
        }
        if !self.auth.has_secret() {
            return Err(ConfigError::Missing("auth.secret"));
        }
        if self.accrual.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "accrual.timeout_ms",
                message: "must be positive".to_string(),
            });
        }
        if self.worker.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "worker.interval_ms",
                message: "must be positive".to_string(),
            });
        }
        if self.storage.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "storage.max_connections",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self {
            accrual: AccrualConfig {
                address: "http://127.0.0.1:8081".to_string(),
                ..Default::default()
            },
            auth: AuthConfig {
                secret: Some("test-secret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
