//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod ledger;
mod storage;

pub use ledger::{CommissionConfig, PayoutConfig, ResyncConfig, DEFAULT_CONFIRMED_STATUSES};
pub use storage::{SqliteConfig, StorageConfig, StorageType};

use serde::Deserialize;

use crate::model::SplitError;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "affiliate-ledger.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "AFFILIATE_LEDGER_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "AFFILIATE_LEDGER";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "AFFILIATE_LEDGER_LOG";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid split table: {0}")]
    InvalidSplit(#[from] SplitError),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Commission engine configuration.
    pub commission: CommissionConfig,
    /// Payout workflow configuration.
    pub payout: PayoutConfig,
    /// Resync job configuration.
    pub resync: ResyncConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `affiliate-ledger.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
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
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(self.commission.splits.validate()?)
    }

    /// Create config for testing: in-memory store, no payout floor.
    pub fn for_test() -> Self {
        Self {
            storage: StorageConfig {
                storage_type: StorageType::Memory,
                ..StorageConfig::default()
            },
            payout: PayoutConfig {
                minimum_amount: rust_decimal::Decimal::ZERO,
            },
            ..Self::default()
        }
    }
}
