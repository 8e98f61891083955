//! Application configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file
//! (`stockroom.toml`, or the path in `STOCKROOM_CONFIG`), then environment
//! variables shaped like `STOCKROOM__STOCK__EXCESS_THRESHOLD=250`.

use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_inventory::StockHandlerConfig;
use stockroom_observability::LoggingConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "STOCKROOM_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "stockroom.toml";
const ENV_PREFIX: &str = "STOCKROOM";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Tick period of the background event processor, in seconds.
    pub processor_interval_secs: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            processor_interval_secs: 60,
        }
    }
}

impl EventsConfig {
    pub fn processor_interval(&self) -> Duration {
        Duration::from_secs(self.processor_interval_secs)
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub events: EventsConfig,
    pub stock: StockHandlerConfig,
}

impl AppConfig {
    /// Load from the file named by `STOCKROOM_CONFIG` (or `stockroom.toml`) plus env.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(&path)
    }

    /// Load from `path` (missing file is fine) plus env.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder)
    }

    /// Parse a TOML document (no env overlay).
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let cfg: AppConfig = builder
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events.processor_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "events.processor_interval_secs must be greater than zero".into(),
            ));
        }
        if self.stock.excess_threshold < 0 {
            return Err(ConfigError::Invalid(
                "stock.excess_threshold cannot be negative".into(),
            ));
        }
        Ok(())
    }
}
