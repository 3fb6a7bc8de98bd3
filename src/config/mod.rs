//! Configuration management for pinkeep
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use pinkeep::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Price per GB: {}", config.pricing.price_per_gb);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `PINKEEP__<section>__<key>`
//!
//! Examples:
//! - `PINKEEP__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `PINKEEP__PRICING__PRICE_PER_GB=12.5`
//! - `PINKEEP__JOBS__BATCH_TIMEOUT=30m`
//!
//! The pinning service token is read from `PINKEEP_PINNING_TOKEN` only.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/pinkeep.toml`.
//! This can be overridden using the `PINKEEP_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    Config, JobsConfig, PinningConfig, PinningProvider, PricingConfig, ServerConfig,
    TelemetryConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

use crate::pinning::HttpPinnerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`PINKEEP__*`)
    /// 2. TOML file (default: `config/pinkeep.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (non-positive price, missing endpoint, zero intervals)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, plus environment and secrets
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_with_secrets(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Validate an already-built configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }

    /// HTTP pinning client settings derived from the `[pinning]` section
    pub fn http_pinner(&self) -> HttpPinnerConfig {
        let defaults = HttpPinnerConfig::default();
        HttpPinnerConfig {
            endpoint: self.pinning.endpoint.clone().unwrap_or(defaults.endpoint),
            token: self.pinning.token.clone(),
            connect_timeout: self.pinning.connect_timeout.as_duration(),
            request_timeout: self.pinning.request_timeout.as_duration(),
            max_retries: self.pinning.max_retries,
            retry_backoff: self.pinning.retry_backoff.as_duration(),
            user_agent: defaults.user_agent,
        }
    }
}
