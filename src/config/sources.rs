use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "PINKEEP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/pinkeep.toml";
const ENV_PREFIX: &str = "PINKEEP";
const ENV_SEPARATOR: &str = "__";
const PINNING_TOKEN_ENV_VAR: &str = "PINKEEP_PINNING_TOKEN";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_with_secrets(config_path)
}

/// Like [`load`], but from an explicit file path
pub fn load_with_secrets(config_path: PathBuf) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);
    Ok(config)
}

/// Secrets are never stored in TOML files, only in environment
fn load_secrets(config: &mut Config) {
    if let Ok(token) = env::var(PINNING_TOKEN_ENV_VAR) {
        if !token.is_empty() {
            config.pinning.token = Some(token);
        }
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // PINKEEP__PRICING__PRICE_PER_GB -> pricing.price_per_gb
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.jobs.retry_ceiling, 5);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
ledger_path = "/var/lib/pinkeep/ledger"

[pricing]
price_per_gb = 4.0

[pinning]
provider = "http"
endpoint = "http://pins.internal:9094"
request_timeout = "2m"
max_retries = 5

[jobs]
settle_interval = "1m"
reclaim_interval = "6h"
batch_timeout = "60m"
retry_ceiling = 3
max_concurrency = 16

[telemetry]
log_filter = "pinkeep=debug"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.pricing.price_per_gb, 4.0);
        assert_eq!(config.pinning.endpoint.as_deref(), Some("http://pins.internal:9094"));
        assert_eq!(config.pinning.request_timeout.as_duration(), Duration::from_secs(120));
        assert_eq!(config.pinning.max_retries, 5);
        assert_eq!(config.jobs.reclaim_interval.as_duration(), Duration::from_secs(6 * 3600));
        assert_eq!(config.jobs.retry_ceiling, 3);
        assert_eq!(config.jobs.concurrency_limit(), Some(16));
        assert_eq!(config.telemetry.log_filter, "pinkeep=debug");
        // Secrets never come from the file
        assert!(config.pinning.token.is_none());
    }

    // Environment variable overrides are not exercised here: env::set_var is unsafe
    // under edition 2024 and races with parallel tests
}
