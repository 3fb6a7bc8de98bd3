use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub pinning: PinningConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ledger_path: default_ledger_path(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

/// Pricing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    /// Currency units per gigabyte per day of retention
    #[serde(default = "default_price_per_gb")]
    pub price_per_gb: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_per_gb: default_price_per_gb(),
        }
    }
}

fn default_price_per_gb() -> f64 {
    10.0
}

/// Pinning service backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinningProvider {
    Http,
    /// In-process, non-durable; development only
    #[default]
    Memory,
}

/// Pinning service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PinningConfig {
    #[serde(default)]
    pub provider: PinningProvider,
    pub endpoint: Option<String>,
    /// Bearer token (loaded from environment, not from config file)
    #[serde(skip)]
    pub token: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    /// Retries after the first attempt, on 5xx/429/transport errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: HumanDuration,
}

impl Default for PinningConfig {
    fn default() -> Self {
        Self {
            provider: PinningProvider::default(),
            endpoint: None,
            token: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(60)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> HumanDuration {
    HumanDuration::from_secs(1)
}

/// Batch job configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    #[serde(default = "default_settle_interval")]
    pub settle_interval: HumanDuration,
    #[serde(default = "default_reclaim_interval")]
    pub reclaim_interval: HumanDuration,
    /// Wall-clock ceiling of one settlement run
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout: HumanDuration,
    /// Attempts before a payment is given up
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
    /// Settlement attempts in flight at once (0 = unbounded)
    #[serde(default)]
    pub max_concurrency: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            settle_interval: default_settle_interval(),
            reclaim_interval: default_reclaim_interval(),
            batch_timeout: default_batch_timeout(),
            retry_ceiling: default_retry_ceiling(),
            max_concurrency: 0,
        }
    }
}

impl JobsConfig {
    pub fn concurrency_limit(&self) -> Option<usize> {
        (self.max_concurrency > 0).then_some(self.max_concurrency)
    }
}

fn default_settle_interval() -> HumanDuration {
    HumanDuration::from_secs(5 * 60)
}

fn default_reclaim_interval() -> HumanDuration {
    HumanDuration::from_secs(60 * 60)
}

fn default_batch_timeout() -> HumanDuration {
    HumanDuration(crate::jobs::DEFAULT_BATCH_TIMEOUT)
}

fn default_retry_ceiling() -> u32 {
    crate::jobs::DEFAULT_RETRY_CEILING
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
