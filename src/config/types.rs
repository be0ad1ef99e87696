use crate::warmer::DEFAULT_USER_AGENT;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for the cache warmer
#[derive(Debug, Clone, Deserialize)]
pub struct WarmerConfig {
    pub queue: QueueConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Queue storage and claiming configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Number of items claimed per batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Claim items even if their `not_before` is in the future
    #[serde(rename = "ignore-delay", default)]
    pub ignore_delay: bool,

    /// Release processing claims older than this many seconds before a run
    #[serde(rename = "stale-claim-after-secs", default)]
    pub stale_claim_after_secs: Option<u64>,
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Maximum number of requests in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Extra request headers; these override the defaults
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            headers: BTreeMap::new(),
        }
    }
}

/// Run loop configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverConfig {
    /// Maximum items per run; 0 means no limit
    #[serde(default)]
    pub limit: u64,

    /// Pause between batches (milliseconds)
    #[serde(rename = "sleep-ms", default)]
    pub sleep_ms: u64,
}

/// Retry configuration for failed items
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Failed items with fewer attempts are requeued; 0 disables retries
    #[serde(rename = "max-attempts", default)]
    pub max_attempts: u32,

    #[serde(rename = "backoff-secs", default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            backoff_secs: default_backoff_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_backoff_secs() -> u64 {
    300
}

fn default_log_filter() -> String {
    "cache_warmer=info,warn".to_string()
}
