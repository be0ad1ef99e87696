//! Cache-Warmer: a persistent work queue that pre-fetches URLs into an HTTP cache
//!
//! URLs are enqueued into a durable SQLite-backed queue, claimed in batches by
//! workers using an atomic conditional update, and fetched with bounded
//! concurrency. Every fetch outcome is written back to the queue.

pub mod config;
pub mod logging;
pub mod queue;
pub mod state;
pub mod storage;
pub mod warmer;

use thiserror::Error;

/// Main error type for Cache-Warmer operations
#[derive(Debug, Error)]
pub enum WarmerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid header in config: {0}")]
    InvalidHeader(String),
}

/// Result type alias for Cache-Warmer operations
pub type Result<T> = std::result::Result<T, WarmerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::WarmerConfig;
pub use queue::{
    add_urls, claim_batch, clear_pending, get_status, ClaimToken, EnqueueRequest, QueueStatus,
    RetryPolicy,
};
pub use state::ItemStatus;
pub use storage::{QueueItem, QueueStore, RunStatus, SqliteStorage};
pub use warmer::{BatchSummary, Driver, DriverOptions, FetchExecutor, FetchSettings, RunSummary};
