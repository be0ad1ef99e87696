//! Configuration module for the cache warmer
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use cache_warmer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("warmer.toml")).unwrap();
//! println!("Warming with {} concurrent requests", config.http.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{DriverConfig, HttpConfig, LoggingConfig, QueueConfig, RetryConfig, WarmerConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
