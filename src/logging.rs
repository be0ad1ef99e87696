//! Logging setup for embedding applications
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the caller. These helpers install the usual fmt subscriber.

use tracing_subscriber::EnvFilter;

/// Maps verbosity flags to a filter directive
pub fn filter_for_verbosity(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }

    match verbose {
        0 => "cache_warmer=info,warn",
        1 => "cache_warmer=debug,info",
        2 => "cache_warmer=trace,debug",
        _ => "trace",
    }
}

/// Installs a global fmt subscriber
///
/// `RUST_LOG`, when set and valid, takes precedence over `filter`.
///
/// # Returns
///
/// false if a global subscriber was already installed
pub fn init_logging(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}
