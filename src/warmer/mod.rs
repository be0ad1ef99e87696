//! Warming: fetching claimed items and driving runs
//!
//! - `fetcher`: HTTP client, default headers and outcome classification
//! - `executor`: bounded-concurrency batch execution with terminal writes
//! - `driver`: the claim/execute loop for a whole run

mod driver;
mod executor;
mod fetcher;

pub use driver::{Driver, DriverOptions, RunSummary};
pub use executor::{BatchSummary, FetchExecutor, FetchSettings};
pub use fetcher::{
    build_headers, build_http_client, fetch_url, is_success_status, truncate_error, FetchOutcome,
    DEFAULT_USER_AGENT, MARKER_HEADER, MAX_ERROR_LEN,
};
