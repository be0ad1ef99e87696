//! Fetch executor: warms a claimed batch with bounded concurrency
//!
//! Every item handed to [`FetchExecutor::execute_batch`] gets exactly one
//! terminal write (done or failed, `attempts + 1`), issued as soon as its
//! fetch completes.

use crate::config::HttpConfig;
use crate::storage::{lock_store, QueueItem, QueueStore, StorageResult};
use crate::warmer::fetcher::{
    build_headers, build_http_client, fetch_url, FetchOutcome, DEFAULT_USER_AGENT,
};
use crate::WarmerError;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::ops::AddAssign;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};

/// HTTP settings for a fetch executor
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Maximum number of requests in flight; values below 1 are treated as 1
    pub concurrency: usize,

    /// Per-request timeout covering connect, headers and body
    pub timeout: Duration,

    /// Extra headers; these replace defaults with the same name
    pub headers: Vec<(String, String)>,

    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(15),
            headers: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl From<&HttpConfig> for FetchSettings {
    fn from(config: &HttpConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            timeout: Duration::from_secs(config.timeout_secs),
            headers: config
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Outcome counts for one or more batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: u64,
    pub success: u64,
    pub failed: u64,
}

impl BatchSummary {
    fn record(&mut self, success: bool) {
        self.processed += 1;
        if success {
            self.success += 1;
        } else {
            self.failed += 1;
        }
    }
}

impl AddAssign for BatchSummary {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.success += other.success;
        self.failed += other.failed;
    }
}

/// Fetches claimed items and records their outcomes
pub struct FetchExecutor {
    client: Client,
    concurrency: usize,
    timeout: Duration,
}

impl FetchExecutor {
    /// Creates an executor with its own HTTP client
    ///
    /// # Errors
    ///
    /// Fails if a configured header is not valid HTTP or the client cannot
    /// be built.
    pub fn new(settings: &FetchSettings) -> Result<Self, WarmerError> {
        let headers = build_headers(&settings.user_agent, &settings.headers)?;
        let client = build_http_client(headers)?;

        Ok(Self {
            client,
            concurrency: settings.concurrency.max(1),
            timeout: settings.timeout,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches every item and writes its terminal status to `store`
    ///
    /// At most `concurrency` requests are in flight. Right before an item is
    /// fetched its `claimed_at` is reset, so a claim only looks stale once its
    /// own request has outlived the timeout, not while it waits for a slot.
    /// An item whose claim was released and taken by another run in the
    /// meantime is skipped without a request and is not counted.
    ///
    /// Results are written in completion order, each under the item's own
    /// claim token. If that write finds the claim gone, the outcome is logged
    /// and dropped but the item still counts towards the summary.
    ///
    /// Items without a claim token were never claimed and are skipped.
    ///
    /// # Errors
    ///
    /// Only storage failures are returned; HTTP failures are recorded on the
    /// item instead.
    pub async fn execute_batch<S>(
        &self,
        store: &Mutex<S>,
        items: Vec<QueueItem>,
    ) -> Result<BatchSummary, WarmerError>
    where
        S: QueueStore + ?Sized,
    {
        let mut summary = BatchSummary::default();

        let claimed: Vec<(QueueItem, String)> = items
            .into_iter()
            .filter_map(|item| match item.claim_token.clone() {
                Some(token) => Some((item, token)),
                None => {
                    tracing::warn!("Skipping unclaimed item {} ({})", item.id, item.url);
                    None
                }
            })
            .collect();

        if claimed.is_empty() {
            return Ok(summary);
        }

        let client = &self.client;
        let timeout = self.timeout;
        let mut results = stream::iter(claimed)
            .map(|(item, token)| async move {
                match with_store(store, |s| s.touch_claim(item.id, &token)) {
                    Ok(true) => {
                        let outcome = fetch_url(client, &item.url, timeout).await;
                        (item, token, Ok(Some(outcome)))
                    }
                    Ok(false) => (item, token, Ok(None)),
                    Err(e) => (item, token, Err(e)),
                }
            })
            .buffer_unordered(self.concurrency);

        while let Some((item, token, fetched)) = results.next().await {
            let Some(outcome) = fetched? else {
                tracing::warn!(
                    "Claim on item {} ({}) was lost before its fetch started, skipping",
                    item.id,
                    item.url
                );
                continue;
            };

            let resolution = outcome.to_resolution();
            let recorded = with_store(store, |s| s.resolve_item(item.id, &token, &resolution))?;

            if !recorded {
                tracing::warn!(
                    "Claim on item {} ({}) was lost before its result could be written",
                    item.id,
                    item.url
                );
            }

            log_outcome(&item, &outcome);
            summary.record(outcome.is_success());
        }

        tracing::info!(
            "Batch finished: {} processed, {} ok, {} failed",
            summary.processed,
            summary.success,
            summary.failed
        );

        Ok(summary)
    }
}

/// Runs a store operation under the lock
///
/// On a multi-threaded runtime the (possibly busy-waiting) SQLite call is
/// moved off the async worker so in-flight fetches keep being polled.
fn with_store<S, T>(
    store: &Mutex<S>,
    op: impl FnOnce(&mut S) -> StorageResult<T>,
) -> StorageResult<T>
where
    S: QueueStore + ?Sized,
{
    let run = || {
        let mut guard = lock_store(store)?;
        op(&mut *guard)
    };

    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(run),
        _ => run(),
    }
}

fn log_outcome(item: &QueueItem, outcome: &FetchOutcome) {
    let ms = outcome.duration().as_secs_f64() * 1000.0;
    match outcome {
        FetchOutcome::Success { status_code, .. } => {
            tracing::debug!("Warmed {} ({} in {:.1} ms)", item.url, status_code, ms);
        }
        FetchOutcome::HttpStatus { status_code, .. } => {
            tracing::warn!("Failed {}: HTTP {} in {:.1} ms", item.url, status_code, ms);
        }
        FetchOutcome::Transport { error, .. } => {
            tracing::warn!("Failed {}: {}", item.url, error);
        }
    }
}
