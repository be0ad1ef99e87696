//! Warm run driver - the claim/execute loop
//!
//! A run owns a single claim token for its whole lifetime. It optionally
//! recovers stale claims and requeues failed items, then repeatedly claims a
//! batch and executes it until the queue has no eligible items, the item
//! limit is reached, or it is cancelled. Each run is recorded in the `runs`
//! table.

use crate::config::WarmerConfig;
use crate::queue::{
    claim_batch, release_stale_claims, requeue_failed, ClaimToken, RetryPolicy,
};
use crate::storage::{lock_store, QueueStore, RunStatus, SqliteStorage};
use crate::warmer::executor::{BatchSummary, FetchExecutor, FetchSettings};
use crate::{ConfigError, WarmerError};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Options controlling a warm run
#[derive(Debug, Clone, PartialEq)]
pub struct DriverOptions {
    /// Items claimed per batch
    pub batch_size: usize,

    /// Stop after this many items; `None` runs until the queue is drained
    pub limit: Option<u64>,

    /// Pause between batches
    pub sleep: Duration,

    /// Claim pending items regardless of `not_before`
    pub ignore_delay: bool,

    pub retry: RetryPolicy,

    /// Release claims older than this before starting; `None` leaves them
    pub stale_claim_after: Option<Duration>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            limit: None,
            sleep: Duration::ZERO,
            ignore_delay: false,
            retry: RetryPolicy::disabled(),
            stale_claim_after: None,
        }
    }
}

impl From<&WarmerConfig> for DriverOptions {
    fn from(config: &WarmerConfig) -> Self {
        Self {
            batch_size: config.queue.batch_size,
            limit: match config.driver.limit {
                0 => None,
                limit => Some(limit),
            },
            sleep: Duration::from_millis(config.driver.sleep_ms),
            ignore_delay: config.queue.ignore_delay,
            retry: RetryPolicy {
                max_attempts: config.retry.max_attempts,
                backoff: Duration::from_secs(config.retry.backoff_secs),
            },
            stale_claim_after: config.queue.stale_claim_after_secs.map(Duration::from_secs),
        }
    }
}

/// Result of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: i64,
    pub claim_token: ClaimToken,
    pub status: RunStatus,
    pub batches: u64,
    pub totals: BatchSummary,
    pub elapsed: Duration,
}

/// Drives warm runs against a shared store
pub struct Driver<S: QueueStore> {
    store: Arc<Mutex<S>>,
    executor: FetchExecutor,
    options: DriverOptions,
    config_hash: String,
}

impl Driver<SqliteStorage> {
    /// Opens the configured database and builds a driver from a loaded config
    ///
    /// `config_hash` is recorded on every run started by this driver.
    pub fn from_config(config: &WarmerConfig, config_hash: &str) -> Result<Self, WarmerError> {
        let storage = SqliteStorage::new(Path::new(&config.queue.database_path))?;
        let executor = FetchExecutor::new(&FetchSettings::from(&config.http))?;

        Ok(Self::new(
            Arc::new(Mutex::new(storage)),
            executor,
            DriverOptions::from(config),
        )
        .with_config_hash(config_hash))
    }
}

impl<S: QueueStore> Driver<S> {
    pub fn new(store: Arc<Mutex<S>>, executor: FetchExecutor, options: DriverOptions) -> Self {
        Self {
            store,
            executor,
            options,
            config_hash: String::new(),
        }
    }

    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Runs the claim/execute loop until there is no more work
    ///
    /// Cancellation is observed between batches and during the inter-batch
    /// sleep; a batch that has started always runs to completion so that
    /// none of its items is left in processing. A cancelled run is recorded
    /// as interrupted.
    ///
    /// # Errors
    ///
    /// Options that could reclaim a live fetch are rejected before the run
    /// starts. Storage failures abort the run. The run row is marked failed
    /// (best effort) and the original error is returned.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary, WarmerError> {
        self.check_options()?;

        let started = Instant::now();
        let token = ClaimToken::generate();
        let run_id = {
            let mut store = lock_store(&self.store)?;
            store.create_run(token.as_str(), &self.config_hash)?
        };
        tracing::info!("Starting warm run {} (claim token {})", run_id, token);

        let mut totals = BatchSummary::default();
        let mut batches = 0u64;
        let result = self
            .drive(&token, &cancel, &mut totals, &mut batches)
            .await;

        let status = match &result {
            Ok(true) => RunStatus::Interrupted,
            Ok(false) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        };

        let finished = lock_store(&self.store).and_then(|mut store| {
            store.finish_run(
                run_id,
                status,
                totals.processed,
                totals.success,
                totals.failed,
            )
        });

        if let Err(e) = result {
            tracing::error!("Warm run {} failed: {}", run_id, e);
            if let Err(finish_error) = finished {
                tracing::warn!("Could not mark run {} as failed: {}", run_id, finish_error);
            }
            return Err(e);
        }
        finished?;

        let elapsed = started.elapsed();
        tracing::info!(
            "Warm run {} {}: {} processed, {} ok, {} failed in {} batch(es), {:.1}s",
            run_id,
            status.to_db_string(),
            totals.processed,
            totals.success,
            totals.failed,
            batches,
            elapsed.as_secs_f64()
        );

        Ok(RunSummary {
            run_id,
            claim_token: token,
            status,
            batches,
            totals,
            elapsed,
        })
    }

    /// Returns `Ok(true)` when the loop stopped because of cancellation
    async fn drive(
        &self,
        token: &ClaimToken,
        cancel: &CancellationToken,
        totals: &mut BatchSummary,
        batches: &mut u64,
    ) -> Result<bool, WarmerError> {
        self.prepare_queue()?;

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Run cancelled, stopping before next batch");
                return Ok(true);
            }

            let take = match self.remaining(totals) {
                Some(0) => return Ok(false),
                Some(remaining) => remaining.min(self.options.batch_size as u64) as usize,
                None => self.options.batch_size,
            };

            let items = {
                let mut store = lock_store(&self.store)?;
                claim_batch(&mut *store, token, take, self.options.ignore_delay)?
            };

            if items.is_empty() {
                tracing::info!("No eligible items left in the queue");
                return Ok(false);
            }

            let summary = self.executor.execute_batch(&self.store, items).await?;
            *totals += summary;
            *batches += 1;

            if self.remaining(totals) == Some(0) {
                tracing::info!("Reached limit of {} item(s)", totals.processed);
                return Ok(false);
            }

            if !self.options.sleep.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.options.sleep) => {}
                    _ = cancel.cancelled() => {
                        tracing::info!("Run cancelled during pause");
                        return Ok(true);
                    }
                }
            }
        }
    }

    fn check_options(&self) -> Result<(), ConfigError> {
        if self.options.batch_size == 0 {
            return Err(ConfigError::Validation(
                "batch_size must be >= 1".to_string(),
            ));
        }

        if let Some(stale_after) = self.options.stale_claim_after {
            if stale_after <= self.executor.timeout() {
                return Err(ConfigError::Validation(format!(
                    "stale claim threshold {:?} must exceed the request timeout {:?}",
                    stale_after,
                    self.executor.timeout()
                )));
            }
        }

        Ok(())
    }

    fn remaining(&self, totals: &BatchSummary) -> Option<u64> {
        self.options
            .limit
            .map(|limit| limit.saturating_sub(totals.processed))
    }

    fn prepare_queue(&self) -> Result<(), WarmerError> {
        let mut store = lock_store(&self.store)?;

        if let Some(stale_after) = self.options.stale_claim_after {
            release_stale_claims(&mut *store, stale_after)?;
        }
        requeue_failed(&mut *store, &self.options.retry)?;

        Ok(())
    }
}
