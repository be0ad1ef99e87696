//! Queue maintenance: recovering orphaned claims and retrying failed items
//!
//! Neither runs implicitly. A driver calls them before it starts claiming.

use crate::storage::{QueueStore, StorageResult};
use chrono::Utc;
use std::time::Duration;

/// Retry policy for failed items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Items that already have this many attempts stay failed; 0 disables retries
    pub max_attempts: u32,

    /// Delay before a requeued item becomes eligible again
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            backoff: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Returns failed items that still have attempts left to pending
///
/// Requeued items keep their attempt count and become eligible after the
/// policy's backoff. A URL that already has a pending or processing item is
/// left alone, and only its newest failed item is considered.
pub fn requeue_failed(store: &mut dyn QueueStore, policy: &RetryPolicy) -> StorageResult<u64> {
    if !policy.is_enabled() {
        return Ok(0);
    }

    let backoff = chrono::Duration::from_std(policy.backoff).unwrap_or(chrono::Duration::zero());
    let requeued = store.requeue_failed(policy.max_attempts, Utc::now() + backoff)?;
    if requeued > 0 {
        tracing::info!(
            "Requeued {} failed item(s) (max attempts {}, backoff {:?})",
            requeued,
            policy.max_attempts,
            policy.backoff
        );
    }
    Ok(requeued)
}

/// Returns items stuck in processing for longer than `stale_after` to pending
///
/// `claimed_at` is renewed when an item's fetch starts, so with `stale_after`
/// above the request timeout only items of an interrupted run qualify. Their
/// claim token is cleared and `attempts` is left unchanged.
pub fn release_stale_claims(
    store: &mut dyn QueueStore,
    stale_after: Duration,
) -> StorageResult<u64> {
    let stale_after = chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::zero());
    let released = store.release_stale_claims(Utc::now() - stale_after)?;
    if released > 0 {
        tracing::warn!(
            "Released {} stale claim(s) older than {}s",
            released,
            stale_after.num_seconds()
        );
    }
    Ok(released)
}
