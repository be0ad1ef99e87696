//! Status reporting: read-only view of the queue

use crate::state::ItemStatus;
use crate::storage::{QueueStore, StorageResult};
use std::collections::HashMap;

/// Point-in-time snapshot of the queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    /// Item count per status; every status is present, possibly with zero
    pub counts: HashMap<ItemStatus, u64>,

    /// Next pending URLs, in the order a claimer would take them
    pub sample: Vec<String>,
}

impl QueueStatus {
    pub fn count(&self, status: ItemStatus) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Loads queue counts and a sample of up to `sample_size` pending URLs
///
/// Counts and sample are read separately and are not a single consistent
/// snapshot while workers are running.
pub fn get_status(store: &dyn QueueStore, sample_size: usize) -> StorageResult<QueueStatus> {
    let mut counts = store.count_by_status()?;
    for status in ItemStatus::ALL {
        counts.entry(status).or_insert(0);
    }

    let sample = if sample_size > 0 {
        store.sample_pending(sample_size)?
    } else {
        Vec::new()
    };

    Ok(QueueStatus { counts, sample })
}
