//! Storage traits and error types
//!
//! This module defines the trait interface for queue storage backends and
//! associated error types.

use crate::state::ItemStatus;
use crate::storage::{NewItem, QueueItem, Resolution, RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Queue item not found: {0}")]
    ItemNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for queue storage backends
///
/// The store is the only source of truth for item state. All status and
/// claim-token changes go through `insert_items`, `claim_item`,
/// `resolve_item` and the explicit maintenance operations below.
pub trait QueueStore {
    // ===== Items =====

    /// Inserts new pending items
    ///
    /// When `dedupe` is set, a row is skipped if its URL already has a
    /// pending or processing item (including rows inserted earlier in the
    /// same call). Check and insert happen in one transaction.
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted
    fn insert_items(&mut self, items: &[NewItem], dedupe: bool) -> StorageResult<usize>;

    /// Gets an item by ID
    fn get_item(&self, id: i64) -> StorageResult<QueueItem>;

    /// Selects pending items eligible at `now`, ordered by priority desc then id asc
    fn select_eligible(
        &self,
        now: DateTime<Utc>,
        ignore_delay: bool,
        limit: usize,
    ) -> StorageResult<Vec<QueueItem>>;

    /// Conditionally moves an item from pending to processing
    ///
    /// Returns false if the item was no longer pending (another claimer won).
    fn claim_item(&mut self, id: i64, claim_token: &str) -> StorageResult<bool>;

    /// Marks the start of an item's fetch by resetting its `claimed_at`
    ///
    /// Returns false if the item is no longer processing under `claim_token`,
    /// in which case it must not be fetched.
    fn touch_claim(&mut self, id: i64, claim_token: &str) -> StorageResult<bool>;

    /// Writes the terminal outcome of a fetch, increments `attempts` and
    /// clears the claim
    ///
    /// Only applies while the item is still processing under `claim_token`;
    /// returns false otherwise.
    fn resolve_item(
        &mut self,
        id: i64,
        claim_token: &str,
        resolution: &Resolution,
    ) -> StorageResult<bool>;

    /// Deletes every pending or processing item
    fn delete_active(&mut self) -> StorageResult<u64>;

    // ===== Statistics =====

    /// Counts items per status; statuses with no rows may be absent
    fn count_by_status(&self) -> StorageResult<HashMap<ItemStatus, u64>>;

    /// URLs of pending items in claim order
    fn sample_pending(&self, limit: usize) -> StorageResult<Vec<String>>;

    // ===== Maintenance =====

    /// Returns processing items claimed before `claimed_before` to pending
    fn release_stale_claims(&mut self, claimed_before: DateTime<Utc>) -> StorageResult<u64>;

    /// Returns failed items with fewer than `max_attempts` attempts to pending,
    /// eligible again from `not_before`
    fn requeue_failed(&mut self, max_attempts: u32, not_before: DateTime<Utc>)
        -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new run owning `claim_token`
    fn create_run(&mut self, claim_token: &str, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run finished with its final status and totals
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        processed: u64,
        success: u64,
        failed: u64,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;
}

/// Locks a shared store, mapping a poisoned lock to a storage error
pub fn lock_store<S: ?Sized>(store: &Mutex<S>) -> StorageResult<MutexGuard<'_, S>> {
    store.lock().map_err(|_| StorageError::LockPoisoned)
}
