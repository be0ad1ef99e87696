//! Storage module for persisting the warm queue
//!
//! This module handles all database operations for the queue, including:
//! - SQLite database initialization and schema management
//! - Inserting items, with optional dedupe against active rows
//! - Atomic pending -> processing claims
//! - Terminal outcome writes
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{lock_store, QueueStore, StorageError, StorageResult};

use crate::state::ItemStatus;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents a queue item in the database
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: i64,
    pub url: String,
    pub scope_id: i64,
    pub priority: i64,
    pub status: ItemStatus,
    pub attempts: u32,
    pub not_before: Option<DateTime<Utc>>,
    pub claim_token: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub response_code: Option<u16>,
    pub duration_ms: Option<f64>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row to be inserted by the enqueuer
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub url: String,
    pub scope_id: i64,
    pub priority: i64,
    pub not_before: Option<DateTime<Utc>>,
}

/// Terminal outcome written for a claimed item
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Either `Done` or `Failed`
    pub status: ItemStatus,
    pub response_code: Option<u16>,
    pub duration_ms: f64,
    pub last_error: Option<String>,
}

/// Represents a warm run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub claim_token: String,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub processed: u64,
    pub success: u64,
    pub failed: u64,
}

/// Status of a warm run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Formats a timestamp for storage.
///
/// Fixed width (microseconds, `Z` suffix) so that string comparison in SQL
/// orders the same way as the timestamps themselves.
pub(crate) fn to_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
