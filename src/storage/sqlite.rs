//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the QueueStore trait.

use crate::state::ItemStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{QueueStore, StorageError, StorageResult};
use crate::storage::{
    from_db_timestamp, to_db_timestamp, NewItem, QueueItem, Resolution, RunRecord, RunStatus,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// How long a writer waits for a competing writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ITEM_COLUMNS: &str = "id, url, scope_id, priority, status, attempts, not_before, \
     claim_token, claimed_at, response_code, duration_ms, last_error, created_at, updated_at";

const RUN_COLUMNS: &str =
    "id, claim_token, config_hash, started_at, finished_at, status, processed, success, failed";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Several processes (or threads, each with their own `SqliteStorage`)
    /// may open the same file; WAL mode plus a busy timeout lets their
    /// conditional updates serialize instead of failing.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    ///
    /// The queue lives only as long as this value; useful for one-shot runs and tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    from_db_timestamp(&raw)
        .ok_or_else(|| conversion_error(idx, format!("invalid timestamp '{}'", raw)))
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        from_db_timestamp(&raw)
            .ok_or_else(|| conversion_error(idx, format!("invalid timestamp '{}'", raw)))
    })
    .transpose()
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    let status: String = row.get(4)?;
    Ok(QueueItem {
        id: row.get(0)?,
        url: row.get(1)?,
        scope_id: row.get(2)?,
        priority: row.get(3)?,
        status: ItemStatus::from_db_string(&status)
            .ok_or_else(|| conversion_error(4, format!("unknown status '{}'", status)))?,
        attempts: row.get(5)?,
        not_before: optional_timestamp_at(row, 6)?,
        claim_token: row.get(7)?,
        claimed_at: optional_timestamp_at(row, 8)?,
        response_code: row.get(9)?,
        duration_ms: row.get(10)?,
        last_error: row.get(11)?,
        created_at: timestamp_at(row, 12)?,
        updated_at: timestamp_at(row, 13)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(5)?;
    Ok(RunRecord {
        id: row.get(0)?,
        claim_token: row.get(1)?,
        config_hash: row.get(2)?,
        started_at: timestamp_at(row, 3)?,
        finished_at: optional_timestamp_at(row, 4)?,
        status: RunStatus::from_db_string(&status)
            .ok_or_else(|| conversion_error(5, format!("unknown run status '{}'", status)))?,
        processed: row.get::<_, i64>(6)? as u64,
        success: row.get::<_, i64>(7)? as u64,
        failed: row.get::<_, i64>(8)? as u64,
    })
}

impl QueueStore for SqliteStorage {
    // ===== Items =====

    fn insert_items(&mut self, items: &[NewItem], dedupe: bool) -> StorageResult<usize> {
        let now = to_db_timestamp(Utc::now());
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut inserted = 0;
        {
            let mut active = tx.prepare_cached(
                "SELECT 1 FROM queue_items WHERE url = ?1 AND status IN (?2, ?3) LIMIT 1",
            )?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO queue_items
                 (url, scope_id, priority, status, attempts, not_before, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?6)",
            )?;

            for item in items {
                if dedupe
                    && active.exists(params![
                        item.url,
                        ItemStatus::Pending.to_db_string(),
                        ItemStatus::Processing.to_db_string()
                    ])?
                {
                    continue;
                }

                insert.execute(params![
                    item.url,
                    item.scope_id,
                    item.priority,
                    ItemStatus::Pending.to_db_string(),
                    item.not_before.map(to_db_timestamp),
                    now,
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn get_item(&self, id: i64) -> StorageResult<QueueItem> {
        let sql = format!("SELECT {} FROM queue_items WHERE id = ?1", ITEM_COLUMNS);
        self.conn
            .query_row(&sql, params![id], row_to_item)
            .optional()?
            .ok_or(StorageError::ItemNotFound(id))
    }

    fn select_eligible(
        &self,
        now: DateTime<Utc>,
        ignore_delay: bool,
        limit: usize,
    ) -> StorageResult<Vec<QueueItem>> {
        let sql = format!(
            "SELECT {} FROM queue_items
             WHERE status = ?1 AND (?2 OR not_before IS NULL OR not_before <= ?3)
             ORDER BY priority DESC, id ASC
             LIMIT ?4",
            ITEM_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let items = stmt
            .query_map(
                params![
                    ItemStatus::Pending.to_db_string(),
                    ignore_delay,
                    to_db_timestamp(now),
                    limit as i64
                ],
                row_to_item,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn claim_item(&mut self, id: i64, claim_token: &str) -> StorageResult<bool> {
        let now = to_db_timestamp(Utc::now());
        let changed = self.conn.execute(
            "UPDATE queue_items SET status = ?1, claim_token = ?2, claimed_at = ?3, updated_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                ItemStatus::Processing.to_db_string(),
                claim_token,
                now,
                id,
                ItemStatus::Pending.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn touch_claim(&mut self, id: i64, claim_token: &str) -> StorageResult<bool> {
        let now = to_db_timestamp(Utc::now());
        let changed = self.conn.execute(
            "UPDATE queue_items SET claimed_at = ?1, updated_at = ?1
             WHERE id = ?2 AND status = ?3 AND claim_token = ?4",
            params![now, id, ItemStatus::Processing.to_db_string(), claim_token],
        )?;
        Ok(changed == 1)
    }

    fn resolve_item(
        &mut self,
        id: i64,
        claim_token: &str,
        resolution: &Resolution,
    ) -> StorageResult<bool> {
        debug_assert!(resolution.status.is_terminal());

        let now = to_db_timestamp(Utc::now());
        let changed = self.conn.execute(
            "UPDATE queue_items SET status = ?1, attempts = attempts + 1, response_code = ?2,
             duration_ms = ?3, last_error = ?4, updated_at = ?5,
             claim_token = NULL, claimed_at = NULL
             WHERE id = ?6 AND status = ?7 AND claim_token = ?8",
            params![
                resolution.status.to_db_string(),
                resolution.response_code,
                resolution.duration_ms,
                resolution.last_error,
                now,
                id,
                ItemStatus::Processing.to_db_string(),
                claim_token
            ],
        )?;
        Ok(changed == 1)
    }

    fn delete_active(&mut self) -> StorageResult<u64> {
        let deleted = self.conn.execute(
            "DELETE FROM queue_items WHERE status IN (?1, ?2)",
            params![
                ItemStatus::Pending.to_db_string(),
                ItemStatus::Processing.to_db_string()
            ],
        )?;
        Ok(deleted as u64)
    }

    // ===== Statistics =====

    fn count_by_status(&self) -> StorageResult<HashMap<ItemStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM queue_items GROUP BY status")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })?;

        for row in rows {
            let (status, count) = row?;
            if let Some(status) = ItemStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }

    fn sample_pending(&self, limit: usize) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM queue_items WHERE status = ?1
             ORDER BY priority DESC, id ASC
             LIMIT ?2",
        )?;

        let urls = stmt
            .query_map(
                params![ItemStatus::Pending.to_db_string(), limit as i64],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(urls)
    }

    // ===== Maintenance =====

    fn release_stale_claims(&mut self, claimed_before: DateTime<Utc>) -> StorageResult<u64> {
        let now = to_db_timestamp(Utc::now());
        let released = self.conn.execute(
            "UPDATE queue_items
             SET status = ?1, claim_token = NULL, claimed_at = NULL, updated_at = ?2
             WHERE status = ?3 AND (claimed_at IS NULL OR claimed_at < ?4)",
            params![
                ItemStatus::Pending.to_db_string(),
                now,
                ItemStatus::Processing.to_db_string(),
                to_db_timestamp(claimed_before)
            ],
        )?;
        Ok(released as u64)
    }

    fn requeue_failed(
        &mut self,
        max_attempts: u32,
        not_before: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let now = to_db_timestamp(Utc::now());
        // Only the newest failed row per URL, and never next to an active row for that URL.
        let requeued = self.conn.execute(
            "UPDATE queue_items
             SET status = ?1, claim_token = NULL, claimed_at = NULL,
                 not_before = ?2, updated_at = ?3
             WHERE status = ?4
               AND attempts < ?5
               AND id = (SELECT MAX(f.id) FROM queue_items f
                         WHERE f.url = queue_items.url AND f.status = ?4)
               AND NOT EXISTS (SELECT 1 FROM queue_items a
                               WHERE a.url = queue_items.url AND a.status IN (?1, ?6))",
            params![
                ItemStatus::Pending.to_db_string(),
                to_db_timestamp(not_before),
                now,
                ItemStatus::Failed.to_db_string(),
                max_attempts,
                ItemStatus::Processing.to_db_string()
            ],
        )?;
        Ok(requeued as u64)
    }

    // ===== Run Management =====

    fn create_run(&mut self, claim_token: &str, config_hash: &str) -> StorageResult<i64> {
        let now = to_db_timestamp(Utc::now());
        self.conn.execute(
            "INSERT INTO runs (claim_token, config_hash, started_at, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![claim_token, config_hash, now, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        processed: u64,
        success: u64,
        failed: u64,
    ) -> StorageResult<()> {
        let now = to_db_timestamp(Utc::now());
        let changed = self.conn.execute(
            "UPDATE runs
             SET status = ?1, finished_at = ?2, processed = ?3, success = ?4, failed = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                processed as i64,
                success as i64,
                failed as i64,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], row_to_run)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], row_to_run).optional()?;
        Ok(run)
    }
}
