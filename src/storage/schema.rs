//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Cache-Warmer database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Work queue of URLs to warm
CREATE TABLE IF NOT EXISTS queue_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    scope_id INTEGER NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    not_before TEXT,
    claim_token TEXT,
    claimed_at TEXT,
    response_code INTEGER,
    duration_ms REAL,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (status IN ('pending', 'processing', 'done', 'failed')),
    CHECK (status <> 'processing' OR claim_token IS NOT NULL),
    CHECK (status <> 'pending' OR claim_token IS NULL),
    CHECK (attempts >= 0)
);

CREATE INDEX IF NOT EXISTS idx_queue_items_claim ON queue_items(status, priority DESC, id);
CREATE INDEX IF NOT EXISTS idx_queue_items_url ON queue_items(url, status);

-- Track warm runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    claim_token TEXT NOT NULL UNIQUE,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    success INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
