//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Site-Harvester database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track batch runs and their aggregate metrics
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    succeeded INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    pages INTEGER NOT NULL DEFAULT 0,
    bytes INTEGER NOT NULL DEFAULT 0,
    http_pages INTEGER NOT NULL DEFAULT 0,
    browser_pages INTEGER NOT NULL DEFAULT 0
);

-- Businesses to enrich
CREATE TABLE IF NOT EXISTS businesses (
    id TEXT PRIMARY KEY,
    website TEXT,
    known_phones TEXT NOT NULL DEFAULT '[]',
    attributes TEXT NOT NULL DEFAULT '{}',
    crawl_success INTEGER,
    last_crawled_at TEXT
);

-- Crawl history, one row per business crawl
CREATE TABLE IF NOT EXISTS crawls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    business_id TEXT NOT NULL REFERENCES businesses(id),
    run_id INTEGER REFERENCES runs(id),
    raw_blob TEXT,
    extracted_blob TEXT,
    method TEXT,
    page_count INTEGER NOT NULL,
    byte_count INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL,
    success INTEGER NOT NULL,
    state TEXT NOT NULL,
    error TEXT,
    crawled_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawls_business ON crawls(business_id);
CREATE INDEX IF NOT EXISTS idx_crawls_run ON crawls(run_id);
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

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "businesses", "crawls"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
