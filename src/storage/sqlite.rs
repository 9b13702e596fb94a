//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::output::RunMetrics;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{BusinessRecord, CrawlRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const BUSINESS_COLUMNS: &str =
    "id, website, known_phones, attributes, crawl_success, last_crawled_at";

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, processed, \
     succeeded, failed, skipped, pages, bytes, http_pages, browser_pages";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
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

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Maps a `businesses` row; JSON columns are decoded by the caller
fn business_from_row(row: &Row<'_>) -> rusqlite::Result<(BusinessRecord, String, String)> {
    let business = BusinessRecord {
        id: row.get(0)?,
        website: row.get(1)?,
        known_phones: Vec::new(),
        attributes: Default::default(),
        crawl_success: row.get(4)?,
        last_crawled_at: row.get(5)?,
    };
    Ok((business, row.get(2)?, row.get(3)?))
}

fn decode_business(
    (mut business, phones, attributes): (BusinessRecord, String, String),
) -> StorageResult<BusinessRecord> {
    business.known_phones = serde_json::from_str(&phones)?;
    business.attributes = serde_json::from_str(&attributes)?;
    Ok(business)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let count = |i: usize| -> rusqlite::Result<u64> { Ok(row.get::<_, i64>(i)? as u64) };

    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
        processed: count(5)?,
        succeeded: count(6)?,
        failed: count(7)?,
        skipped: count(8)?,
        pages: count(9)?,
        bytes: count(10)?,
        http_pages: count(11)?,
        browser_pages: count(12)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Businesses =====

    fn upsert_business(&mut self, business: &BusinessRecord) -> StorageResult<()> {
        let phones = serde_json::to_string(&business.known_phones)?;
        let attributes = serde_json::to_string(&business.attributes)?;

        self.conn.execute(
            "INSERT INTO businesses (id, website, known_phones, attributes)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                website = excluded.website,
                known_phones = excluded.known_phones,
                attributes = excluded.attributes",
            params![business.id, business.website, phones, attributes],
        )?;
        Ok(())
    }

    fn get_business(&self, id: &str) -> StorageResult<Option<BusinessRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM businesses WHERE id = ?1", BUSINESS_COLUMNS),
                params![id],
                business_from_row,
            )
            .optional()?;

        row.map(decode_business).transpose()
    }

    fn list_businesses(&self) -> StorageResult<Vec<BusinessRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM businesses ORDER BY id",
            BUSINESS_COLUMNS
        ))?;

        let rows = stmt
            .query_map([], business_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode_business).collect()
    }

    // ===== Crawls =====

    fn record_crawl(
        &mut self,
        business_id: &str,
        run_id: Option<i64>,
        crawl: &CrawlRecord,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE businesses SET crawl_success = ?1, last_crawled_at = ?2 WHERE id = ?3",
            params![crawl.success, crawl.crawled_at, business_id],
        )?;
        if updated == 0 {
            return Err(StorageError::BusinessNotFound(business_id.to_string()));
        }

        tx.execute(
            "INSERT INTO crawls (business_id, run_id, raw_blob, extracted_blob, method,
                page_count, byte_count, duration_ms, success, state, error, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                business_id,
                run_id,
                crawl.raw_blob,
                crawl.extracted_blob,
                crawl.method,
                crawl.page_count as i64,
                crawl.byte_count as i64,
                crawl.duration_ms as i64,
                crawl.success,
                crawl.state,
                crawl.error,
                crawl.crawled_at,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn latest_crawl(&self, business_id: &str) -> StorageResult<Option<CrawlRecord>> {
        let crawl = self
            .conn
            .query_row(
                "SELECT raw_blob, extracted_blob, method, page_count, byte_count, duration_ms,
                    success, state, error, crawled_at
                 FROM crawls WHERE business_id = ?1 ORDER BY id DESC LIMIT 1",
                params![business_id],
                |row| {
                    Ok(CrawlRecord {
                        raw_blob: row.get(0)?,
                        extracted_blob: row.get(1)?,
                        method: row.get(2)?,
                        page_count: row.get::<_, i64>(3)? as u64,
                        byte_count: row.get::<_, i64>(4)? as u64,
                        duration_ms: row.get::<_, i64>(5)? as u64,
                        success: row.get(6)?,
                        state: row.get(7)?,
                        error: row.get(8)?,
                        crawled_at: row.get(9)?,
                    })
                },
            )
            .optional()?;

        Ok(crawl)
    }

    // ===== Runs =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(&mut self, run_id: i64, metrics: &RunMetrics) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, processed = ?3, succeeded = ?4,
                failed = ?5, skipped = ?6, pages = ?7, bytes = ?8, http_pages = ?9,
                browser_pages = ?10
             WHERE id = ?11",
            params![
                RunStatus::Completed.to_db_string(),
                now,
                metrics.processed as i64,
                metrics.succeeded as i64,
                metrics.failed as i64,
                metrics.skipped as i64,
                metrics.pages as i64,
                metrics.bytes as i64,
                metrics.http_pages as i64,
                metrics.browser_pages as i64,
                run_id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    // ===== Statistics =====

    fn count_businesses(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM businesses")
    }

    fn count_crawled(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM businesses WHERE crawl_success = 1")
    }

    fn count_failed(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM businesses WHERE crawl_success = 0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawl(success: bool, pages: u64) -> CrawlRecord {
        CrawlRecord {
            raw_blob: Some("b1/raw.json".to_string()),
            extracted_blob: Some("b1/extracted.json".to_string()),
            method: Some("http".to_string()),
            page_count: pages,
            byte_count: pages * 1000,
            duration_ms: 1200,
            success,
            state: "exhausted".to_string(),
            error: None,
            crawled_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::new_in_memory().is_ok());
    }

    #[test]
    fn test_upsert_and_get_business() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        let mut business = BusinessRecord::new("b1", Some("https://acme.com"));
        business.known_phones = vec!["3039341180".to_string()];
        business
            .attributes
            .insert("industry".to_string(), "roofing".to_string());
        storage.upsert_business(&business).unwrap();

        let loaded = storage.get_business("b1").unwrap().unwrap();
        assert_eq!(loaded, business);
        assert_eq!(storage.get_business("missing").unwrap(), None);
    }

    #[test]
    fn test_upsert_preserves_crawl_status() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let business = BusinessRecord::new("b1", Some("https://acme.com"));
        storage.upsert_business(&business).unwrap();
        storage.record_crawl("b1", None, &crawl(true, 3)).unwrap();

        let renamed = BusinessRecord::new("b1", Some("https://acme-roofing.com"));
        storage.upsert_business(&renamed).unwrap();

        let loaded = storage.get_business("b1").unwrap().unwrap();
        assert_eq!(loaded.website.as_deref(), Some("https://acme-roofing.com"));
        assert_eq!(loaded.crawl_success, Some(true));
    }

    #[test]
    fn test_list_businesses_ordered() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        for id in ["c", "a", "b"] {
            storage
                .upsert_business(&BusinessRecord::new(id, None))
                .unwrap();
        }

        let ids: Vec<String> = storage
            .list_businesses()
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_record_crawl_updates_status_and_history() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_business(&BusinessRecord::new("b1", Some("https://acme.com")))
            .unwrap();
        storage
            .upsert_business(&BusinessRecord::new("b2", Some("https://beta.com")))
            .unwrap();
        let run_id = storage.create_run("hash").unwrap();

        storage.record_crawl("b1", Some(run_id), &crawl(false, 0)).unwrap();
        storage.record_crawl("b1", Some(run_id), &crawl(true, 4)).unwrap();
        storage.record_crawl("b2", Some(run_id), &crawl(false, 0)).unwrap();

        let latest = storage.latest_crawl("b1").unwrap().unwrap();
        assert!(latest.success);
        assert_eq!(latest.page_count, 4);
        assert_eq!(latest.byte_count, 4000);

        assert_eq!(storage.count_businesses().unwrap(), 2);
        assert_eq!(storage.count_crawled().unwrap(), 1);
        assert_eq!(storage.count_failed().unwrap(), 1);
    }

    #[test]
    fn test_record_crawl_unknown_business() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let err = storage.record_crawl("ghost", None, &crawl(true, 1)).unwrap_err();
        assert!(matches!(err, StorageError::BusinessNotFound(id) if id == "ghost"));
        assert_eq!(storage.latest_crawl("ghost").unwrap(), None);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.get_latest_run().unwrap(), None);

        let run_id = storage.create_run("abc123").unwrap();
        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.finished_at, None);

        let metrics = RunMetrics {
            processed: 5,
            succeeded: 4,
            failed: 1,
            skipped: 2,
            pages: 17,
            bytes: 120_000,
            http_pages: 15,
            browser_pages: 2,
        };
        storage.complete_run(run_id, &metrics).unwrap();

        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
        assert_eq!(run.config_hash, "abc123");
        assert_eq!(run.processed, 5);
        assert_eq!(run.browser_pages, 2);

        assert!(matches!(
            storage.complete_run(999, &metrics),
            Err(StorageError::RunNotFound(999))
        ));
        assert!(matches!(storage.get_run(999), Err(StorageError::RunNotFound(999))));
    }
}
