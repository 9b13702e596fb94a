//! Storage traits and error types
//!
//! This module defines the trait interface for the business record store and
//! associated error types.

use crate::output::RunMetrics;
use crate::storage::{BusinessRecord, CrawlRecord, RunRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Business not found: {0}")]
    BusinessNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for business record store implementations
///
/// Callers share one store across concurrent crawls behind a mutex; every
/// method is a short, self-contained statement or transaction.
pub trait Storage {
    // ===== Businesses =====

    /// Inserts a business or replaces its identity fields
    ///
    /// Crawl status columns are left untouched on update.
    fn upsert_business(&mut self, business: &BusinessRecord) -> StorageResult<()>;

    /// Gets a business by ID
    fn get_business(&self, id: &str) -> StorageResult<Option<BusinessRecord>>;

    /// Lists every business, ordered by ID
    fn list_businesses(&self) -> StorageResult<Vec<BusinessRecord>>;

    // ===== Crawls =====

    /// Records the outcome of a business crawl
    ///
    /// Appends to the crawl history and updates the business's crawl status
    /// in one transaction.
    ///
    /// # Arguments
    ///
    /// * `business_id` - The business that was crawled
    /// * `run_id` - The run the crawl belonged to
    /// * `crawl` - Pointers, counters and outcome
    fn record_crawl(
        &mut self,
        business_id: &str,
        run_id: Option<i64>,
        crawl: &CrawlRecord,
    ) -> StorageResult<()>;

    /// Gets the most recent crawl of a business
    fn latest_crawl(&self, business_id: &str) -> StorageResult<Option<CrawlRecord>>;

    // ===== Runs =====

    /// Creates a new batch run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run as completed and stores its aggregate metrics
    fn complete_run(&mut self, run_id: i64, metrics: &RunMetrics) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Statistics =====

    /// Counts stored businesses
    fn count_businesses(&self) -> StorageResult<u64>;

    /// Counts businesses whose latest crawl succeeded
    fn count_crawled(&self) -> StorageResult<u64>;

    /// Counts businesses whose latest crawl failed
    fn count_failed(&self) -> StorageResult<u64>;
}
