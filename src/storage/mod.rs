//! Storage module for business records, crawl results and run metrics
//!
//! This module handles the persistence handoff at the end of each business
//! crawl:
//! - SQLite business record store with crawl history and run rows
//! - Content-addressed JSON blob store for raw pages and extracted data

mod blob;
mod schema;
mod sqlite;
mod traits;

pub use blob::{BlobKind, BlobStore, FsBlobStore};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Opens (or creates) the business record database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A business known to the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub id: String,

    /// Target website; businesses without one are never crawled
    pub website: Option<String>,

    /// Numbers already on file for the business
    pub known_phones: Vec<String>,

    /// Free-form fields the batch filters can match on
    pub attributes: BTreeMap<String, String>,

    /// Outcome of the most recent crawl, `None` if never crawled
    pub crawl_success: Option<bool>,

    pub last_crawled_at: Option<String>,
}

impl BusinessRecord {
    pub fn new(id: impl Into<String>, website: Option<&str>) -> Self {
        Self {
            id: id.into(),
            website: website.map(str::to_string),
            ..Self::default()
        }
    }

    /// Looks up a field by name for filter evaluation
    ///
    /// `id` and `website` are built-in; anything else is an attribute key.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(self.id.as_str()),
            "website" => self.website.as_deref(),
            other => self.attributes.get(other).map(String::as_str),
        }
    }
}

/// Outcome of one business crawl as written back to the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRecord {
    /// Blob pointer of the raw pages document
    pub raw_blob: Option<String>,

    /// Blob pointer of the extracted data document
    pub extracted_blob: Option<String>,

    /// Fetch tier used (`browser` if any page needed the browser)
    pub method: Option<String>,

    pub page_count: u64,
    pub byte_count: u64,
    pub duration_ms: u64,
    pub success: bool,

    /// Terminal crawl state
    pub state: String,

    pub error: Option<String>,
    pub crawled_at: String,
}

/// A batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub pages: u64,
    pub bytes: u64,
    pub http_pages: u64,
    pub browser_pages: u64,
}

/// Status of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
