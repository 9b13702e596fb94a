//! JSON blob store for raw pages and extracted data

use crate::storage::traits::{StorageError, StorageResult};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Length of the content hash prefix embedded in blob file names
const HASH_PREFIX_LEN: usize = 12;

/// Which document of a business crawl a blob holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    /// Every harvested page with markup
    Raw,
    /// Structured extraction output
    Extracted,
}

impl BlobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Extracted => "extracted",
        }
    }
}

/// Persists JSON documents and hands back pointers to them
pub trait BlobStore: Send + Sync {
    /// Writes a document and returns its pointer
    fn put(&self, business_id: &str, kind: BlobKind, bytes: &[u8]) -> StorageResult<String>;

    /// Reads a document back by pointer
    fn get(&self, pointer: &str) -> StorageResult<Vec<u8>>;
}

/// Blob store backed by a directory tree
///
/// Documents land at `<root>/<business>/<timestamp>-<sha256 prefix>-<kind>.json`;
/// the pointer is the path relative to `root`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, pointer: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(pointer);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if pointer.is_empty() || escapes {
            return Err(StorageError::BlobNotFound(pointer.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

/// Makes a business id safe to use as a single directory name
fn sanitize_segment(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, business_id: &str, kind: BlobKind, bytes: &[u8]) -> StorageResult<String> {
        let digest = hex::encode(Sha256::digest(bytes));
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        let dir = sanitize_segment(business_id);
        let file = format!(
            "{}-{}-{}.json",
            timestamp,
            &digest[..HASH_PREFIX_LEN],
            kind.as_str()
        );

        fs::create_dir_all(self.root.join(&dir))?;
        fs::write(self.root.join(&dir).join(&file), bytes)?;

        Ok(format!("{}/{}", dir, file))
    }

    fn get(&self, pointer: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(pointer)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::BlobNotFound(pointer.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
