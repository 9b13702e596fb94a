use super::error::{CrawlError, ErrorKind};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct Histograms {
    by_kind: BTreeMap<ErrorKind, u64>,
    by_code: BTreeMap<String, u64>,
    total: u64,
}

/// Run-wide failure histogram for end-of-run reporting
#[derive(Debug, Default)]
pub struct FailureTracker {
    inner: Mutex<Histograms>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one classified failure
    pub fn record(&self, error: &CrawlError) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.total += 1;
        *inner.by_kind.entry(error.kind).or_insert(0) += 1;
        *inner.by_code.entry(error.diagnostic_key()).or_insert(0) += 1;
    }

    pub fn total(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total
    }

    /// Failure counts per error kind
    pub fn by_kind(&self) -> BTreeMap<ErrorKind, u64> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_kind
            .clone()
    }

    /// Failure counts per transport code or HTTP status
    pub fn by_code(&self) -> BTreeMap<String, u64> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_code
            .clone()
    }
}
