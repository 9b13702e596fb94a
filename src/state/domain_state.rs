use super::error::{CrawlError, ErrorKind};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Success/failure statistics for one registrable domain
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainStat {
    pub domain: String,

    /// Fetches attempted against this domain
    pub attempted: u64,

    /// Fetches that produced a page
    pub succeeded: u64,

    /// Fetches that ended in a classified failure
    pub failed: u64,

    /// Failure count per error kind
    pub errors: HashMap<ErrorKind, u64>,
}

impl DomainStat {
    /// Creates an empty stat for a domain
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// Returns the fraction of attempts that succeeded, or 1.0 before any attempt
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            1.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }

    /// Returns the fraction of attempts that failed
    pub fn failure_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.failed as f64 / self.attempted as f64
        }
    }

    /// Returns the most frequent error kind seen for this domain
    pub fn dominant_error(&self) -> Option<ErrorKind> {
        self.errors
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(kind, _)| *kind)
    }
}

/// Run-scoped per-domain health statistics
///
/// Shared by all crawls of a batch run. Appends from concurrent crawls are
/// serialized through a single mutex, so no update is lost.
#[derive(Debug, Default)]
pub struct DomainHealthTracker {
    stats: Mutex<HashMap<String, DomainStat>>,
}

impl DomainHealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one fetch against a domain
    ///
    /// # Arguments
    ///
    /// * `domain` - Registrable domain the fetch targeted
    /// * `outcome` - `Ok(())` for a produced page, or the classified failure
    pub fn record(&self, domain: &str, outcome: Result<(), &CrawlError>) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let stat = stats
            .entry(domain.to_string())
            .or_insert_with(|| DomainStat::new(domain));

        stat.attempted += 1;
        match outcome {
            Ok(()) => stat.succeeded += 1,
            Err(err) => {
                stat.failed += 1;
                *stat.errors.entry(err.kind).or_insert(0) += 1;
            }
        }
    }

    /// Returns the success rate for a domain (1.0 for an unseen domain)
    pub fn success_rate(&self, domain: &str) -> f64 {
        self.stat(domain).map(|s| s.success_rate()).unwrap_or(1.0)
    }

    /// Returns true if further requests to the domain look futile
    ///
    /// Only fires once at least `min_attempts` fetches have been observed, so a
    /// single early failure never trips the breaker.
    ///
    /// # Arguments
    ///
    /// * `domain` - Registrable domain to check
    /// * `min_attempts` - Sample size required before judging
    /// * `min_rate` - Success rate below which the domain is skipped
    pub fn should_skip_domain(&self, domain: &str, min_attempts: u64, min_rate: f64) -> bool {
        match self.stat(domain) {
            Some(stat) => stat.attempted >= min_attempts && stat.success_rate() < min_rate,
            None => false,
        }
    }

    /// Returns a snapshot of one domain's statistics
    pub fn stat(&self, domain: &str) -> Option<DomainStat> {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.get(domain).cloned()
    }

    /// Returns the `limit` domains with the highest failure rate
    ///
    /// Domains without failures are excluded. Ties are broken by failure
    /// count, then by domain name.
    pub fn worst_domains(&self, limit: usize) -> Vec<DomainStat> {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let mut worst: Vec<DomainStat> = stats.values().filter(|s| s.failed > 0).cloned().collect();
        drop(stats);

        worst.sort_by(|a, b| {
            b.failure_rate()
                .total_cmp(&a.failure_rate())
                .then_with(|| b.failed.cmp(&a.failed))
                .then_with(|| a.domain.cmp(&b.domain))
        });
        worst.truncate(limit);
        worst
    }

    /// Number of distinct domains observed
    pub fn domain_count(&self) -> usize {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
