//! Run metrics and the end-of-run summary

use crate::crawler::{FetchMethod, SiteCrawl};
use crate::state::{DomainHealthTracker, DomainStat, ErrorKind, FailureTracker};
use crate::storage::RunRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of domains listed in the worst-domains section
pub const WORST_DOMAIN_LIMIT: usize = 10;

/// Aggregate counters for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    /// Businesses crawled, successful or not
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,

    /// Businesses passed over by the domain health check
    pub skipped: u64,

    pub pages: u64,
    pub bytes: u64,
    pub http_pages: u64,
    pub browser_pages: u64,
}

impl RunMetrics {
    /// Counts a finished site crawl
    pub fn record_crawl(&mut self, crawl: &SiteCrawl) {
        self.processed += 1;
        if crawl.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }

        self.pages += crawl.pages.len() as u64;
        self.bytes += crawl.byte_count() as u64;
        self.http_pages += crawl.count_by_method(FetchMethod::Http) as u64;
        self.browser_pages += crawl.count_by_method(FetchMethod::Browser) as u64;
    }

    /// Counts a business whose processing broke down before a crawl result existed
    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Percentage of processed businesses that yielded pages
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.processed as f64 * 100.0
        }
    }
}

/// Everything reported at the end of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,

    /// Fetch tier was disabled for the whole run
    pub fast_mode: bool,

    pub metrics: RunMetrics,
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,

    /// Failures keyed by transport code or HTTP status
    pub failures_by_code: BTreeMap<String, u64>,

    /// Domains with the highest failure rates
    pub worst_domains: Vec<DomainStat>,
}

impl RunSummary {
    /// Builds the summary from a finished run row and the run's trackers
    pub fn collect(
        run: &RunRecord,
        metrics: RunMetrics,
        failures: &FailureTracker,
        domains: &DomainHealthTracker,
    ) -> Self {
        Self {
            run_id: run.id,
            started_at: run.started_at.clone(),
            finished_at: run.finished_at.clone(),
            config_hash: run.config_hash.clone(),
            fast_mode: false,
            metrics,
            failures_by_kind: failures.by_kind(),
            failures_by_code: failures.by_code(),
            worst_domains: domains.worst_domains(WORST_DOMAIN_LIMIT),
        }
    }

    pub fn total_failures(&self) -> u64 {
        self.failures_by_kind.values().sum()
    }

    /// Wall-clock duration of the run, when both timestamps parse
    pub fn duration_seconds(&self) -> Option<i64> {
        let started = chrono::DateTime::parse_from_rfc3339(&self.started_at).ok()?;
        let finished = chrono::DateTime::parse_from_rfc3339(self.finished_at.as_deref()?).ok()?;
        Some((finished - started).num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::Page;
    use crate::state::{CrawlError, CrawlState};
    use crate::storage::RunStatus;
    use std::time::Duration;
    use url::Url;

    fn crawl(methods: &[FetchMethod]) -> SiteCrawl {
        let url = "https://acme.com/";
        let pages = methods
            .iter()
            .map(|m| {
                Page::from_html(
                    url,
                    &Url::parse(url).unwrap(),
                    "<p>hello</p>".to_string(),
                    200,
                    *m,
                )
            })
            .collect();

        SiteCrawl {
            seed: url.to_string(),
            domain: "acme.com".to_string(),
            pages,
            failures: Vec::new(),
            state: CrawlState::Exhausted,
            duration: Duration::from_secs(2),
        }
    }

    fn run_record() -> RunRecord {
        RunRecord {
            id: 7,
            started_at: "2025-03-01T10:00:00+00:00".to_string(),
            finished_at: Some("2025-03-01T10:05:30+00:00".to_string()),
            config_hash: "abc".to_string(),
            status: RunStatus::Completed,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            pages: 0,
            bytes: 0,
            http_pages: 0,
            browser_pages: 0,
        }
    }

    #[test]
    fn test_metrics_record_crawl() {
        let mut metrics = RunMetrics::default();
        metrics.record_crawl(&crawl(&[FetchMethod::Http, FetchMethod::Browser]));
        metrics.record_crawl(&crawl(&[]));
        metrics.record_failure();
        metrics.record_skip();

        assert_eq!(metrics.processed, 3);
        assert_eq!(metrics.succeeded, 1);
        assert_eq!(metrics.failed, 2);
        assert_eq!(metrics.skipped, 1);
        assert_eq!(metrics.pages, 2);
        assert_eq!(metrics.http_pages, 1);
        assert_eq!(metrics.browser_pages, 1);
        assert!(metrics.bytes > 0);
    }

    #[test]
    fn test_success_rate() {
        let metrics = RunMetrics {
            processed: 4,
            succeeded: 3,
            ..Default::default()
        };
        assert!((metrics.success_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(RunMetrics::default().success_rate(), 0.0);
    }

    #[test]
    fn test_collect_summary() {
        let failures = FailureTracker::new();
        let domains = DomainHealthTracker::new();

        let timeout = CrawlError::timeout("timed out");
        failures.record(&timeout);
        failures.record(&CrawlError::http_status(404));
        domains.record("slow.com", Err(&timeout));
        domains.record("fine.com", Ok(()));

        let summary = RunSummary::collect(&run_record(), RunMetrics::default(), &failures, &domains);

        assert_eq!(summary.run_id, 7);
        assert_eq!(summary.total_failures(), 2);
        assert_eq!(summary.failures_by_kind.get(&ErrorKind::Timeout), Some(&1));
        assert_eq!(summary.failures_by_kind.get(&ErrorKind::HttpStatus), Some(&1));
        assert_eq!(summary.worst_domains.len(), 1);
        assert_eq!(summary.worst_domains[0].domain, "slow.com");
        assert_eq!(summary.duration_seconds(), Some(330));
    }
}
