//! Batch orchestration
//!
//! This module runs one batch of business crawls:
//! - Selecting eligible businesses from the record store
//! - Starting the browser tier, or falling back to fast mode
//! - Crawling businesses in fixed-size concurrent chunks
//! - Extracting signals and persisting raw and extracted payloads
//! - Accumulating run metrics and building the end-of-run summary

use crate::config::{BatchConfig, Config, FilterOp, FilterRule};
use crate::crawler::browser::ChromiumFactory;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::page::Page;
use crate::crawler::pool::{PagePool, SessionFactory};
use crate::crawler::rate_limiter::KeyRotator;
use crate::crawler::site::{CrawlFailure, EarlyExit, SiteCrawl, SiteCrawler};
use crate::extract::extract_all;
use crate::output::{RunMetrics, RunSummary};
use crate::state::{CrawlState, DomainHealthTracker, FailureTracker};
use crate::storage::{
    BlobKind, BlobStore, BusinessRecord, CrawlRecord, FsBlobStore, SqliteStorage, Storage,
};
use crate::url::{normalize_url, registrable_domain};
use crate::HarvestError;
use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Per-invocation overrides of the `[batch]` settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Restrict the run to these business ids; empty means every business
    pub ids: Vec<String>,

    /// Crawl again even if the last crawl succeeded
    pub force_recrawl: bool,

    /// Disable the browser tier for this run
    pub fast_mode: bool,
}

/// Raw pages document persisted for every successful crawl
#[derive(Serialize)]
struct RawDocument<'a> {
    business_id: &'a str,
    seed: &'a str,
    domain: &'a str,
    state: CrawlState,
    duration_ms: u64,
    pages: &'a [Page],
    failures: &'a [CrawlFailure],
}

/// Result of handling one business
enum BusinessOutcome {
    Crawled(SiteCrawl),
    Skipped,
}

/// Returns true if a business satisfies one filter rule
///
/// Comparisons are ASCII case-insensitive. An empty field counts as missing.
pub fn matches_rule(business: &BusinessRecord, rule: &FilterRule) -> bool {
    let field = business.field(&rule.field).filter(|v| !v.trim().is_empty());
    let value = rule.value.as_deref().unwrap_or_default();

    match rule.op {
        FilterOp::Equals => field.is_some_and(|f| f.eq_ignore_ascii_case(value)),
        FilterOp::NotEquals => !field.is_some_and(|f| f.eq_ignore_ascii_case(value)),
        FilterOp::Contains => {
            field.is_some_and(|f| f.to_lowercase().contains(&value.to_lowercase()))
        }
        FilterOp::Exists => field.is_some(),
        FilterOp::Missing => field.is_none(),
    }
}

/// Returns true if a business satisfies every filter rule
pub fn matches_filters(business: &BusinessRecord, filters: &[FilterRule]) -> bool {
    filters.iter().all(|rule| matches_rule(business, rule))
}

/// Returns true if a business should be crawled in this run
///
/// # Arguments
///
/// * `business` - Candidate business
/// * `batch` - Skip and filter settings
/// * `force_recrawl` - Overrides `skip-if-crawled`
pub fn is_eligible(business: &BusinessRecord, batch: &BatchConfig, force_recrawl: bool) -> bool {
    let has_website = business
        .website
        .as_deref()
        .is_some_and(|w| !w.trim().is_empty());
    if !has_website {
        return false;
    }

    if batch.skip_if_crawled && !force_recrawl && business.crawl_success == Some(true) {
        return false;
    }

    matches_filters(business, &batch.filters)
}

/// Main batch coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    blobs: Arc<dyn BlobStore>,
    config_hash: String,
    options: BatchOptions,
    session_factory: Option<Arc<dyn SessionFactory>>,
}

impl Coordinator {
    /// Creates a coordinator over the stores named in the config
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    /// * `options` - Command-line overrides
    pub fn new(
        config: Config,
        config_hash: String,
        options: BatchOptions,
    ) -> Result<Self, HarvestError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let blobs = Arc::new(FsBlobStore::new(&config.output.blob_dir));
        Ok(Self::with_stores(config, config_hash, options, storage, blobs))
    }

    /// Creates a coordinator over explicit stores
    pub fn with_stores(
        config: Config,
        config_hash: String,
        options: BatchOptions,
        storage: SqliteStorage,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            blobs,
            config_hash,
            options,
            session_factory: None,
        }
    }

    /// Uses `factory` for browser sessions instead of launching Chromium
    pub fn with_session_factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
        self.session_factory = Some(factory);
        self
    }

    /// Shared handle to the business record store
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    fn lock_storage(&self) -> MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fast_mode(&self) -> bool {
        self.options.fast_mode || self.config.batch.fast_mode || !self.config.browser.enabled
    }

    /// Lists the businesses this run would crawl, ordered by id
    pub fn eligible_businesses(&self) -> Result<Vec<BusinessRecord>, HarvestError> {
        let storage = self.lock_storage();

        let candidates = if self.options.ids.is_empty() {
            storage.list_businesses()?
        } else {
            let mut found = Vec::with_capacity(self.options.ids.len());
            for id in &self.options.ids {
                match storage.get_business(id)? {
                    Some(business) => found.push(business),
                    None => tracing::warn!("Business {} not found, ignoring", id),
                }
            }
            found.sort_by(|a, b| a.id.cmp(&b.id));
            found.dedup_by(|a, b| a.id == b.id);
            found
        };

        let force = self.options.force_recrawl || self.config.batch.force_recrawl;
        Ok(candidates
            .into_iter()
            .filter(|b| is_eligible(b, &self.config.batch, force))
            .collect())
    }

    /// Starts the browser tier unless the run is in fast mode
    ///
    /// A browser that fails to launch puts the whole run in fast mode.
    async fn start_browser_tier(&self) -> Option<Arc<PagePool>> {
        if self.fast_mode() {
            tracing::info!("Browser tier disabled, running in fast mode");
            return None;
        }

        let factory: Arc<dyn SessionFactory> = match &self.session_factory {
            Some(factory) => Arc::clone(factory),
            None => {
                match ChromiumFactory::launch(&self.config.browser, &self.config.fetch.user_agent)
                    .await
                {
                    Ok(factory) => Arc::new(factory),
                    Err(e) => {
                        tracing::warn!("Browser launch failed ({}), falling back to fast mode", e);
                        return None;
                    }
                }
            }
        };

        Some(Arc::new(PagePool::new(
            factory,
            self.config.browser.max_sessions as usize,
            Duration::from_secs(self.config.browser.acquire_timeout_secs),
        )))
    }

    /// Runs the batch and returns the end-of-run summary
    ///
    /// A business whose processing fails or panics is logged and counted as
    /// failed; the batch continues.
    pub async fn run(&self) -> Result<RunSummary, HarvestError> {
        let businesses = self.eligible_businesses()?;
        let run_id = self.lock_storage().create_run(&self.config_hash)?;

        tracing::info!(
            "Starting run {}: {} eligible business(es)",
            run_id,
            businesses.len()
        );

        // Trackers and buckets are scoped to this run
        let health = Arc::new(DomainHealthTracker::new());
        let failures = Arc::new(FailureTracker::new());
        let rotator = Arc::new(KeyRotator::from_config(&self.config.rate_limit));

        let mut fetcher = Fetcher::new(
            self.config.fetch.clone(),
            self.config.browser.clone(),
            rotator,
            Arc::clone(&health),
            Arc::clone(&failures),
        )?;

        let pool = self.start_browser_tier().await;
        let fast_mode = pool.is_none();
        if let Some(pool) = &pool {
            fetcher = fetcher.with_pool(Arc::clone(pool));
        }

        let crawler = SiteCrawler::new(
            self.config.crawler.clone(),
            EarlyExit::from_config(&self.config.early_exit),
            Arc::new(fetcher),
        );

        let mut metrics = RunMetrics::default();
        let chunk_size = (self.config.crawler.max_concurrent_crawls as usize).max(1);
        let chunk_count = businesses.len().div_ceil(chunk_size);

        for (index, chunk) in businesses.chunks(chunk_size).enumerate() {
            tracing::info!(
                "Batch {}/{}: crawling {} business(es)",
                index + 1,
                chunk_count,
                chunk.len()
            );

            let tasks = chunk.iter().map(|business| {
                AssertUnwindSafe(self.process_business(business, run_id, &crawler, &health))
                    .catch_unwind()
            });
            let results = join_all(tasks).await;

            for (business, result) in chunk.iter().zip(results) {
                match result {
                    Ok(Ok(BusinessOutcome::Crawled(crawl))) => metrics.record_crawl(&crawl),
                    Ok(Ok(BusinessOutcome::Skipped)) => metrics.record_skip(),
                    Ok(Err(e)) => {
                        tracing::error!("Business {} failed: {}", business.id, e);
                        metrics.record_failure();
                    }
                    Err(_) => {
                        tracing::error!("Business {} panicked during processing", business.id);
                        metrics.record_failure();
                    }
                }
            }
        }

        if let Some(pool) = pool {
            pool.shutdown().await;
        }

        let run = {
            let mut storage = self.lock_storage();
            storage.complete_run(run_id, &metrics)?;
            storage.get_run(run_id)?
        };

        tracing::info!(
            "Run {} completed: {} processed, {} succeeded, {} failed, {} skipped",
            run_id,
            metrics.processed,
            metrics.succeeded,
            metrics.failed,
            metrics.skipped
        );

        let mut summary = RunSummary::collect(&run, metrics, &failures, &health);
        summary.fast_mode = fast_mode;
        Ok(summary)
    }

    /// Crawls, extracts and persists one business
    async fn process_business(
        &self,
        business: &BusinessRecord,
        run_id: i64,
        crawler: &SiteCrawler,
        health: &DomainHealthTracker,
    ) -> Result<BusinessOutcome, HarvestError> {
        let website = business.website.as_deref().unwrap_or_default();

        if let Some(domain) = normalize_url(website)
            .ok()
            .and_then(|u| u.host_str().map(registrable_domain))
        {
            let crawler_config = &self.config.crawler;
            if health.should_skip_domain(
                &domain,
                crawler_config.domain_skip_min_attempts,
                crawler_config.domain_skip_min_success_rate,
            ) {
                tracing::info!(
                    "Skipping business {}: domain {} is failing ({:.0}% success)",
                    business.id,
                    domain,
                    health.success_rate(&domain) * 100.0
                );
                return Ok(BusinessOutcome::Skipped);
            }
        }

        tracing::info!("Crawling business {} ({})", business.id, website);

        let crawl = match crawler.crawl(website).await {
            Ok(crawl) => crawl,
            Err(e) => {
                let record = CrawlRecord {
                    raw_blob: None,
                    extracted_blob: None,
                    method: None,
                    page_count: 0,
                    byte_count: 0,
                    duration_ms: 0,
                    success: false,
                    state: CrawlState::Abandoned.to_db_string().to_string(),
                    error: Some(e.to_string()),
                    crawled_at: Utc::now().to_rfc3339(),
                };
                self.lock_storage()
                    .record_crawl(&business.id, Some(run_id), &record)?;
                return Err(e.into());
            }
        };

        let (raw_blob, extracted_blob) = if crawl.is_success() {
            let extracted = extract_all(&crawl.pages, &business.known_phones);
            tracing::debug!(
                "Business {}: {} signal group(s) extracted",
                business.id,
                extracted.signal_count()
            );

            let raw = RawDocument {
                business_id: &business.id,
                seed: &crawl.seed,
                domain: &crawl.domain,
                state: crawl.state,
                duration_ms: crawl.duration.as_millis() as u64,
                pages: &crawl.pages,
                failures: &crawl.failures,
            };

            let raw_blob =
                self.blobs
                    .put(&business.id, BlobKind::Raw, &serde_json::to_vec(&raw)?)?;
            let extracted_blob = self.blobs.put(
                &business.id,
                BlobKind::Extracted,
                &serde_json::to_vec(&extracted)?,
            )?;
            (Some(raw_blob), Some(extracted_blob))
        } else {
            (None, None)
        };

        let record = CrawlRecord {
            raw_blob,
            extracted_blob,
            method: crawl.is_success().then(|| crawl.method().to_string()),
            page_count: crawl.pages.len() as u64,
            byte_count: crawl.byte_count() as u64,
            duration_ms: crawl.duration.as_millis() as u64,
            success: crawl.is_success(),
            state: crawl.state.to_db_string().to_string(),
            error: crawl.last_error().map(|e| e.to_string()),
            crawled_at: Utc::now().to_rfc3339(),
        };

        self.lock_storage()
            .record_crawl(&business.id, Some(run_id), &record)?;

        tracing::info!(
            "Business {} {}: {} page(s) in {:?} ({})",
            business.id,
            if crawl.is_success() { "crawled" } else { "failed" },
            crawl.pages.len(),
            crawl.duration,
            crawl.state
        );

        Ok(BusinessOutcome::Crawled(crawl))
    }
}

/// Runs one batch against the stores named in the config
///
/// # Example
///
/// ```no_run
/// use site_harvester::config::load_config_with_hash;
/// use site_harvester::crawler::{run_batch, BatchOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let summary = run_batch(config, hash, BatchOptions::default()).await?;
/// println!("{} businesses processed", summary.metrics.processed);
/// # Ok(())
/// # }
/// ```
pub async fn run_batch(
    config: Config,
    config_hash: String,
    options: BatchOptions,
) -> Result<RunSummary, HarvestError> {
    let coordinator = Coordinator::new(config, config_hash, options)?;
    coordinator.run().await
}
