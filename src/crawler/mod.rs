//! Crawler module for business website harvesting
//!
//! This module contains the core crawling logic, including:
//! - Two-tier fetching (HTTP client, pooled headless browser) with retries
//! - HTML parsing and link extraction
//! - Per-site frontier and crawl state machine with early exit
//! - Credential rotation and rate limiting
//! - Batch coordination across businesses

mod browser;
mod coordinator;
mod fetcher;
mod frontier;
mod page;
mod parser;
mod pool;
mod rate_limiter;
mod site;

pub use browser::{has_challenge_marker, render, ChromiumFactory, RenderedPage, CHALLENGE_MARKERS};
pub use coordinator::{
    is_eligible, matches_filters, matches_rule, run_batch, BatchOptions, Coordinator,
};
pub use fetcher::{build_http_client, needs_rendering, retry_policy, Fetcher, PageFetcher};
pub use frontier::{Frontier, QueuedUrl};
pub use page::{FetchMethod, Page};
pub use parser::{parse_html, ParsedPage};
pub use pool::{BrowserSession, PagePool, PooledSession, SessionFactory};
pub use rate_limiter::{credential_quota, Credential, KeyRotator, DIRECT_CREDENTIAL};
pub use site::{failure_delay, CrawlFailure, EarlyExit, SiteCrawl, SiteCrawler};
