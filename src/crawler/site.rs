//! Per-business crawl orchestration
//!
//! Drives the frontier loop for one target site, one URL at a time:
//! fetch, record, expand links, evaluate early exit, back off on failure.
//! The crawl moves `Seeded -> Crawling` and ends in exactly one of
//! `EarlyExited`, `Exhausted` or `Abandoned`, always keeping the pages
//! harvested so far.

use super::fetcher::PageFetcher;
use super::frontier::Frontier;
use super::page::{FetchMethod, Page};
use crate::config::{CrawlerConfig, EarlyExitConfig};
use crate::extract::{contains_email, email_haystack};
use crate::state::{CrawlError, CrawlState};
use crate::url::{is_same_site, is_team_page};
use crate::UrlResult;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Criteria for stopping a crawl once enough signal is gathered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarlyExit {
    pub enabled: bool,
    pub min_pages: usize,
    pub require_email: bool,
    pub require_team_page: bool,
}

impl EarlyExit {
    pub fn from_config(config: &EarlyExitConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_pages: config.min_pages as usize,
            require_email: config.require_email,
            require_team_page: config.require_team_page,
        }
    }

    /// Returns true once the harvested pages satisfy every configured criterion
    pub fn is_satisfied(&self, pages: &[Page]) -> bool {
        if !self.enabled || pages.len() < self.min_pages {
            return false;
        }

        if self.require_email
            && !pages
                .iter()
                .any(|p| contains_email(&email_haystack(&p.text, &p.html)))
        {
            return false;
        }

        if self.require_team_page
            && !pages
                .iter()
                .any(|p| Url::parse(&p.url).is_ok_and(|u| is_team_page(&u)))
        {
            return false;
        }

        true
    }
}

/// One failed URL of a crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlFailure {
    pub url: String,
    pub error: CrawlError,
}

/// Outcome of one site crawl
#[derive(Debug, Clone)]
pub struct SiteCrawl {
    pub seed: String,

    /// Registrable domain the crawl was scoped to
    pub domain: String,

    pub pages: Vec<Page>,
    pub failures: Vec<CrawlFailure>,
    pub state: CrawlState,
    pub duration: Duration,
}

impl SiteCrawl {
    /// A crawl that yielded no pages is a failure for the business
    pub fn is_success(&self) -> bool {
        !self.pages.is_empty()
    }

    pub fn byte_count(&self) -> usize {
        self.pages.iter().map(Page::byte_len).sum()
    }

    pub fn count_by_method(&self, method: FetchMethod) -> usize {
        self.pages.iter().filter(|p| p.method == method).count()
    }

    /// Browser if any page needed the browser tier, otherwise HTTP
    pub fn method(&self) -> FetchMethod {
        if self.count_by_method(FetchMethod::Browser) > 0 {
            FetchMethod::Browser
        } else {
            FetchMethod::Http
        }
    }

    /// The failure that ended an abandoned crawl, if any
    pub fn last_error(&self) -> Option<&CrawlError> {
        self.failures.last().map(|f| &f.error)
    }
}

/// Delay after the `consecutive`-th failure in a row, capped
pub fn failure_delay(config: &CrawlerConfig, consecutive: u32) -> Duration {
    let delay = config
        .failure_delay_ms
        .saturating_mul(u64::from(consecutive));
    Duration::from_millis(delay.min(config.max_failure_delay_ms))
}

/// Crawls business websites one URL at a time
pub struct SiteCrawler {
    config: CrawlerConfig,
    early_exit: EarlyExit,
    fetcher: Arc<dyn PageFetcher>,
}

impl SiteCrawler {
    pub fn new(
        config: CrawlerConfig,
        early_exit: EarlyExit,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            config,
            early_exit,
            fetcher,
        }
    }

    /// Crawls one site starting from its root URL
    ///
    /// # Arguments
    ///
    /// * `seed` - The business website
    ///
    /// # Returns
    ///
    /// * `Ok(SiteCrawl)` - The crawl outcome; check [`SiteCrawl::is_success`]
    /// * `Err(UrlError)` - The seed URL is malformed
    pub async fn crawl(&self, seed: &str) -> UrlResult<SiteCrawl> {
        let mut frontier = Frontier::new(seed)?;
        let domain = frontier.target_domain().to_string();

        let started = Instant::now();
        let deadline = started + Duration::from_secs(self.config.crawl_timeout_secs);
        let max_pages = self.config.effective_max_pages();
        let request_delay = Duration::from_millis(self.config.request_delay_ms);

        let mut state = CrawlState::Seeded;
        let mut pages: Vec<Page> = Vec::new();
        let mut failures: Vec<CrawlFailure> = Vec::new();
        let mut consecutive_failures = 0u32;
        let mut next_delay: Option<Duration> = None;

        transition(&mut state, CrawlState::Crawling, &domain);

        let outcome = loop {
            if pages.len() >= max_pages {
                break CrawlState::Exhausted;
            }

            let Some(next) = frontier.next() else {
                break CrawlState::Exhausted;
            };

            if let Some(delay) = next_delay.take() {
                if Instant::now() + delay >= deadline {
                    tracing::warn!("Crawl of {} hit its deadline", domain);
                    break CrawlState::Abandoned;
                }
                tokio::time::sleep(delay).await;
            }

            let url = next.url.as_str();
            tracing::debug!("Fetching {} (priority {})", url, next.priority);

            let result = match tokio::time::timeout_at(deadline, self.fetcher.fetch(url)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Crawl of {} hit its deadline", domain);
                    break CrawlState::Abandoned;
                }
            };

            match result {
                Ok(page) if !served_on_site(&page, &domain) => {
                    tracing::debug!(
                        "Dropping {}: redirected off-site to {}",
                        url,
                        page.final_url
                    );
                    next_delay = Some(request_delay);
                }
                Ok(page) if !landed_first(&mut frontier, &next.url, &page) => {
                    tracing::debug!(
                        "Dropping {}: redirected to already visited {}",
                        url,
                        page.final_url
                    );
                    next_delay = Some(request_delay);
                }
                Ok(page) => {
                    consecutive_failures = 0;

                    if page.text.chars().count() >= self.config.min_text_chars {
                        let added = frontier.enqueue_all(page.links.iter().map(String::as_str));
                        tracing::trace!("{} new URLs from {}", added, url);
                    }

                    pages.push(page);
                    next_delay = Some(request_delay);

                    if self.early_exit.is_satisfied(&pages) {
                        tracing::debug!("Early exit for {} after {} pages", domain, pages.len());
                        break CrawlState::EarlyExited;
                    }
                }
                Err(error) => {
                    consecutive_failures += 1;
                    tracing::debug!(
                        "Failed {} ({}/{}): {}",
                        url,
                        consecutive_failures,
                        self.config.max_consecutive_failures,
                        error
                    );
                    failures.push(CrawlFailure {
                        url: url.to_string(),
                        error,
                    });

                    if consecutive_failures >= self.config.max_consecutive_failures {
                        tracing::info!(
                            "Abandoning {} after {} consecutive failures",
                            domain,
                            consecutive_failures
                        );
                        break CrawlState::Abandoned;
                    }

                    next_delay = Some(failure_delay(&self.config, consecutive_failures));
                }
            }
        };

        transition(&mut state, outcome, &domain);

        Ok(SiteCrawl {
            seed: seed.to_string(),
            domain,
            pages,
            failures,
            state,
            duration: started.elapsed(),
        })
    }
}

/// True if the page was served from the crawl's own registrable domain
fn served_on_site(page: &Page, domain: &str) -> bool {
    Url::parse(&page.final_url).is_ok_and(|u| is_same_site(&u, domain))
}

/// Records the page's final URL as visited; false if it was visited before
fn landed_first(frontier: &mut Frontier, requested: &Url, page: &Page) -> bool {
    Url::parse(&page.final_url).map_or(true, |landed| frontier.mark_landed(requested, &landed))
}

fn transition(state: &mut CrawlState, next: CrawlState, domain: &str) {
    debug_assert!(state.can_transition_to(next), "{} -> {}", state, next);
    tracing::trace!("Crawl of {}: {} -> {}", domain, state, next);
    *state = next;
}
