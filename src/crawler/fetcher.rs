//! Two-tier page fetcher
//!
//! This module handles every page request of a crawl:
//! - Tier 1: lightweight HTTP client with browser-like headers, one client per credential
//! - Retry with exponential backoff for transient (timeout/connection) failures
//! - Escalation to the browser tier for challenges and unresolved transport failures
//! - Bot-challenge detection from status codes and body markers
//! - Client-side-rendering detection for near-empty JS shells
//! - Tier 2: escalation to the pooled headless browser
//! - Recording every outcome in the domain health and failure trackers

use super::browser::{has_challenge_marker, render};
use super::page::{FetchMethod, Page};
use super::pool::PagePool;
use super::rate_limiter::{Credential, KeyRotator};
use crate::config::{BrowserConfig, FetchConfig};
use crate::state::{
    classify_status, CrawlError, DomainHealthTracker, ErrorKind, FailureTracker,
};
use crate::url::registrable_domain;
use async_trait::async_trait;
use backoff::future::retry_notify;
use backoff::{Error as BackoffError, ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL};
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Markers of an empty single-page-app mount point
const JS_SHELL_MARKERS: &[&str] = &[
    r#"<div id="root"></div>"#,
    r#"<div id="app"></div>"#,
    r#"id="__next""#,
    r#"id="___gatsby""#,
    "<app-root",
    "ng-app",
    "data-reactroot",
    "window.__NUXT__",
];

/// Notices shown by pages that cannot render without JavaScript
const JS_REQUIRED_NOTICES: &[&str] = &[
    "enable javascript",
    "javascript is required",
    "javascript is disabled",
    "requires javascript",
    "turn on javascript",
];

/// Anything able to turn a URL into a page
///
/// Implemented by [`Fetcher`]; crawl orchestration only depends on this trait.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, CrawlError>;
}

/// Builds the Tier 1 HTTP client for one credential
///
/// # Arguments
///
/// * `config` - Fetch settings (user agent, timeout)
/// * `credential` - Egress identity; its proxy, if any, routes every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Invalid proxy or TLS backend failure
pub fn build_http_client(
    config: &FetchConfig,
    credential: &Credential,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &credential.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
    }

    builder.build()
}

/// Backoff between Tier 1 attempts: `base * 2^retry`, capped, no jitter
///
/// The attempt count is bounded by `max-retries`, not by elapsed time.
pub fn retry_policy(config: &FetchConfig) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(config.retry_base_delay_ms))
        .with_max_interval(Duration::from_millis(config.retry_max_delay_ms))
        .with_multiplier(2.0)
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(None)
        .build()
}

/// Returns true if a successful response looks like an unrendered JS shell
///
/// The body must be smaller than `max_bytes` and either carry an empty
/// SPA mount point or a notice asking the visitor to enable JavaScript.
pub fn needs_rendering(html: &str, max_bytes: usize) -> bool {
    if html.len() >= max_bytes {
        return false;
    }

    if JS_SHELL_MARKERS.iter().any(|marker| html.contains(marker)) {
        return true;
    }

    let lowered = html.to_lowercase();
    JS_REQUIRED_NOTICES
        .iter()
        .any(|notice| lowered.contains(notice))
}

/// Two-tier fetcher shared by every crawl of a run
pub struct Fetcher {
    config: FetchConfig,
    browser_config: BrowserConfig,
    clients: HashMap<String, Client>,
    rotator: Arc<KeyRotator>,
    pool: Option<Arc<PagePool>>,
    health: Arc<DomainHealthTracker>,
    failures: Arc<FailureTracker>,
}

impl Fetcher {
    /// Creates a fetcher with one HTTP client per rotated credential
    ///
    /// The browser tier is disabled until [`Fetcher::with_pool`] is called.
    pub fn new(
        config: FetchConfig,
        browser_config: BrowserConfig,
        rotator: Arc<KeyRotator>,
        health: Arc<DomainHealthTracker>,
        failures: Arc<FailureTracker>,
    ) -> Result<Self, reqwest::Error> {
        let clients = rotator
            .credentials()
            .iter()
            .map(|credential| {
                let client = build_http_client(&config, credential)?;
                Ok((credential.id.clone(), client))
            })
            .collect::<Result<HashMap<_, _>, reqwest::Error>>()?;

        Ok(Self {
            config,
            browser_config,
            clients,
            rotator,
            pool: None,
            health,
            failures,
        })
    }

    /// Enables the browser tier
    pub fn with_pool(mut self, pool: Arc<PagePool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn has_browser(&self) -> bool {
        self.pool.is_some()
    }

    /// Fetches without recording the outcome
    async fn fetch_tiered(&self, url: &str) -> Result<Page, CrawlError> {
        match self.fetch_http(url).await {
            Ok(page) if !needs_rendering(&page.html, self.config.js_shell_max_bytes) => Ok(page),
            Ok(page) => {
                tracing::debug!("{} looks client-rendered, trying browser tier", url);
                match self.fetch_browser(url).await {
                    Some(Ok(rendered)) => Ok(rendered),
                    Some(Err(err)) => {
                        tracing::debug!(
                            "Browser render of {} failed ({}), keeping HTTP page",
                            url,
                            err
                        );
                        Ok(page)
                    }
                    None => Ok(page),
                }
            }
            Err(err) if err.can_escalate() => match self.fetch_browser(url).await {
                Some(result) => {
                    if let Err(browser_err) = &result {
                        tracing::debug!(
                            "Browser tier failed for {} after HTTP {}: {}",
                            url,
                            err.kind,
                            browser_err
                        );
                    }
                    result
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Tier 1 with bounded retries on transient failures
    async fn fetch_http(&self, url: &str) -> Result<Page, CrawlError> {
        let attempts = self.config.max_retries + 1;
        let mut attempt = 0u32;

        let operation = || {
            attempt += 1;
            let last_attempt = attempt >= attempts;

            async move {
                let credential = self.rotator.acquire().await;
                let result = match self.clients.get(&credential.id) {
                    Some(client) => self.try_http(client, url).await,
                    None => Err(CrawlError::new(
                        ErrorKind::Unknown,
                        format!("no HTTP client for credential {}", credential.id),
                    )),
                };

                result.map_err(|err| {
                    if err.is_retriable() && !last_attempt {
                        BackoffError::transient(err)
                    } else {
                        BackoffError::permanent(err)
                    }
                })
            }
        };

        retry_notify(
            retry_policy(&self.config),
            operation,
            |err: CrawlError, delay: Duration| {
                tracing::debug!("Fetch of {} failed ({}), retrying in {:?}", url, err, delay);
            },
        )
        .await
    }

    /// One Tier 1 request
    async fn try_http(&self, client: &Client, url: &str) -> Result<Page, CrawlError> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| CrawlError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        if let Some(err) = classify_status(status) {
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::from_reqwest(&e))?;

        if has_challenge_marker(&body) {
            return Err(
                CrawlError::bot_challenge("challenge page served to HTTP client")
                    .with_status(status),
            );
        }

        Ok(Page::from_html(url, &final_url, body, status, FetchMethod::Http))
    }

    /// Tier 2; `None` when no browser is available
    async fn fetch_browser(&self, url: &str) -> Option<Result<Page, CrawlError>> {
        let pool = self.pool.as_ref()?;

        let result: Result<Page, CrawlError> = async {
            let _credential = self.rotator.acquire().await;
            let mut session = pool.acquire().await?;
            let rendered = render(&mut session, url, &self.browser_config).await?;

            let landed = rendered.final_url.as_deref().unwrap_or(url);
            let final_url = Url::parse(landed)
                .or_else(|_| Url::parse(url))
                .map_err(|e| CrawlError::new(ErrorKind::Unknown, e.to_string()))?;
            let status = rendered.status.unwrap_or(200);
            let mut page =
                Page::from_html(url, &final_url, rendered.html, status, FetchMethod::Browser);
            if page.title.is_none() {
                page.title = rendered.title;
            }
            Ok(page)
        }
        .await;

        Some(result)
    }
}

#[async_trait]
impl PageFetcher for Fetcher {
    /// Fetches a page, escalating to the browser tier when needed
    ///
    /// # Flow
    ///
    /// | Tier 1 outcome | Action |
    /// |----------------|--------|
    /// | 2xx, real content | Return HTTP page |
    /// | 2xx, JS shell | Render in browser; HTTP page kept as fallback |
    /// | Timeout / connection | Retry with backoff, then escalate |
    /// | 403 / 503 / challenge body | Escalate |
    /// | Unclassified transport failure | Escalate |
    /// | Other non-2xx (404, 410, 500) | Fail |
    /// | DNS not found | Fail immediately |
    ///
    /// The final outcome is recorded once per call in the domain health
    /// tracker, and failures in the failure tracker.
    async fn fetch(&self, url: &str) -> Result<Page, CrawlError> {
        let result = self.fetch_tiered(url).await;

        let domain = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(registrable_domain))
            .unwrap_or_else(|| url.to_string());

        match &result {
            Ok(_) => self.health.record(&domain, Ok(())),
            Err(err) => {
                self.health.record(&domain, Err(err));
                self.failures.record(err);
            }
        }

        result
    }
}
