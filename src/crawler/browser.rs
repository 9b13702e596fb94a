//! Headless-browser fetch tier
//!
//! Loads a URL in a pooled browser session and waits out bot-protection
//! interstitials by re-reading the rendered document until the challenge
//! markers disappear or the poll budget runs out.

use super::pool::{BrowserSession, PooledSession, SessionFactory};
use crate::config::BrowserConfig;
use crate::state::{classify_status, CrawlError, ErrorKind};
use crate::HarvestError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::Page as ChromiumPage;
use futures::StreamExt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Substrings only found on bot-challenge interstitials
///
/// Cloudflare also injects `/cdn-cgi/challenge-platform/` scripts into ordinary
/// pages, so that path alone is not a marker.
pub const CHALLENGE_MARKERS: &[&str] = &[
    "<title>Just a moment...</title>",
    "cf-browser-verification",
    "cf_chl_opt",
    "cf-challenge-running",
    "Checking your browser before accessing",
    "<title>Attention Required! | Cloudflare</title>",
    "Verifying you are human",
    "_Incapsula_Resource",
    "px-captcha",
];

/// JavaScript reporting the main document's HTTP status (0 when unknown)
const DOCUMENT_STATUS_JS: &str =
    "(performance.getEntriesByType('navigation')[0] || {}).responseStatus || 0";

/// Returns true if a document looks like a bot-challenge page
pub fn has_challenge_marker(html: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|marker| html.contains(marker))
}

/// Markup and title rendered by the browser tier
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub title: Option<String>,

    /// HTTP status of the document, when the browser reported one
    pub status: Option<u16>,

    /// Where the browser ended up after redirects, when it reported one
    pub final_url: Option<String>,

    /// Number of polls it took for the challenge to clear (0 when none was shown)
    pub challenge_polls: u32,
}

/// Loads `url` in a checked-out session and waits for any challenge to clear
///
/// # Arguments
///
/// * `session` - Session checked out from the page pool
/// * `url` - URL to load
/// * `config` - Navigation timeout and challenge poll budget
///
/// # Returns
///
/// * `Ok(RenderedPage)` - The rendered document, free of challenge markers
/// * `Err(CrawlError)` - Navigation failed, the challenge persisted through
///   every poll (reported as `bot_challenge`), or the document that finally
///   loaded carried an error status
pub async fn render(
    session: &mut PooledSession,
    url: &str,
    config: &BrowserConfig,
) -> Result<RenderedPage, CrawlError> {
    let navigation_timeout = Duration::from_secs(config.navigation_timeout_secs);
    match tokio::time::timeout(navigation_timeout, session.navigate(url)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            if matches!(err.kind, ErrorKind::Connection | ErrorKind::Unknown) {
                session.mark_broken();
            }
            return Err(err);
        }
        Err(_) => {
            session.mark_broken();
            return Err(CrawlError::timeout(format!(
                "browser navigation exceeded {:?}",
                navigation_timeout
            )));
        }
    }

    let attempts = config.challenge_poll_attempts.max(1);
    let interval = Duration::from_millis(config.challenge_poll_interval_ms);

    for poll in 0..attempts {
        let html = session.content().await?;

        if !has_challenge_marker(&html) {
            let status = session.status().await.unwrap_or(None);
            if let Some(err) = status.and_then(classify_status) {
                return Err(err);
            }

            let title = session.title().await.unwrap_or(None);
            // Without it an off-site redirect cannot be ruled out
            let final_url = session.url().await?;
            return Ok(RenderedPage {
                html,
                title,
                status,
                final_url,
                challenge_polls: poll,
            });
        }

        tracing::debug!(
            "Challenge still present on {} (poll {}/{})",
            url,
            poll + 1,
            attempts
        );

        if poll + 1 < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(CrawlError::bot_challenge(format!(
        "challenge still present after {} polls",
        attempts
    )))
}

/// Session factory backed by one headless Chromium process
pub struct ChromiumFactory {
    browser: tokio::sync::Mutex<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl ChromiumFactory {
    /// Launches headless Chromium
    ///
    /// # Arguments
    ///
    /// * `config` - Browser tier settings
    /// * `user_agent` - User agent presented by every session
    ///
    /// # Returns
    ///
    /// * `Ok(ChromiumFactory)` - Browser running, CDP handler task spawned
    /// * `Err(HarvestError::Browser)` - No usable browser could be launched
    pub async fn launch(config: &BrowserConfig, user_agent: &str) -> Result<Self, HarvestError> {
        let chromium_config = ChromiumConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_secs(config.navigation_timeout_secs))
            .arg(format!("--user-agent={}", user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .build()
            .map_err(HarvestError::Browser)?;

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|e| HarvestError::Browser(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!("Launched headless browser");

        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            handler: Mutex::new(Some(handler_task)),
        })
    }
}

#[async_trait]
impl SessionFactory for ChromiumFactory {
    async fn create(&self) -> Result<Box<dyn BrowserSession>, CrawlError> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlError::new(ErrorKind::Unknown, e.to_string()))?;

        Ok(Box::new(ChromiumSession { page }))
    }

    async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            tracing::warn!("Failed waiting for browser exit: {}", e);
        }

        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handler) = handler {
            handler.abort();
        }
    }
}

/// One Chromium tab
struct ChromiumSession {
    page: ChromiumPage,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), CrawlError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| CrawlError::from_message(e.to_string()))
    }

    async fn content(&mut self) -> Result<String, CrawlError> {
        self.page
            .content()
            .await
            .map_err(|e| CrawlError::from_message(e.to_string()))
    }

    async fn title(&mut self) -> Result<Option<String>, CrawlError> {
        self.page
            .get_title()
            .await
            .map_err(|e| CrawlError::from_message(e.to_string()))
    }

    async fn status(&mut self) -> Result<Option<u16>, CrawlError> {
        let evaluation = self
            .page
            .evaluate(DOCUMENT_STATUS_JS)
            .await
            .map_err(|e| CrawlError::from_message(e.to_string()))?;

        Ok(evaluation
            .into_value::<u16>()
            .ok()
            .filter(|status| *status > 0))
    }

    async fn url(&mut self) -> Result<Option<String>, CrawlError> {
        self.page
            .url()
            .await
            .map_err(|e| CrawlError::from_message(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.page.close().await {
            tracing::debug!("Failed to close browser page: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::pool::PagePool;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Session whose content shows a challenge for the first `challenge_reads` reads
    struct ScriptedSession {
        reads: Arc<AtomicU32>,
        challenge_reads: u32,
        status: Option<u16>,
        url_fails: bool,
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn navigate(&mut self, _url: &str) -> Result<(), CrawlError> {
            Ok(())
        }

        async fn content(&mut self) -> Result<String, CrawlError> {
            let read = self.reads.fetch_add(1, Ordering::SeqCst);
            if read < self.challenge_reads {
                Ok("<html><title>Just a moment...</title></html>".to_string())
            } else {
                Ok("<html><title>Acme Roofing</title><body>Welcome</body></html>".to_string())
            }
        }

        async fn title(&mut self) -> Result<Option<String>, CrawlError> {
            Ok(Some("Acme Roofing".to_string()))
        }

        async fn status(&mut self) -> Result<Option<u16>, CrawlError> {
            Ok(self.status)
        }

        async fn url(&mut self) -> Result<Option<String>, CrawlError> {
            if self.url_fails {
                return Err(CrawlError::new(ErrorKind::Unknown, "page target closed"));
            }
            Ok(Some("https://example.com/".to_string()))
        }

        async fn close(self: Box<Self>) {}
    }

    struct ScriptedFactory {
        reads: Arc<AtomicU32>,
        challenge_reads: u32,
        status: Option<u16>,
        url_fails: bool,
    }

    #[async_trait]
    impl SessionFactory for ScriptedFactory {
        async fn create(&self) -> Result<Box<dyn BrowserSession>, CrawlError> {
            Ok(Box::new(ScriptedSession {
                reads: Arc::clone(&self.reads),
                challenge_reads: self.challenge_reads,
                status: self.status,
                url_fails: self.url_fails,
            }))
        }
    }

    fn fast_config(attempts: u32) -> BrowserConfig {
        BrowserConfig {
            challenge_poll_attempts: attempts,
            challenge_poll_interval_ms: 1,
            ..BrowserConfig::default()
        }
    }

    fn scripted_pool(challenge_reads: u32) -> (PagePool, Arc<AtomicU32>) {
        scripted_pool_with_status(challenge_reads, Some(200))
    }

    fn scripted_pool_with_status(
        challenge_reads: u32,
        status: Option<u16>,
    ) -> (PagePool, Arc<AtomicU32>) {
        scripted_pool_with(challenge_reads, status, false)
    }

    fn scripted_pool_with(
        challenge_reads: u32,
        status: Option<u16>,
        url_fails: bool,
    ) -> (PagePool, Arc<AtomicU32>) {
        let reads = Arc::new(AtomicU32::new(0));
        let factory = Arc::new(ScriptedFactory {
            reads: Arc::clone(&reads),
            challenge_reads,
            status,
            url_fails,
        });
        (PagePool::new(factory, 1, Duration::from_secs(1)), reads)
    }

    #[test]
    fn test_challenge_markers() {
        assert!(has_challenge_marker(
            "<title>Just a moment...</title><div id=\"cf-browser-verification\">"
        ));
        assert!(has_challenge_marker("<script>window._cf_chl_opt = {}</script>"));
        assert!(!has_challenge_marker("<title>Acme Roofing</title>"));
    }

    #[test]
    fn test_cloudflare_script_on_normal_page_is_not_a_challenge() {
        let html = r#"<html><head><title>Acme Roofing | Denver Roofers</title></head>
            <body><h1>Acme Roofing</h1><p>Just a moment... of your time for a free quote.</p>
            <p>DDoS protection by Cloudflare keeps this site fast.</p>
            <script>(function(){var a=document.createElement('script');
            a.src='/cdn-cgi/challenge-platform/scripts/jsd/main.js';
            document.getElementsByTagName('head')[0].appendChild(a);})();</script>
            </body></html>"#;
        assert!(!has_challenge_marker(html));
    }

    #[tokio::test]
    async fn test_error_status_after_render_fails() {
        let (pool, _) = scripted_pool_with_status(0, Some(404));
        let mut session = pool.acquire().await.unwrap();

        let err = render(&mut session, "https://example.com/gone", &fast_config(3))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::HttpStatus);
        assert_eq!(err.status, Some(404));
    }

    #[tokio::test]
    async fn test_reported_status_is_kept() {
        let (pool, _) = scripted_pool_with_status(0, None);
        let mut session = pool.acquire().await.unwrap();

        let page = render(&mut session, "https://example.com/", &fast_config(3))
            .await
            .unwrap();
        assert_eq!(page.status, None);

        let (pool, _) = scripted_pool(0);
        let mut session = pool.acquire().await.unwrap();
        let page = render(&mut session, "https://example.com/", &fast_config(3))
            .await
            .unwrap();
        assert_eq!(page.status, Some(200));
    }

    #[tokio::test]
    async fn test_unknown_landing_url_fails() {
        let (pool, _) = scripted_pool_with(0, Some(200), true);
        let mut session = pool.acquire().await.unwrap();

        let err = render(&mut session, "https://example.com/careers", &fast_config(3))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_render_reports_landing_url() {
        let (pool, _) = scripted_pool(0);
        let mut session = pool.acquire().await.unwrap();

        let page = render(&mut session, "https://example.com/home", &fast_config(3))
            .await
            .unwrap();

        assert_eq!(page.final_url.as_deref(), Some("https://example.com/"));
    }

    #[tokio::test]
    async fn test_render_without_challenge() {
        let (pool, reads) = scripted_pool(0);
        let mut session = pool.acquire().await.unwrap();

        let page = render(&mut session, "https://example.com/", &fast_config(3))
            .await
            .unwrap();

        assert_eq!(page.challenge_polls, 0);
        assert_eq!(page.title.as_deref(), Some("Acme Roofing"));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_render_waits_for_challenge_to_clear() {
        let (pool, reads) = scripted_pool(2);
        let mut session = pool.acquire().await.unwrap();

        let page = render(&mut session, "https://example.com/", &fast_config(5))
            .await
            .unwrap();

        assert_eq!(page.challenge_polls, 2);
        assert!(page.html.contains("Welcome"));
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_challenge_is_reported() {
        let (pool, reads) = scripted_pool(u32::MAX);
        let mut session = pool.acquire().await.unwrap();

        let err = render(&mut session, "https://example.com/", &fast_config(4))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::BotChallenge);
        assert_eq!(reads.load(Ordering::SeqCst), 4);
    }
}
