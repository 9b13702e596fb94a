//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! fetch tiers, site crawls and full batch runs end-to-end. The browser tier
//! is replaced by an in-memory session factory.

use async_trait::async_trait;
use site_harvester::config::{parse_config, BrowserConfig, Config, FetchConfig};
use site_harvester::crawler::{
    BatchOptions, BrowserSession, Coordinator, Credential, EarlyExit, FetchMethod, Fetcher,
    KeyRotator, PageFetcher, PagePool, SessionFactory, SiteCrawler,
};
use site_harvester::output::write_markdown_summary;
use site_harvester::state::{CrawlError, CrawlState, DomainHealthTracker, ErrorKind, FailureTracker};
use site_harvester::storage::{BlobStore, BusinessRecord, FsBlobStore, RunStatus, SqliteStorage, Storage};
use site_harvester::ExtractedData;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RENDERED_HTML: &str = r#"<html><head><title>Rendered</title></head>
<body><h1>Acme Roofing</h1><p>Rendered by the browser tier. Call us today.</p></body></html>"#;

/// Browser session that serves the same document for every URL
struct FakeSession {
    html: String,
    landed: Option<String>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, _url: &str) -> Result<(), CrawlError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, CrawlError> {
        Ok(self.html.clone())
    }

    async fn title(&mut self) -> Result<Option<String>, CrawlError> {
        Ok(Some("Rendered".to_string()))
    }

    async fn url(&mut self) -> Result<Option<String>, CrawlError> {
        Ok(self.landed.clone())
    }

    async fn close(self: Box<Self>) {}
}

#[derive(Default)]
struct FakeFactory {
    created: AtomicUsize,

    /// URL every session reports after navigation, simulating a redirect
    landed: Option<String>,
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create(&self) -> Result<Box<dyn BrowserSession>, CrawlError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            html: RENDERED_HTML.to_string(),
            landed: self.landed.clone(),
        }))
    }
}

/// Fetcher plus the run-scoped trackers it reports into
struct Harness {
    fetcher: Fetcher,
    health: Arc<DomainHealthTracker>,
    failures: Arc<FailureTracker>,
}

fn fetch_config() -> FetchConfig {
    FetchConfig {
        timeout_secs: 5,
        max_retries: 1,
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 20,
        ..FetchConfig::default()
    }
}

fn browser_config() -> BrowserConfig {
    BrowserConfig {
        challenge_poll_attempts: 1,
        challenge_poll_interval_ms: 10,
        navigation_timeout_secs: 5,
        acquire_timeout_secs: 5,
        ..BrowserConfig::default()
    }
}

fn harness(factory: Option<Arc<FakeFactory>>) -> Harness {
    let health = Arc::new(DomainHealthTracker::new());
    let failures = Arc::new(FailureTracker::new());
    let rotator = Arc::new(KeyRotator::new(vec![Credential::direct()], 100, 100.0));

    let mut fetcher = Fetcher::new(
        fetch_config(),
        browser_config(),
        rotator,
        Arc::clone(&health),
        Arc::clone(&failures),
    )
    .expect("Failed to build fetcher");

    if let Some(factory) = factory {
        let pool = PagePool::new(factory, 2, Duration::from_secs(5));
        fetcher = fetcher.with_pool(Arc::new(pool));
    }

    Harness {
        fetcher,
        health,
        failures,
    }
}

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.to_string())
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_response(body))
        .mount(server)
        .await;
}

/// Base configuration with fast timings, writing into `dir`
fn test_config(dir: &Path) -> Config {
    let toml = format!(
        r#"
[crawler]
max-pages = 10
max-concurrent-crawls = 2
request-delay-ms = 0
failure-delay-ms = 1
max-failure-delay-ms = 5
min-text-chars = 10
crawl-timeout-secs = 30

[fetch]
timeout-secs = 5
max-retries = 0
retry-base-delay-ms = 10
retry-max-delay-ms = 20

[browser]
enabled = false
challenge-poll-attempts = 1
challenge-poll-interval-ms = 10
acquire-timeout-secs = 5

[rate-limit]
requests-per-second = 100.0
burst = 100

[early-exit]
enabled = false

[output]
database-path = "{}"
blob-dir = "{}"
summary-path = "{}"
"#,
        dir.join("harvest.db").display(),
        dir.join("blobs").display(),
        dir.join("summary.md").display()
    );

    parse_config(&toml).expect("Test config should be valid")
}

fn host_of(server: &MockServer) -> String {
    url::Url::parse(&server.uri())
        .expect("Failed to parse base URL")
        .host_str()
        .expect("Failed to extract host")
        .to_string()
}

// ===== Fetch tiers =====

#[tokio::test]
async fn test_fetch_success_records_health() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><head><title>Acme Roofing</title></head>
           <body><p>Roofing in Denver.</p><a href="/about-us">About</a></body></html>"#,
    )
    .await;

    let h = harness(None);
    let page = h
        .fetcher
        .fetch(&format!("{}/", server.uri()))
        .await
        .expect("Fetch should succeed");

    assert_eq!(page.method, FetchMethod::Http);
    assert_eq!(page.status, 200);
    assert_eq!(page.title.as_deref(), Some("Acme Roofing"));
    assert!(page.text.contains("Roofing in Denver."));
    assert!(page
        .links
        .iter()
        .any(|link| link.ends_with("/about-us")));

    let stat = h.health.stat(&host_of(&server)).expect("Domain should be tracked");
    assert_eq!(stat.attempted, 1);
    assert_eq!(stat.succeeded, 1);
    assert_eq!(h.failures.total(), 0);
}

#[tokio::test]
async fn test_fetch_404_without_browser() {
    let server = MockServer::start().await;

    let h = harness(None);
    let err = h
        .fetcher
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .expect_err("Unmatched route should fail");

    assert_eq!(err.kind, ErrorKind::HttpStatus);
    assert_eq!(err.status, Some(404));
    assert_eq!(h.failures.total(), 1);
    assert_eq!(h.failures.by_code().get("HTTP_404"), Some(&1));

    let stat = h.health.stat(&host_of(&server)).unwrap();
    assert_eq!(stat.failed, 1);
}

#[tokio::test]
async fn test_challenge_without_browser_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Attention Required! | Cloudflare"))
        .mount(&server)
        .await;

    let h = harness(None);
    let err = h
        .fetcher
        .fetch(&format!("{}/", server.uri()))
        .await
        .expect_err("Challenge should fail without a browser");

    assert_eq!(err.kind, ErrorKind::BotChallenge);
    assert_eq!(err.status, Some(403));
}

#[tokio::test]
async fn test_challenge_escalates_to_browser() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        "<html><head><title>Just a moment...</title></head><body>Checking your browser</body></html>",
    )
    .await;

    let factory = Arc::new(FakeFactory::default());
    let h = harness(Some(Arc::clone(&factory)));

    let page = h
        .fetcher
        .fetch(&format!("{}/", server.uri()))
        .await
        .expect("Browser tier should recover the page");

    assert_eq!(page.method, FetchMethod::Browser);
    assert_eq!(page.title.as_deref(), Some("Rendered"));
    assert!(page.text.contains("Rendered by the browser tier."));
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    assert_eq!(h.failures.total(), 0);
}

#[tokio::test]
async fn test_js_shell_rendered_by_browser() {
    let server = MockServer::start().await;
    let shell = r#"<html><head><script src="/app.js"></script></head><body><div id="root"></div></body></html>"#;
    mount_page(&server, "/", shell).await;

    let factory = Arc::new(FakeFactory::default());
    let with_browser = harness(Some(factory));
    let page = with_browser
        .fetcher
        .fetch(&format!("{}/", server.uri()))
        .await
        .unwrap();
    assert_eq!(page.method, FetchMethod::Browser);

    // Without a browser the shell itself is returned
    let without_browser = harness(None);
    let page = without_browser
        .fetcher
        .fetch(&format!("{}/", server.uri()))
        .await
        .unwrap();
    assert_eq!(page.method, FetchMethod::Http);
    assert_eq!(page.html, shell);
}

#[tokio::test]
async fn test_dns_failure_is_not_escalated() {
    let factory = Arc::new(FakeFactory::default());
    let h = harness(Some(Arc::clone(&factory)));

    let err = h
        .fetcher
        .fetch("http://no-such-business.invalid/")
        .await
        .expect_err("Unresolvable host should fail");

    assert_eq!(err.kind, ErrorKind::Dns);
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    assert_eq!(h.health.success_rate("no-such-business.invalid"), 0.0);
}

#[tokio::test]
async fn test_missing_page_is_not_escalated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let factory = Arc::new(FakeFactory::default());
    let h = harness(Some(Arc::clone(&factory)));

    let err = h
        .fetcher
        .fetch(&format!("{}/careers", server.uri()))
        .await
        .expect_err("Unmatched route should fail");
    assert_eq!(err.kind, ErrorKind::HttpStatus);
    assert_eq!(err.status, Some(404));

    let err = h
        .fetcher
        .fetch(&format!("{}/gone", server.uri()))
        .await
        .expect_err("Gone page should fail");
    assert_eq!(err.status, Some(410));

    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    assert_eq!(h.failures.total(), 2);
}

#[tokio::test]
async fn test_cloudflare_analytics_script_is_not_a_challenge() {
    let server = MockServer::start().await;
    let html = r#"<html><head><title>Acme Roofing | Denver</title></head>
<body><h1>Acme Roofing</h1><p>Residential and commercial roofing across Denver since 1987.</p>
<p>DDoS protection by Cloudflare</p>
<script>(function(){var a=document.createElement('script');
a.src='/cdn-cgi/challenge-platform/scripts/jsd/main.js';document.head.appendChild(a);})();</script>
</body></html>"#;
    mount_page(&server, "/", html).await;

    let factory = Arc::new(FakeFactory::default());
    let h = harness(Some(Arc::clone(&factory)));

    let page = h
        .fetcher
        .fetch(&format!("{}/", server.uri()))
        .await
        .expect("Ordinary page should be served over HTTP");

    assert_eq!(page.method, FetchMethod::Http);
    assert!(page.text.contains("Residential and commercial roofing"));
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_browser_redirect_off_site_is_not_harvested() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><p>Acme Roofing serves the whole Denver metro area.</p>
           <a href="/careers">Careers</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/careers"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let factory = Arc::new(FakeFactory {
        landed: Some("https://jobs.hireboard.io/acme".to_string()),
        ..FakeFactory::default()
    });
    let h = harness(Some(Arc::clone(&factory)));

    let page = h
        .fetcher
        .fetch(&format!("{}/careers", server.uri()))
        .await
        .expect("Browser tier should render the page");
    assert_eq!(page.method, FetchMethod::Browser);
    assert_eq!(page.final_url, "https://jobs.hireboard.io/acme");

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let crawler = SiteCrawler::new(
        config.crawler.clone(),
        EarlyExit::from_config(&config.early_exit),
        Arc::new(h.fetcher),
    );

    let crawl = crawler.crawl(&server.uri()).await.unwrap();

    assert_eq!(crawl.state, CrawlState::Exhausted);
    assert_eq!(crawl.pages.len(), 1);
    assert_eq!(crawl.pages[0].method, FetchMethod::Http);
    assert!(crawl.failures.is_empty());
}

// ===== Site crawls =====

#[tokio::test]
async fn test_site_crawl_early_exit() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><p>Email office@acmeroofing.com for a free quote.</p>
           <a href="/about-us">About</a><a href="/team">Team</a>
           <a href="/services">Services</a><a href="/contact">Contact</a></body></html>"#,
    )
    .await;
    for route in ["/about-us", "/team", "/services", "/contact"] {
        mount_page(
            &server,
            route,
            "<html><body><p>Family-owned roofing contractor serving Denver.</p></body></html>",
        )
        .await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.early_exit.enabled = true;
    config.early_exit.min_pages = 3;
    config.early_exit.require_email = true;

    let h = harness(None);
    let crawler = SiteCrawler::new(
        config.crawler.clone(),
        EarlyExit::from_config(&config.early_exit),
        Arc::new(h.fetcher),
    );

    let crawl = crawler.crawl(&server.uri()).await.unwrap();

    assert_eq!(crawl.state, CrawlState::EarlyExited);
    assert_eq!(crawl.pages.len(), 3);
    assert!(crawl.failures.is_empty());
    assert!(crawl.is_success());
}

#[tokio::test]
async fn test_site_crawl_abandons_after_consecutive_failures() {
    let server = MockServer::start().await;
    let links: String = (1..=6)
        .map(|i| format!(r#"<a href="/page-{}">Page {}</a>"#, i, i))
        .collect();
    mount_page(
        &server,
        "/",
        &format!("<html><body><p>Welcome to Acme Roofing.</p>{}</body></html>", links),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let h = harness(None);
    let health = Arc::clone(&h.health);
    let crawler = SiteCrawler::new(
        config.crawler.clone(),
        EarlyExit::from_config(&config.early_exit),
        Arc::new(h.fetcher),
    );

    let crawl = crawler.crawl(&server.uri()).await.unwrap();

    assert_eq!(crawl.state, CrawlState::Abandoned);
    assert_eq!(crawl.pages.len(), 1);
    assert_eq!(crawl.failures.len(), 5);
    assert_eq!(crawl.last_error().map(|e| e.status), Some(Some(404)));

    let stat = health.stat(&host_of(&server)).unwrap();
    assert_eq!(stat.attempted, 6);
    assert_eq!(stat.failed, 5);
}

#[tokio::test]
async fn test_site_crawl_respects_page_cap() {
    let server = MockServer::start().await;
    let links: String = (1..=8)
        .map(|i| format!(r#"<a href="/service-{}">Service {}</a>"#, i, i))
        .collect();
    let body = format!("<html><body><p>Roofing, gutters and siding.</p>{}</body></html>", links);
    Mock::given(method("GET"))
        .respond_with(html_response(&body))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.crawler.max_pages = 10;
    config.crawler.page_cap = 4;

    let h = harness(None);
    let crawler = SiteCrawler::new(
        config.crawler.clone(),
        EarlyExit::from_config(&config.early_exit),
        Arc::new(h.fetcher),
    );

    let crawl = crawler.crawl(&server.uri()).await.unwrap();

    assert_eq!(crawl.state, CrawlState::Exhausted);
    assert_eq!(crawl.pages.len(), 4);
}

// ===== Batch runs =====

#[tokio::test]
async fn test_batch_run_end_to_end() {
    let good = MockServer::start().await;
    mount_page(
        &good,
        "/",
        r#"<html><head><title>Acme Roofing</title></head><body>
           <p>We are a team of 12 roofers. Email office@acmeroofing.com today.</p>
           <a href="/about-us">About us</a></body></html>"#,
    )
    .await;
    mount_page(
        &good,
        "/about-us",
        r#"<html><body><p>Acme Roofing was established in 1998.</p>
           <p>John Smith, Owner</p></body></html>"#,
    )
    .await;

    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    {
        let mut storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
        storage
            .upsert_business(&BusinessRecord::new("b1", Some(&good.uri())))
            .unwrap();
        storage
            .upsert_business(&BusinessRecord::new("b2", None))
            .unwrap();
        storage
            .upsert_business(&BusinessRecord::new("b3", Some(&broken.uri())))
            .unwrap();
    }

    let options = BatchOptions {
        fast_mode: true,
        ..Default::default()
    };
    let coordinator =
        Coordinator::new(config.clone(), "test-hash".to_string(), options.clone()).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert!(summary.fast_mode);
    assert_eq!(summary.config_hash, "test-hash");
    assert_eq!(summary.metrics.processed, 2);
    assert_eq!(summary.metrics.succeeded, 1);
    assert_eq!(summary.metrics.failed, 1);
    assert_eq!(summary.metrics.pages, 2);
    assert_eq!(summary.metrics.http_pages, 2);
    assert_eq!(summary.metrics.browser_pages, 0);
    assert_eq!(summary.failures_by_kind.get(&ErrorKind::HttpStatus), Some(&1));

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();

    let b1 = storage.get_business("b1").unwrap().unwrap();
    assert_eq!(b1.crawl_success, Some(true));
    let crawl = storage.latest_crawl("b1").unwrap().unwrap();
    assert!(crawl.success);
    assert_eq!(crawl.page_count, 2);
    assert_eq!(crawl.method.as_deref(), Some("http"));

    let blobs = FsBlobStore::new(&config.output.blob_dir);
    let raw = blobs.get(crawl.raw_blob.as_deref().unwrap()).unwrap();
    let raw: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(raw["business_id"], "b1");
    assert_eq!(raw["pages"].as_array().map(Vec::len), Some(2));

    let extracted = blobs.get(crawl.extracted_blob.as_deref().unwrap()).unwrap();
    let extracted: ExtractedData = serde_json::from_slice(&extracted).unwrap();
    assert_eq!(extracted.emails, vec!["office@acmeroofing.com"]);
    assert_eq!(extracted.founded_year, Some(1998));
    assert_eq!(extracted.headcount, Some(12));
    assert_eq!(extracted.team.first().map(|m| m.name.as_str()), Some("John Smith"));

    let b3 = storage.latest_crawl("b3").unwrap().unwrap();
    assert!(!b3.success);
    assert_eq!(b3.raw_blob, None);
    assert!(b3.error.unwrap_or_default().contains("500"));
    assert!(storage.latest_crawl("b2").unwrap().is_none());

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, summary.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.processed, 2);
    drop(storage);

    let summary_path = Path::new(&config.output.summary_path);
    write_markdown_summary(&summary, summary_path).unwrap();
    assert!(summary_path.exists());

    // A second run only retries the business whose crawl failed
    let rerun = Coordinator::new(config, "test-hash".to_string(), options).unwrap();
    let ids: Vec<String> = rerun
        .eligible_businesses()
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(ids, vec!["b3"]);
}

#[tokio::test]
async fn test_batch_run_uses_browser_tier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.browser.enabled = true;

    let storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    let blobs = Arc::new(FsBlobStore::new(&config.output.blob_dir));
    let factory = Arc::new(FakeFactory::default());

    let coordinator = Coordinator::with_stores(
        config,
        "hash".to_string(),
        BatchOptions::default(),
        storage,
        blobs,
    )
    .with_session_factory(Arc::clone(&factory) as Arc<dyn SessionFactory>);

    coordinator
        .storage()
        .lock()
        .unwrap()
        .upsert_business(&BusinessRecord::new("b1", Some(&server.uri())))
        .unwrap();

    let summary = coordinator.run().await.unwrap();

    assert!(!summary.fast_mode);
    assert_eq!(summary.metrics.succeeded, 1);
    assert_eq!(summary.metrics.browser_pages, 1);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);

    let crawl = coordinator
        .storage()
        .lock()
        .unwrap()
        .latest_crawl("b1")
        .unwrap()
        .unwrap();
    assert_eq!(crawl.method.as_deref(), Some("browser"));
}

#[tokio::test]
async fn test_batch_run_respects_ids_and_filters() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<html><body><p>Plumbing services.</p></body></html>").await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.batch.filters = vec![site_harvester::config::FilterRule {
        field: "industry".to_string(),
        op: site_harvester::config::FilterOp::Equals,
        value: Some("plumbing".to_string()),
    }];

    {
        let mut storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
        for (id, industry) in [("p1", "Plumbing"), ("p2", "Plumbing"), ("r1", "Roofing")] {
            let mut business = BusinessRecord::new(id, Some(&server.uri()));
            business
                .attributes
                .insert("industry".to_string(), industry.to_string());
            storage.upsert_business(&business).unwrap();
        }
    }

    let options = BatchOptions {
        ids: vec!["p2".to_string(), "r1".to_string()],
        fast_mode: true,
        ..Default::default()
    };
    let coordinator = Coordinator::new(config, "hash".to_string(), options).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.metrics.processed, 1);
    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert!(storage.latest_crawl("p2").unwrap().is_some());
    assert!(storage.latest_crawl("p1").unwrap().is_none());
    assert!(storage.latest_crawl("r1").unwrap().is_none());
}
