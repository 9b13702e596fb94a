use serde::Deserialize;

/// Main configuration structure for Site-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(rename = "early-exit", default)]
    pub early_exit: EarlyExitConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub output: OutputConfig,
}

/// Per-site crawl behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages to fetch for one business
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Absolute ceiling on pages per site, regardless of `max-pages`
    #[serde(rename = "page-cap", default = "default_page_cap")]
    pub page_cap: u32,

    /// Number of businesses crawled concurrently
    #[serde(rename = "max-concurrent-crawls")]
    pub max_concurrent_crawls: u32,

    /// Delay between consecutive requests of one crawl (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Delay added per consecutive failure (milliseconds)
    #[serde(rename = "failure-delay-ms", default = "default_failure_delay")]
    pub failure_delay_ms: u64,

    /// Upper bound on the failure delay (milliseconds)
    #[serde(rename = "max-failure-delay-ms", default = "default_max_failure_delay")]
    pub max_failure_delay_ms: u64,

    /// Consecutive fetch failures after which a crawl is abandoned
    #[serde(
        rename = "max-consecutive-failures",
        default = "default_max_consecutive_failures"
    )]
    pub max_consecutive_failures: u32,

    /// Minimum plain-text length before links are followed from a page
    #[serde(rename = "min-text-chars", default = "default_min_text_chars")]
    pub min_text_chars: usize,

    /// Deadline for one site crawl (seconds)
    #[serde(rename = "crawl-timeout-secs", default = "default_crawl_timeout")]
    pub crawl_timeout_secs: u64,

    /// Attempts observed on a domain before its success rate is judged
    #[serde(
        rename = "domain-skip-min-attempts",
        default = "default_domain_skip_min_attempts"
    )]
    pub domain_skip_min_attempts: u64,

    /// Success rate below which later crawls of a domain are skipped
    #[serde(
        rename = "domain-skip-min-success-rate",
        default = "default_domain_skip_min_success_rate"
    )]
    pub domain_skip_min_success_rate: f64,
}

impl CrawlerConfig {
    /// Page limit actually applied to a crawl
    pub fn effective_max_pages(&self) -> usize {
        self.max_pages.min(self.page_cap) as usize
    }
}

/// Tier 1 HTTP fetch settings
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "timeout-secs", default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Additional attempts after the first failure
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(rename = "retry-max-delay-ms", default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,

    /// Bodies smaller than this are candidates for the JS-shell heuristic
    #[serde(rename = "js-shell-max-bytes", default = "default_js_shell_max_bytes")]
    pub js_shell_max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_fetch_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            js_shell_max_bytes: default_js_shell_max_bytes(),
        }
    }
}

/// Tier 2 headless browser settings
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum concurrently open browser sessions
    #[serde(rename = "max-sessions", default = "default_max_sessions")]
    pub max_sessions: u32,

    #[serde(
        rename = "challenge-poll-attempts",
        default = "default_challenge_poll_attempts"
    )]
    pub challenge_poll_attempts: u32,

    #[serde(
        rename = "challenge-poll-interval-ms",
        default = "default_challenge_poll_interval"
    )]
    pub challenge_poll_interval_ms: u64,

    #[serde(
        rename = "navigation-timeout-secs",
        default = "default_navigation_timeout"
    )]
    pub navigation_timeout_secs: u64,

    /// How long a crawl waits for a free session before giving up on the browser tier
    #[serde(rename = "acquire-timeout-secs", default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sessions: default_max_sessions(),
            challenge_poll_attempts: default_challenge_poll_attempts(),
            challenge_poll_interval_ms: default_challenge_poll_interval(),
            navigation_timeout_secs: default_navigation_timeout(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

/// Token-bucket throttling shared by every crawl of a run
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Refill rate of each credential's bucket
    #[serde(rename = "requests-per-second", default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Credentials to rotate between; empty means one direct credential
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            credentials: Vec::new(),
        }
    }
}

/// One egress credential
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CredentialEntry {
    pub id: String,

    /// Optional proxy URL requests under this credential are routed through
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Criteria for stopping a crawl once enough signal is gathered
#[derive(Debug, Clone, Deserialize)]
pub struct EarlyExitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(rename = "min-pages", default = "default_early_exit_min_pages")]
    pub min_pages: u32,

    #[serde(rename = "require-email", default = "default_true")]
    pub require_email: bool,

    #[serde(rename = "require-team-page", default)]
    pub require_team_page: bool,
}

impl Default for EarlyExitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_pages: default_early_exit_min_pages(),
            require_email: true,
            require_team_page: false,
        }
    }
}

/// Run-level selection of businesses
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(rename = "skip-if-crawled", default = "default_true")]
    pub skip_if_crawled: bool,

    #[serde(rename = "force-recrawl", default)]
    pub force_recrawl: bool,

    /// Disables the browser tier for the whole run
    #[serde(rename = "fast-mode", default)]
    pub fast_mode: bool,

    #[serde(default)]
    pub filters: Vec<FilterRule>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            skip_if_crawled: true,
            force_recrawl: false,
            fast_mode: false,
            filters: Vec::new(),
        }
    }
}

/// Field-based eligibility rule
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FilterRule {
    /// `id`, `website`, or any attribute key
    pub field: String,

    pub op: FilterOp,

    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    Exists,
    Missing,
}

impl FilterOp {
    /// Returns true if the operator compares against a value
    pub fn needs_value(&self) -> bool {
        matches!(self, Self::Equals | Self::NotEquals | Self::Contains)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite business record store
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory raw and extracted JSON payloads are written under
    #[serde(rename = "blob-dir")]
    pub blob_dir: String,

    /// Path to the markdown run summary
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

fn default_true() -> bool {
    true
}
fn default_page_cap() -> u32 {
    50
}
fn default_request_delay() -> u64 {
    500
}
fn default_failure_delay() -> u64 {
    1000
}
fn default_max_failure_delay() -> u64 {
    5000
}
fn default_max_consecutive_failures() -> u32 {
    5
}
fn default_min_text_chars() -> usize {
    200
}
fn default_crawl_timeout() -> u64 {
    300
}
fn default_domain_skip_min_attempts() -> u64 {
    10
}
fn default_domain_skip_min_success_rate() -> f64 {
    0.1
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string()
}
fn default_fetch_timeout() -> u64 {
    15
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_base_delay() -> u64 {
    1000
}
fn default_retry_max_delay() -> u64 {
    4000
}
fn default_js_shell_max_bytes() -> usize {
    4096
}
fn default_max_sessions() -> u32 {
    3
}
fn default_challenge_poll_attempts() -> u32 {
    6
}
fn default_challenge_poll_interval() -> u64 {
    2000
}
fn default_navigation_timeout() -> u64 {
    30
}
fn default_acquire_timeout() -> u64 {
    60
}
fn default_requests_per_second() -> f64 {
    8.0
}
fn default_burst() -> u32 {
    8
}
fn default_early_exit_min_pages() -> u32 {
    3
}
