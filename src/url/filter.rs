//! Skip rules for non-content resources

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Schemes that never lead to a crawlable page
const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:", "sms:", "javascript:", "data:", "ftp:"];

/// File extensions of media, documents and static assets
const SKIPPED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "tif", "tiff", "avif", "pdf", "zip",
    "rar", "gz", "tar", "7z", "dmg", "exe", "mp3", "mp4", "m4a", "wav", "mov", "avi", "webm",
    "css", "js", "json", "xml", "rss", "woff", "woff2", "ttf", "eot", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx", "csv", "ics",
];

/// Path segments for auth, commerce and CMS plumbing
const SKIPPED_SEGMENTS: &[&str] = &[
    "login", "log-in", "signin", "sign-in", "signup", "sign-up", "register", "logout", "cart",
    "checkout", "basket", "account", "my-account", "wp-admin", "wp-login.php", "wp-json",
    "xmlrpc.php", "cdn-cgi", "feed", "admin", "password-reset", "lost-password",
];

/// Query keys that mark duplicate or action URLs
const SKIPPED_QUERY_KEYS: &[&str] = &[
    "replytocom",
    "share",
    "add-to-cart",
    "add_to_cart",
    "print",
    "format",
    "orderby",
    "filter",
    "sort",
];

static PAGINATION_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(?:page|p)/\d+/?$").expect("valid pagination regex"));

/// Returns true if a URL points at a non-content resource
///
/// Rejects non-http schemes, media and document extensions, login/cart/account
/// style paths, and pagination or sort/filter noise. Relative or otherwise
/// unparseable inputs are only checked against the scheme list.
///
/// # Examples
///
/// ```
/// use site_harvester::url::should_skip;
///
/// assert!(should_skip("mailto:owner@example.com"));
/// assert!(should_skip("https://example.com/images/team.jpg"));
/// assert!(should_skip("https://example.com/cart"));
/// assert!(!should_skip("https://example.com/about-us"));
/// ```
pub fn should_skip(url_str: &str) -> bool {
    let lowered = url_str.trim().to_lowercase();

    if SKIPPED_SCHEMES.iter().any(|s| lowered.starts_with(s)) {
        return true;
    }

    let Ok(url) = Url::parse(&lowered) else {
        return false;
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return true;
    }

    let path = url.path();

    if let Some(last) = path.rsplit('/').next() {
        if let Some((_, ext)) = last.rsplit_once('.') {
            if SKIPPED_EXTENSIONS.contains(&ext) {
                return true;
            }
        }
    }

    if path
        .split('/')
        .any(|segment| SKIPPED_SEGMENTS.contains(&segment))
    {
        return true;
    }

    if PAGINATION_PATH.is_match(path) {
        return true;
    }

    for (key, value) in url.query_pairs() {
        if SKIPPED_QUERY_KEYS.contains(&key.as_ref()) {
            return true;
        }
        // First page is usually the canonical listing; deeper pages are noise
        if (key == "page" || key == "paged" || key == "pg") && value != "1" {
            return true;
        }
    }

    false
}
