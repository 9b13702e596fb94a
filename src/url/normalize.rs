use crate::UrlError;
use url::Url;

/// Campaign and click-tracking parameters that never change page content
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "msclkid", "mc_eid", "mc_cid", "_ga", "_gl", "ref", "source",
];

/// Normalizes a URL into its canonical crawl form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not http(s)
/// 2. Lowercase the host
/// 3. Normalize path:
///    - Remove dot segments (. and ..) and repeated slashes
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 4. Remove fragment (everything after #)
/// 5. Remove tracking query parameters and sort the rest
/// 6. Remove empty query string (trailing ?)
///
/// The scheme and any `www.` prefix are preserved: a site reachable only over
/// plain HTTP or only under `www` must stay fetchable. Same-site comparisons go
/// through [`registrable_domain`](crate::url::registrable_domain) instead.
///
/// Normalization is idempotent.
///
/// # Examples
///
/// ```
/// use site_harvester::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.COM/about/#team").unwrap();
/// assert_eq!(url.as_str(), "https://www.example.com/about");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(UrlError::InvalidScheme(format!(
                "business sites must be http(s), got: {}",
                other
            )))
        }
    }

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_ascii_lowercase)
        .ok_or(UrlError::MissingDomain)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("cannot set host {}: {}", host, e)))?;

    let path = canonical_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    let query = canonical_query(&url);
    if query.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(query.iter());
    }

    Ok(url)
}

/// Resolves dot segments, collapses repeated slashes and drops the trailing slash
fn canonical_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." {
            segments.pop();
        } else {
            segments.push(segment);
        }
    }

    format!("/{}", segments.join("/"))
}

/// Query pairs without campaign tracking, sorted by key then value
fn canonical_query(url: &Url) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()) && !key.starts_with("utm_"))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    pairs.sort();
    pairs
}
