use url::Url;

/// Second-level labels under which registrations happen one level deeper
/// (e.g. `smith-plumbing.co.uk`).
const MULTI_PART_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "me.uk", "ltd.uk", "plc.uk", "ac.uk", "gov.uk", "com.au", "net.au",
    "org.au", "co.nz", "org.nz", "co.za", "com.br", "com.mx", "co.jp", "co.in", "com.sg",
];

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_harvester::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Reduces a host to its registrable domain
///
/// `www.shop.example.com` and `example.com` both reduce to `example.com`;
/// `smith.co.uk` stays `smith.co.uk`. IP addresses and single-label hosts
/// (e.g. `localhost`) are returned unchanged.
///
/// # Examples
///
/// ```
/// use site_harvester::url::registrable_domain;
///
/// assert_eq!(registrable_domain("www.Example.com"), "example.com");
/// assert_eq!(registrable_domain("blog.smith.co.uk"), "smith.co.uk");
/// assert_eq!(registrable_domain("127.0.0.1"), "127.0.0.1");
/// ```
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
        return host;
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }

    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if MULTI_PART_SUFFIXES.contains(&last_two.as_str()) {
        3
    } else {
        2
    };

    labels[labels.len() - keep..].join(".")
}

/// Returns true if `url` belongs to the same registrable domain as `target_domain`
pub fn is_same_site(url: &Url, target_domain: &str) -> bool {
    match url.host_str() {
        Some(host) => registrable_domain(host) == target_domain,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_registrable_domain_strips_subdomains() {
        assert_eq!(registrable_domain("example.com"), "example.com");
        assert_eq!(registrable_domain("www.example.com"), "example.com");
        assert_eq!(registrable_domain("api.v2.example.com"), "example.com");
        assert_eq!(registrable_domain("example.com."), "example.com");
    }

    #[test]
    fn test_registrable_domain_multi_part_suffix() {
        assert_eq!(registrable_domain("smith.co.uk"), "smith.co.uk");
        assert_eq!(registrable_domain("www.smith.co.uk"), "smith.co.uk");
        assert_eq!(registrable_domain("shop.jones.com.au"), "jones.com.au");
    }

    #[test]
    fn test_registrable_domain_hosts_without_suffix() {
        assert_eq!(registrable_domain("localhost"), "localhost");
        assert_eq!(registrable_domain("127.0.0.1"), "127.0.0.1");
    }

    #[test]
    fn test_is_same_site() {
        let target = registrable_domain("www.acme-roofing.com");
        let same = Url::parse("https://acme-roofing.com/about").unwrap();
        let sub = Url::parse("https://blog.acme-roofing.com/post").unwrap();
        let other = Url::parse("https://facebook.com/acme").unwrap();
        let lookalike = Url::parse("https://notacme-roofing.com/").unwrap();

        assert!(is_same_site(&same, &target));
        assert!(is_same_site(&sub, &target));
        assert!(!is_same_site(&other, &target));
        assert!(!is_same_site(&lookalike, &target));
    }
}
