//! HTML parser for reducing fetched markup to a page
//!
//! This module handles parsing HTML content to extract:
//! - Page title
//! - Visible plain text (for extraction and the expansion threshold)
//! - Links to follow (from <a> tags and canonical links)

use scraper::{Html, Node, Selector};
use url::Url;

/// Elements whose text is never visible content
const NON_CONTENT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head", "svg"];

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Visible text, one text node per line
    pub text: String,

    /// All links found on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts title, text and links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only anchors
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
///
/// # Example
///
/// ```
/// use site_harvester::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        text: extract_text(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts visible text, skipping scripts, styles and the document head
fn extract_text(document: &Html) -> String {
    let mut lines = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| NON_CONTENT_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            lines.push(collapsed);
        }
    }

    lines.join("\n")
}

/// Collects anchor and canonical hrefs in document order, resolved against the page URL
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href], link[rel='canonical'][href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Resolves a link href to an absolute URL
///
/// Returns None for special schemes, fragment-only anchors, invalid URLs
/// and non-HTTP(S) URLs after resolution.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    let lowered = href.to_ascii_lowercase();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if ["javascript:", "mailto:", "tel:", "data:", "sms:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> Url {
        Url::parse("https://acmeroofing.com/services/").unwrap()
    }

    #[test]
    fn test_title_trimmed() {
        let html = "<html><head><title>\n  Acme Roofing | Home  </title></head></html>";
        assert_eq!(parse_html(html, &home()).title.as_deref(), Some("Acme Roofing | Home"));
    }

    #[test]
    fn test_blank_or_missing_title() {
        assert_eq!(parse_html("<html><head></head></html>", &home()).title, None);
        assert_eq!(parse_html("<title>   </title>", &home()).title, None);
    }

    #[test]
    fn test_text_skips_scripts_and_head() {
        let html = r#"
            <html>
            <head><title>Acme</title><style>body { color: red; }</style></head>
            <body>
                <h1>About   Acme</h1>
                <script>var tracking = "nope";</script>
                <p>Family owned since 1962.</p>
                <noscript>Enable JavaScript</noscript>
            </body>
            </html>
        "#;
        let parsed = parse_html(html, &home());
        assert_eq!(parsed.text, "About Acme\nFamily owned since 1962.");
    }

    #[test]
    fn test_links_resolved_against_page() {
        let html = r#"<nav><a href="/about-us">About</a><a href="gutters">Gutters</a>
            <a href="https://facebook.com/acmeroofing">FB</a></nav>"#;
        assert_eq!(
            parse_html(html, &home()).links,
            vec![
                "https://acmeroofing.com/about-us",
                "https://acmeroofing.com/services/gutters",
                "https://facebook.com/acmeroofing",
            ]
        );
    }

    #[test]
    fn test_non_navigable_links_dropped() {
        let html = r##"
            <a href="javascript:void(0)">Menu</a>
            <a href="MAILTO:office@acmeroofing.com">Email</a>
            <a href="tel:+14155551234">Call</a>
            <a href="sms:+14155551234">Text</a>
            <a href="#quote">Get a quote</a>
            <a href="/brochure.pdf" download>Brochure</a>
            <a href="  /contact  ">Contact</a>
        "##;
        assert_eq!(
            parse_html(html, &home()).links,
            vec!["https://acmeroofing.com/contact"]
        );
    }

    #[test]
    fn test_canonical_link_collected() {
        let html = r#"<head><link rel="canonical" href="https://www.acmeroofing.com/services"></head>"#;
        assert_eq!(
            parse_html(html, &home()).links,
            vec!["https://www.acmeroofing.com/services"]
        );
    }
}
