use super::parser::parse_html;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Which fetch tier produced a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    /// Lightweight HTTP client
    Http,

    /// Headless browser
    Browser,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Browser => "browser",
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched page, reduced to title, text and links
///
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// URL as requested
    pub url: String,

    /// URL after redirects
    pub final_url: String,

    pub title: Option<String>,

    /// Raw markup
    pub html: String,

    /// Visible plain text
    pub text: String,

    /// Absolute outbound links
    pub links: Vec<String>,

    /// HTTP status; browser-rendered pages fall back to 200 when the browser reports none
    pub status: u16,

    pub fetched_at: DateTime<Utc>,

    pub method: FetchMethod,
}

impl Page {
    /// Builds a page from fetched markup
    ///
    /// # Arguments
    ///
    /// * `url` - The URL that was requested
    /// * `final_url` - The URL the content was served from; links resolve against it
    /// * `html` - Raw markup
    /// * `status` - HTTP status of the response
    /// * `method` - Fetch tier that produced the markup
    pub fn from_html(
        url: &str,
        final_url: &Url,
        html: String,
        status: u16,
        method: FetchMethod,
    ) -> Self {
        let parsed = parse_html(&html, final_url);

        Self {
            url: url.to_string(),
            final_url: final_url.to_string(),
            title: parsed.title,
            html,
            text: parsed.text,
            links: parsed.links,
            status,
            fetched_at: Utc::now(),
            method,
        }
    }

    /// Size of the raw markup in bytes
    pub fn byte_len(&self) -> usize {
        self.html.len()
    }
}
