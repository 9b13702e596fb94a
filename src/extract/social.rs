//! Social profile links and contact-page discovery

use crate::crawler::Page;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

static RE_LINKEDIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?\b(?:[a-z]{2,3}\.)?linkedin\.com/(?:company|in|school)/([A-Za-z0-9_.%-]+)")
        .expect("valid linkedin regex")
});
static RE_FACEBOOK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?\b(?:www\.|m\.)?(?:facebook|fb)\.com/([A-Za-z0-9_.-]+)")
        .expect("valid facebook regex")
});
static RE_INSTAGRAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?\b(?:www\.)?instagram\.com/([A-Za-z0-9_.]+)")
        .expect("valid instagram regex")
});
static RE_TWITTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?\b(?:www\.)?(?:twitter|x)\.com/([A-Za-z0-9_]+)")
        .expect("valid twitter regex")
});

/// Path segments that are not profiles
const LINKEDIN_SKIP: &[&str] = &["shareArticle", "share", "sharing"];
const FACEBOOK_SKIP: &[&str] = &[
    "photo",
    "photos",
    "sharer",
    "sharer.php",
    "share",
    "events",
    "groups",
    "watch",
    "marketplace",
    "login",
    "dialog",
    "plugins",
    "tr",
    "policies",
];
const INSTAGRAM_SKIP: &[&str] = &[
    "p", "reel", "reels", "stories", "explore", "accounts", "tv", "s", "share",
];
const TWITTER_SKIP: &[&str] = &["intent", "share", "hashtag", "search", "i", "home", "widgets"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Platform {
    LinkedIn,
    Facebook,
    Instagram,
    Twitter,
}

struct SocialPattern {
    platform: Platform,
    regex: &'static LazyLock<Regex>,
    skip_segments: &'static [&'static str],

    /// Purely numeric segments are namespace years (`facebook.com/2008/fbml`), not handles
    skip_numeric: bool,
}

const SOCIAL_PATTERNS: &[SocialPattern] = &[
    SocialPattern {
        platform: Platform::LinkedIn,
        regex: &RE_LINKEDIN,
        skip_segments: LINKEDIN_SKIP,
        skip_numeric: false,
    },
    SocialPattern {
        platform: Platform::Facebook,
        regex: &RE_FACEBOOK,
        skip_segments: FACEBOOK_SKIP,
        skip_numeric: true,
    },
    SocialPattern {
        platform: Platform::Instagram,
        regex: &RE_INSTAGRAM,
        skip_segments: INSTAGRAM_SKIP,
        skip_numeric: false,
    },
    SocialPattern {
        platform: Platform::Twitter,
        regex: &RE_TWITTER,
        skip_segments: TWITTER_SKIP,
        skip_numeric: false,
    },
];

/// First profile URL found per platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
}

impl SocialLinks {
    fn slot(&mut self, platform: Platform) -> &mut Option<String> {
        match platform {
            Platform::LinkedIn => &mut self.linkedin,
            Platform::Facebook => &mut self.facebook,
            Platform::Instagram => &mut self.instagram,
            Platform::Twitter => &mut self.twitter,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.linkedin.is_none()
            && self.facebook.is_none()
            && self.instagram.is_none()
            && self.twitter.is_none()
    }
}

/// Scans page markup for social profile links
///
/// Pages are scanned in crawl order and the first valid match per platform
/// wins. Share buttons, post permalinks and similar non-profile paths are
/// skipped.
pub fn extract_social_links(pages: &[Page]) -> SocialLinks {
    let mut links = SocialLinks::default();

    for page in pages {
        for pattern in SOCIAL_PATTERNS {
            if links.slot(pattern.platform).is_some() {
                continue;
            }

            let found = pattern.regex.captures_iter(&page.html).find_map(|cap| {
                let handle = cap.get(1)?.as_str();
                if pattern
                    .skip_segments
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(handle))
                {
                    return None;
                }
                if pattern.skip_numeric && handle.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                Some(canonical_profile_url(cap.get(0)?.as_str()))
            });

            if found.is_some() {
                *links.slot(pattern.platform) = found;
            }
        }

        if links.linkedin.is_some()
            && links.facebook.is_some()
            && links.instagram.is_some()
            && links.twitter.is_some()
        {
            break;
        }
    }

    links
}

/// Adds a scheme to protocol-less matches
fn canonical_profile_url(raw: &str) -> String {
    if raw.to_lowercase().starts_with("http") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    }
}

/// Returns the URL of the first harvested page that looks like a contact page
pub fn find_contact_page(pages: &[Page]) -> Option<String> {
    pages
        .iter()
        .find(|page| {
            Url::parse(&page.final_url)
                .map(|u| {
                    let path = u.path().to_lowercase();
                    path.contains("contact") || path.contains("get-in-touch")
                })
                .unwrap_or(false)
        })
        .map(|page| page.final_url.clone())
}
