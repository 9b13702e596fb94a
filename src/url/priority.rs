//! Ordering of discovered URLs so content-rich pages are visited first

use url::Url;

/// Priority tiers (lower is visited earlier)
pub const PRIORITY_HIGH: u32 = 0;
pub const PRIORITY_MEDIUM: u32 = 10;
pub const PRIORITY_ROOT: u32 = 5;
pub const PRIORITY_DEFAULT: u32 = 20;
pub const PRIORITY_LOW: u32 = 30;

/// Path keywords of pages most likely to carry contacts, staff or history
const HIGH_VALUE_KEYWORDS: &[&str] = &[
    "about",
    "contact",
    "team",
    "staff",
    "our-people",
    "people",
    "leadership",
    "management",
    "meet",
    "who-we-are",
    "our-story",
    "history",
    "company",
    "owner",
    "founder",
    "bio",
];

/// Keywords of pages that occasionally carry signals
const MEDIUM_VALUE_KEYWORDS: &[&str] = &[
    "careers", "jobs", "join", "hiring", "news", "press", "testimonials", "locations", "services",
];

/// Keywords of pages that rarely carry signals
const LOW_VALUE_KEYWORDS: &[&str] = &[
    "blog", "privacy", "terms", "policy", "cookie", "sitemap", "faq", "gallery", "portfolio",
    "tag", "category", "author", "archive",
];

/// Returns the visit priority of a URL based on its path
pub fn path_priority(url: &Url) -> u32 {
    let path = url.path().to_lowercase();

    if path == "/" {
        return PRIORITY_ROOT;
    }

    if HIGH_VALUE_KEYWORDS.iter().any(|k| path.contains(k)) {
        PRIORITY_HIGH
    } else if MEDIUM_VALUE_KEYWORDS.iter().any(|k| path.contains(k)) {
        PRIORITY_MEDIUM
    } else if LOW_VALUE_KEYWORDS.iter().any(|k| path.contains(k)) {
        PRIORITY_LOW
    } else {
        PRIORITY_DEFAULT
    }
}

/// Returns true if the URL looks like an about/team/staff page
pub fn is_team_page(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    [
        "about",
        "team",
        "staff",
        "people",
        "leadership",
        "who-we-are",
        "our-story",
        "meet",
        "management",
    ]
    .iter()
    .any(|k| path.contains(k))
}

/// Sorts URLs so high-value paths come first
///
/// The sort is stable: URLs of equal priority keep their discovery order.
pub fn prioritize(mut urls: Vec<Url>) -> Vec<Url> {
    urls.sort_by_key(path_priority);
    urls
}
