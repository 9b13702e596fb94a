//! Founding year and company-history snippets

use super::sentences;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Earliest founding year accepted
pub const EARLIEST_FOUNDED_YEAR: i32 = 1800;

/// Maximum history snippets kept
pub const MAX_HISTORY_SNIPPETS: usize = 5;

static RE_FOUNDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:founded|established|est\.|incorporated|started)(?:[ ]+(?:back[ ]+)?in)?[ ]*(?:in[ ]+)?(\d{4})\b",
    )
    .expect("valid founded regex")
});

static RE_YEARS_IN_BUSINESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,3})\+?[ ]+years[ ]+(?:in[ ]+business|of[ ]+(?:experience[ ]+)?(?:serving|service|business))",
    )
    .expect("valid years-in-business regex")
});

static RE_ANNIVERSARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(\d{1,3})(?:st|nd|rd|th)[ ]+anniversary|celebrating[ ]+(\d{1,3})[ ]+years)")
        .expect("valid anniversary regex")
});

static RE_FAMILY_SINCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bfamily[- ](?:owned|operated)(?:[ ]+(?:and|&)[ ]+(?:owned|operated))?[ ]+since[ ]+(\d{4})\b",
    )
    .expect("valid family-owned regex")
});

const HISTORY_KEYWORDS: &[&str] = &[
    "founded",
    "established",
    "heritage",
    "legacy",
    "history",
    "generation",
    "family-owned",
    "family owned",
    "tradition",
    "our story",
    "began",
    "since 19",
    "since 20",
];

/// When the business was founded and how that was determined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundingInfo {
    pub year: i32,

    /// Phrase the year was derived from
    pub evidence: String,

    pub years_in_business: u32,
}

impl FoundingInfo {
    fn new(year: i32, evidence: &str, current_year: i32) -> Self {
        Self {
            year,
            evidence: evidence.trim().to_string(),
            years_in_business: (current_year - year).max(0) as u32,
        }
    }
}

fn in_range(year: i32, current_year: i32) -> bool {
    (EARLIEST_FOUNDED_YEAR..=current_year).contains(&year)
}

/// First in-range explicit year from a pattern whose group holds a year
fn explicit_year(re: &Regex, text: &str, current_year: i32) -> Option<FoundingInfo> {
    re.captures_iter(text).find_map(|cap| {
        let year: i32 = cap.get(1)?.as_str().parse().ok()?;
        in_range(year, current_year).then(|| FoundingInfo::new(year, &cap[0], current_year))
    })
}

/// First in-range year derived from an age phrase ("35 years")
fn derived_year(re: &Regex, text: &str, current_year: i32) -> Option<FoundingInfo> {
    re.captures_iter(text).find_map(|cap| {
        let age: i32 = cap
            .iter()
            .skip(1)
            .flatten()
            .next()?
            .as_str()
            .parse()
            .ok()?;
        let year = current_year - age;
        (age > 0 && in_range(year, current_year))
            .then(|| FoundingInfo::new(year, &cap[0], current_year))
    })
}

/// Determines the founding year from free text
///
/// Phrasings are tried in order of reliability: an explicit
/// "founded/established YYYY", then "N years in business", then anniversary
/// phrasing, then "family-owned since YYYY". The first match whose year falls
/// between 1800 and `current_year` wins.
pub fn extract_founded(text: &str, current_year: i32) -> Option<FoundingInfo> {
    explicit_year(&RE_FOUNDED, text, current_year)
        .or_else(|| derived_year(&RE_YEARS_IN_BUSINESS, text, current_year))
        .or_else(|| derived_year(&RE_ANNIVERSARY, text, current_year))
        .or_else(|| explicit_year(&RE_FAMILY_SINCE, text, current_year))
}

/// Collects sentences that talk about the company's past
pub fn extract_history_snippets(text: &str) -> Vec<String> {
    let mut snippets: Vec<String> = Vec::new();

    for sentence in sentences(text) {
        if !(20..=400).contains(&sentence.len()) {
            continue;
        }

        let lowered = sentence.to_lowercase();
        if HISTORY_KEYWORDS.iter().any(|k| lowered.contains(k))
            && !snippets.iter().any(|s| s == sentence)
        {
            snippets.push(sentence.to_string());
            if snippets.len() >= MAX_HISTORY_SNIPPETS {
                break;
            }
        }
    }

    snippets
}
