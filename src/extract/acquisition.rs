//! Ownership-change signals: acquisitions, sales, mergers, rebrands

use crate::crawler::Page;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Maximum acquisition signals kept per business
pub const MAX_SIGNALS: usize = 10;

/// Characters searched on each side of a match for an associated year
const YEAR_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Acquired,
    Sold,
    Merger,
    NewOwnership,
    Rebranded,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquired => "acquired",
            Self::Sold => "sold",
            Self::Merger => "merger",
            Self::NewOwnership => "new_ownership",
            Self::Rebranded => "rebranded",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static RE_ACQUIRED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:acquired[ \t]+by|(?:has|have)[ \t]+acquired|acquisition[ \t]+(?:of|by)|is[ \t]+now[ \t]+(?:a[ \t]+)?part[ \t]+of)\b")
        .expect("valid acquired regex")
});
static RE_SOLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:sold[ \t]+(?:the|our|his|her|their)[ \t]+(?:business|company)|sold[ \t]+to)\b")
        .expect("valid sold regex")
});
static RE_MERGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:merged[ \t]+with|merger[ \t]+(?:with|of|between)|(?:has|have)[ \t]+merged)\b")
        .expect("valid merger regex")
});
static RE_NEW_OWNERSHIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:under[ \t]+new[ \t]+ownership|new[ \t]+owners?|new[ \t]+management|took[ \t]+over[ \t]+(?:the[ \t]+)?(?:business|company|ownership)|purchased[ \t]+(?:the[ \t]+)?(?:business|company))\b")
        .expect("valid new-ownership regex")
});
static RE_REBRANDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:rebranded|formerly[ \t]+known[ \t]+as|now[ \t]+known[ \t]+as|changed[ \t]+(?:our|its|their)[ \t]+name)\b")
        .expect("valid rebranded regex")
});

static RE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").expect("valid year regex"));

const SIGNAL_PATTERNS: &[(SignalType, &LazyLock<Regex>)] = &[
    (SignalType::Acquired, &RE_ACQUIRED),
    (SignalType::Sold, &RE_SOLD),
    (SignalType::Merger, &RE_MERGER),
    (SignalType::NewOwnership, &RE_NEW_OWNERSHIP),
    (SignalType::Rebranded, &RE_REBRANDED),
];

/// Evidence that the business changed hands or names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSignal {
    /// Text surrounding the match
    pub text: String,
    pub signal_type: SignalType,
    pub year: Option<i32>,
    pub source_page: String,
}

/// Byte range of up to `radius` bytes either side of `start..end`, on char boundaries
fn window(text: &str, start: usize, end: usize, radius: usize) -> (usize, usize) {
    let mut lo = start.saturating_sub(radius);
    while !text.is_char_boundary(lo) {
        lo -= 1;
    }

    let mut hi = (end + radius).min(text.len());
    while !text.is_char_boundary(hi) {
        hi += 1;
    }

    (lo, hi)
}

/// Year nearest to the match inside the surrounding window
fn nearest_year(window: &str, matched: (usize, usize), current_year: i32) -> Option<i32> {
    let (start, end) = matched;
    RE_YEAR
        .find_iter(window)
        .filter_map(|m| {
            let year: i32 = m.as_str().parse().ok()?;
            let distance = if m.start() >= end {
                m.start() - end
            } else {
                start.saturating_sub(m.end())
            };
            (year <= current_year).then_some((distance, year))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, year)| year)
}

/// Finds ownership-change phrasing across harvested pages
///
/// Each match carries the surrounding text and, when a 4-digit year appears
/// within 100 characters of it, that year. Identical signals repeated across
/// pages (footers, sidebars) are reported once. At most [`MAX_SIGNALS`] are
/// returned.
pub fn extract_acquisition_signals(pages: &[Page], current_year: i32) -> Vec<AcquisitionSignal> {
    let mut signals = Vec::new();
    let mut seen = HashSet::new();

    for page in pages {
        let text = page.text.as_str();

        for (signal_type, regex) in SIGNAL_PATTERNS {
            for m in regex.find_iter(text) {
                let (lo, hi) = window(text, m.start(), m.end(), YEAR_WINDOW);
                let context = &text[lo..hi];
                let snippet = context.split_whitespace().collect::<Vec<_>>().join(" ");

                if !seen.insert((*signal_type, snippet.to_lowercase())) {
                    continue;
                }

                signals.push(AcquisitionSignal {
                    year: nearest_year(context, (m.start() - lo, m.end() - lo), current_year),
                    text: snippet,
                    signal_type: *signal_type,
                    source_page: page.final_url.clone(),
                });

                if signals.len() >= MAX_SIGNALS {
                    return signals;
                }
            }
        }
    }

    signals
}
