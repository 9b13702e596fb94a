//! Employee-count estimation

use super::sentences;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Smallest count accepted as a headcount
pub const MIN_HEADCOUNT: u32 = 2;

/// Largest count accepted as a headcount
pub const MAX_HEADCOUNT: u32 = 10_000;

/// Maximum new-hire sentences kept
pub const MAX_NEW_HIRE_MENTIONS: usize = 5;

const NUM: &str = r"(\d{1,3}(?:,\d{3})+|\d{1,5})";
const STAFF_NOUN: &str = r"(?:full[- ]time[ ]+)?(?:employees|staff(?:[ ]+members)?|team[ ]+members|people|workers|technicians|professionals)";

/// Single-count phrasings; group 1 is the count
static SINGLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"(?i)\bteam[ ]+of[ ]+(?:over[ ]+|more[ ]+than[ ]+)?{}\b", NUM),
        format!(
            r"(?i)\bemploy(?:s|ing)?[ ]+(?:over[ ]+|more[ ]+than[ ]+|nearly[ ]+|about[ ]+|approximately[ ]+)?{}\b",
            NUM
        ),
        format!(
            r"(?i)\b(?:over|more[ ]+than|nearly|about|approximately|almost)[ ]+{}\+?[ ]+{}",
            NUM, STAFF_NOUN
        ),
        format!(r"(?i)\b{}[- ]person[ ]+(?:team|crew|staff|company|operation)", NUM),
        format!(r"(?i)\b{}\+?[ ]+{}\b", NUM, STAFF_NOUN),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid headcount regex"))
    .collect()
});

/// "10-20 employees"; the upper bound is used
static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{num}[ ]*(?:-|–|to)[ ]*{num}\+?[ ]+{noun}",
        num = NUM,
        noun = STAFF_NOUN
    ))
    .expect("valid headcount range regex")
});

const NEW_HIRE_KEYWORDS: &[&str] = &[
    "welcome our newest",
    "welcomes our newest",
    "please welcome",
    "new hire",
    "newest member",
    "newest team member",
    "recently joined",
    "has joined our team",
    "joined our team",
    "join our team",
    "we're hiring",
    "we are hiring",
    "now hiring",
];

/// The chosen employee count and the phrase it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadcountEstimate {
    pub count: u32,
    pub evidence: String,
}

fn parse_count(raw: &str) -> Option<u32> {
    raw.replace(',', "")
        .parse::<u32>()
        .ok()
        .filter(|n| (MIN_HEADCOUNT..=MAX_HEADCOUNT).contains(n))
}

/// Estimates the company's headcount from free text
///
/// Every phrasing is matched across the whole text. Candidates are keyed by
/// the position of their number, so one phrase matched by two patterns counts
/// once. The most frequent count wins and ties go to the larger count.
///
/// # Examples
///
/// ```
/// use site_harvester::extract::estimate_headcount;
///
/// let text = "We are a team of 12. Our team of 12 serves Denver. Over 8 employees on call.";
/// assert_eq!(estimate_headcount(text).map(|e| e.count), Some(12));
/// ```
pub fn estimate_headcount(text: &str) -> Option<HeadcountEstimate> {
    // number offset -> (count, evidence)
    let mut candidates: BTreeMap<usize, (u32, String)> = BTreeMap::new();

    // Lower bounds of ranges are never candidates on their own
    let mut range_lower_bounds = Vec::new();

    for cap in RANGE_PATTERN.captures_iter(text) {
        let (Some(lower), Some(upper), Some(whole)) = (cap.get(1), cap.get(2), cap.get(0)) else {
            continue;
        };
        range_lower_bounds.push(lower.start());
        if let Some(count) = parse_count(upper.as_str()) {
            candidates.insert(upper.start(), (count, whole.as_str().trim().to_string()));
        }
    }

    for pattern in SINGLE_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            let (Some(num), Some(whole)) = (cap.get(1), cap.get(0)) else {
                continue;
            };
            if range_lower_bounds.contains(&num.start()) {
                continue;
            }
            if let Some(count) = parse_count(num.as_str()) {
                candidates
                    .entry(num.start())
                    .or_insert_with(|| (count, whole.as_str().trim().to_string()));
            }
        }
    }

    let mut frequency: HashMap<u32, usize> = HashMap::new();
    for (count, _) in candidates.values() {
        *frequency.entry(*count).or_default() += 1;
    }

    let (&best, _) = frequency
        .iter()
        .max_by(|(a_count, a_freq), (b_count, b_freq)| {
            a_freq.cmp(b_freq).then(a_count.cmp(b_count))
        })?;

    let evidence = candidates
        .values()
        .find(|(count, _)| *count == best)
        .map(|(_, evidence)| evidence.clone())
        .unwrap_or_default();

    Some(HeadcountEstimate {
        count: best,
        evidence,
    })
}

/// Collects sentences that announce hires or openings
pub fn extract_new_hire_mentions(text: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();

    for sentence in sentences(text) {
        let lowered = sentence.to_lowercase();
        if NEW_HIRE_KEYWORDS.iter().any(|k| lowered.contains(k))
            && !mentions.iter().any(|m| m.eq_ignore_ascii_case(sentence))
        {
            mentions.push(sentence.to_string());
            if mentions.len() >= MAX_NEW_HIRE_MENTIONS {
                break;
            }
        }
    }

    mentions
}
