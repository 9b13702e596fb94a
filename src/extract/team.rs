//! Staff and leadership extraction

use super::names::{is_valid_person_name, to_title_case};
use crate::crawler::Page;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

/// Maximum team members kept per business
pub const MAX_TEAM_MEMBERS: usize = 20;

/// Capitalized 2-4 token run on a single line
const NAME: &str = r"([A-Z][A-Za-z'’.-]+(?:[ \t]+[A-Z][A-Za-z'’.-]*){1,3})";

/// Job titles, longest alternatives first
const TITLE_WORD: &str = r"(?i:co-?founder|founder|co-?owner|owner|vice[ \t]+president|president|chief[ \t]+[a-z]+[ \t]+officer|ceo|cfo|coo|cto|general[ \t]+manager|office[ \t]+manager|operations[ \t]+manager|project[ \t]+manager|sales[ \t]+manager|service[ \t]+manager|manager|managing[ \t]+partner|partner|director|principal|superintendent|supervisor|foreman|estimator|lead[ \t]+technician|technician|coordinator|administrator|bookkeeper|office[ \t]+administrator)";

/// "John Smith, Owner" / "John Smith - Owner" / name line followed by title line
static RE_NAME_THEN_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    let title = format!(r"({t}(?:[ \t]*(?:&|and|/)[ \t]*{t})?)\b", t = TITLE_WORD);
    Regex::new(&format!(
        r"{name}[ \t]*(?:[,|–—-][ \t]*|\n[ \t]*)(?:(?i:the)[ \t]+)?{title}",
        name = NAME,
        title = title
    ))
    .expect("valid name-title regex")
});

/// "Owner: John Smith" / "Founder John Smith"
static RE_TITLE_THEN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({t})[ \t]*(?:[:,–—-][ \t]*)?{name}",
        t = TITLE_WORD,
        name = NAME
    ))
    .expect("valid title-name regex")
});

/// A line that holds nothing but a short run of words, in any case
static RE_NAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*([A-Za-z][A-Za-z'’.-]+(?:[ \t]+[A-Za-z][A-Za-z'’.-]*){1,3})[ \t]*$")
        .expect("valid name-line regex")
});

/// A person named on the site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub title: Option<String>,

    /// URL of the page the name was found on
    pub source_page: String,
}

/// Finds the longest run of tokens that validates as a person name
///
/// Regex captures often drag in a neighbouring heading word ("Meet John
/// Smith"), so every contiguous window is tried, longest first.
fn best_name(candidate: &str) -> Option<String> {
    let tokens: Vec<&str> = candidate.split_whitespace().collect();

    for len in (2..=tokens.len().min(4)).rev() {
        for window in tokens.windows(len) {
            let joined = window.join(" ");
            if is_valid_person_name(&joined) {
                return Some(to_title_case(&joined));
            }
        }
    }

    None
}

fn clean_title(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let upper = word.to_uppercase();
            if matches!(upper.as_str(), "CEO" | "CFO" | "COO" | "CTO") {
                upper
            } else {
                to_title_case(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collects de-duplicated team members across pages
struct TeamCollector {
    members: Vec<TeamMember>,
    index: HashMap<String, usize>,
}

impl TeamCollector {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.members.len() >= MAX_TEAM_MEMBERS
    }

    fn add(&mut self, name: String, title: Option<String>, source_page: &str) {
        let key = name.to_lowercase();

        if let Some(&i) = self.index.get(&key) {
            if self.members[i].title.is_none() && title.is_some() {
                self.members[i].title = title;
            }
            return;
        }

        if self.is_full() {
            return;
        }

        self.index.insert(key, self.members.len());
        self.members.push(TeamMember {
            name,
            title,
            source_page: source_page.to_string(),
        });
    }
}

/// Extracts team members from harvested pages
///
/// Every page is scanned for names next to job titles. Pages whose URL looks
/// like an about/team/staff page additionally get a looser pass that accepts
/// standalone names. All candidates go through the person-name validator.
/// Results are deduplicated case-insensitively and capped at
/// [`MAX_TEAM_MEMBERS`].
pub fn extract_team(pages: &[Page]) -> Vec<TeamMember> {
    let mut collector = TeamCollector::new();

    for page in pages {
        for cap in RE_NAME_THEN_TITLE.captures_iter(&page.text) {
            if let Some(name) = best_name(&cap[1]) {
                collector.add(name, Some(clean_title(&cap[2])), &page.final_url);
            }
        }

        for cap in RE_TITLE_THEN_NAME.captures_iter(&page.text) {
            if let Some(name) = best_name(&cap[2]) {
                collector.add(name, Some(clean_title(&cap[1])), &page.final_url);
            }
        }

        let team_page = Url::parse(&page.final_url)
            .map(|u| crate::url::is_team_page(&u))
            .unwrap_or(false);

        if team_page {
            for cap in RE_NAME_LINE.captures_iter(&page.text) {
                if let Some(name) = best_name(&cap[1]) {
                    collector.add(name, None, &page.final_url);
                }
            }
        }

        if collector.is_full() {
            break;
        }
    }

    collector.members
}
