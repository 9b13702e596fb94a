//! Heuristic signal extraction over harvested pages
//!
//! Runs once per business after its crawl finishes. Every extractor is a pure
//! function of page content, so results are reproducible from stored raw
//! pages.

mod acquisition;
mod contacts;
mod headcount;
mod history;
mod names;
mod social;
mod team;

pub use acquisition::{extract_acquisition_signals, AcquisitionSignal, SignalType, MAX_SIGNALS};
pub use contacts::{
    contains_email, email_haystack, extract_emails, extract_phones, is_fake_phone, is_plausible_email,
    normalize_phone, MAX_EMAILS, MAX_PHONES,
};
pub use headcount::{
    estimate_headcount, extract_new_hire_mentions, HeadcountEstimate, MAX_HEADCOUNT,
    MIN_HEADCOUNT,
};
pub use history::{extract_founded, extract_history_snippets, FoundingInfo, MAX_HISTORY_SNIPPETS};
pub use names::{is_valid_person_name, to_title_case};
pub use social::{extract_social_links, find_contact_page, SocialLinks};
pub use team::{extract_team, TeamMember, MAX_TEAM_MEMBERS};

use crate::crawler::Page;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Structured signals derived from one business's pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub social: SocialLinks,
    pub contact_page: Option<String>,
    pub team: Vec<TeamMember>,
    pub headcount: Option<u32>,
    pub headcount_evidence: Option<String>,
    pub new_hire_mentions: Vec<String>,
    pub acquisition_signals: Vec<AcquisitionSignal>,
    pub founded_year: Option<i32>,
    pub founded_evidence: Option<String>,
    pub years_in_business: Option<u32>,
    pub history_snippets: Vec<String>,
}

impl ExtractedData {
    /// Number of populated signal groups, for run statistics
    pub fn signal_count(&self) -> usize {
        [
            !self.emails.is_empty(),
            !self.phones.is_empty(),
            !self.social.is_empty(),
            self.contact_page.is_some(),
            !self.team.is_empty(),
            self.headcount.is_some(),
            !self.acquisition_signals.is_empty(),
            self.founded_year.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// Runs every extractor over a business's pages, dated to the current year
///
/// # Arguments
///
/// * `pages` - Pages harvested for the business, in crawl order
/// * `known_phones` - Numbers already on file; they are not reported again
pub fn extract_all(pages: &[Page], known_phones: &[String]) -> ExtractedData {
    extract_all_at(pages, known_phones, Utc::now().year())
}

/// Runs every extractor with an explicit current year
pub fn extract_all_at(pages: &[Page], known_phones: &[String], current_year: i32) -> ExtractedData {
    let text = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let email_text = pages
        .iter()
        .map(|p| email_haystack(&p.text, &p.html))
        .collect::<Vec<_>>()
        .join("\n");

    let headcount = estimate_headcount(&text);
    let founding = extract_founded(&text, current_year);

    ExtractedData {
        emails: extract_emails(&email_text),
        phones: extract_phones(&text, known_phones),
        social: extract_social_links(pages),
        contact_page: find_contact_page(pages),
        team: extract_team(pages),
        headcount: headcount.as_ref().map(|h| h.count),
        headcount_evidence: headcount.map(|h| h.evidence),
        new_hire_mentions: extract_new_hire_mentions(&text),
        acquisition_signals: extract_acquisition_signals(pages, current_year),
        founded_year: founding.as_ref().map(|f| f.year),
        years_in_business: founding.as_ref().map(|f| f.years_in_business),
        founded_evidence: founding.map(|f| f.evidence),
        history_snippets: extract_history_snippets(&text),
    }
}

/// Splits text into trimmed sentences
///
/// Lines are split first, then at `.`, `!` or `?` followed by whitespace.
pub(crate) fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();

    for line in text.lines() {
        let mut start = 0;
        let mut chars = line.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            let at_break = matches!(c, '.' | '!' | '?')
                && chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_break {
                let end = i + c.len_utf8();
                let sentence = line[start..end].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = end;
            }
        }

        let rest = line[start..].trim();
        if !rest.is_empty() {
            out.push(rest);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchMethod;
    use url::Url;

    fn page(url: &str, html: &str) -> Page {
        Page::from_html(
            url,
            &Url::parse(url).unwrap(),
            html.to_string(),
            200,
            FetchMethod::Http,
        )
    }

    #[test]
    fn test_sentences() {
        assert_eq!(
            sentences("One. Two! Three?\nFour v1.2 here"),
            vec!["One.", "Two!", "Three?", "Four v1.2 here"]
        );
        assert!(sentences("  \n ").is_empty());
    }

    #[test]
    fn test_extract_all() {
        let pages = vec![
            page(
                "https://acmeroofing.com/",
                r#"<html><body>
                   <h1>Acme Roofing</h1>
                   <p>Family-owned since 1975. We are a team of 12 roofers.</p>
                   <p>Call (303) 934-1180 or (720) 934-1181.</p>
                   <a href="mailto:office@acmeroofing.com">Email us</a>
                   <a href="https://www.facebook.com/AcmeRoofing">Facebook</a>
                   </body></html>"#,
            ),
            page(
                "https://acmeroofing.com/about-us",
                r#"<html><body>
                   <p>Acme Roofing was established in 1998.</p>
                   <p>John Smith, Owner</p>
                   <p>Our team of 12 has roofed over 3,000 homes.</p>
                   <p>In 2021 we merged with Peak Gutters.</p>
                   </body></html>"#,
            ),
            page("https://acmeroofing.com/contact", "<p>Contact us</p>"),
        ];

        let data = extract_all_at(&pages, &["303-934-1180".to_string()], 2025);

        assert_eq!(data.emails, vec!["office@acmeroofing.com"]);
        assert_eq!(data.phones, vec!["7209341181"]);
        assert_eq!(
            data.social.facebook.as_deref(),
            Some("https://www.facebook.com/AcmeRoofing")
        );
        assert_eq!(data.contact_page.as_deref(), Some("https://acmeroofing.com/contact"));
        assert_eq!(data.team.len(), 1);
        assert_eq!(data.team[0].name, "John Smith");
        assert_eq!(data.headcount, Some(12));
        assert_eq!(data.founded_year, Some(1998));
        assert_eq!(data.years_in_business, Some(27));
        assert_eq!(data.acquisition_signals.len(), 1);
        assert_eq!(data.acquisition_signals[0].year, Some(2021));
        assert!(!data.history_snippets.is_empty());
        assert_eq!(data.signal_count(), 8);
    }

    #[test]
    fn test_extract_all_empty() {
        let data = extract_all(&[], &[]);
        assert_eq!(data, ExtractedData::default());
        assert_eq!(data.signal_count(), 0);
    }
}
