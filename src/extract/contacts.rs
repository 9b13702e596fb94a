//! Email and phone harvesting

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Maximum emails kept per business
pub const MAX_EMAILS: usize = 10;

/// Maximum phone numbers kept per business
pub const MAX_PHONES: usize = 5;

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9][a-z0-9._%+-]*@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,}\b")
        .expect("valid email regex")
});

/// Target of a `mailto:` link, up to any `?subject=` query
static RE_MAILTO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']?\s*mailto:([^"'?>\s]+)"#).expect("valid mailto regex")
});

/// NANP-shaped number with optional country code and common separators
static RE_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}").expect("valid phone regex")
});

/// Domains used in templates, docs and tracking snippets
const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "domain.com",
    "yourdomain.com",
    "yoursite.com",
    "yourcompany.com",
    "company.com",
    "email.com",
    "mysite.com",
    "test.com",
    "sentry.io",
    "wixpress.com",
    "sentry-next.wixpress.com",
];

/// Local parts that only ever appear in placeholder text
const PLACEHOLDER_LOCAL_PARTS: &[&str] = &["you", "your", "name", "email", "user", "username"];

/// Asset suffixes that look like email domains (`logo@2x.png`)
const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".bmp", ".ico", ".css", ".js",
];

/// Returns true if a harvested address looks like a real contact email
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.to_lowercase();
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };

    if ASSET_EXTENSIONS.iter().any(|ext| domain.ends_with(ext)) {
        return false;
    }

    if PLACEHOLDER_DOMAINS
        .iter()
        .any(|p| domain == *p || domain.ends_with(&format!(".{}", p)))
    {
        return false;
    }

    !PLACEHOLDER_LOCAL_PARTS.contains(&local)
}

/// Returns true if the text contains at least one plausible email
pub fn contains_email(text: &str) -> bool {
    RE_EMAIL
        .find_iter(text)
        .any(|m| is_plausible_email(m.as_str()))
}

/// The text emails are harvested from: visible text plus `mailto:` targets
///
/// Scripts, styles and other markup are left out, so addresses buried in
/// tracking snippets never count.
pub fn email_haystack(text: &str, html: &str) -> String {
    let mut haystack = text.to_string();
    for cap in RE_MAILTO.captures_iter(html) {
        haystack.push('\n');
        haystack.push_str(&cap[1]);
    }
    haystack
}

/// Harvests deduplicated, lowercased emails in order of appearance
///
/// Placeholder domains and image-name false positives are dropped; at most
/// [`MAX_EMAILS`] are returned.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    RE_EMAIL
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|email| is_plausible_email(email))
        .filter(|email| seen.insert(email.clone()))
        .take(MAX_EMAILS)
        .collect()
}

/// Reduces a phone number to its 10 national digits
///
/// Strips separators and a leading US country code. Returns `None` unless
/// exactly 10 digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let national = match digits.len() {
        10 => digits,
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => return None,
    };

    Some(national)
}

/// Returns true for numbers that cannot be a real business line
///
/// Rejects repeated digits (9 or more of one digit), sequential runs, known
/// test numbers, the 555-01xx fictional range, area codes or exchanges
/// starting with 0 or 1, and N11 service codes as area codes.
///
/// # Examples
///
/// ```
/// use site_harvester::extract::is_fake_phone;
///
/// assert!(is_fake_phone("0000000000"));
/// assert!(is_fake_phone("1234567890"));
/// assert!(!is_fake_phone("4155551234"));
/// ```
pub fn is_fake_phone(digits: &str) -> bool {
    if digits.len() != 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    let bytes = digits.as_bytes();
    let mut counts = [0usize; 10];
    for b in bytes {
        counts[(b - b'0') as usize] += 1;
    }
    if counts.iter().any(|&n| n >= 9) {
        return true;
    }

    const SEQUENTIAL: &[&str] = &["1234567890", "0123456789", "9876543210", "0987654321"];
    const TEST_NUMBERS: &[&str] = &["8005551212", "5551234567", "2345678901"];
    if SEQUENTIAL.contains(&digits) || TEST_NUMBERS.contains(&digits) {
        return true;
    }

    let area = &digits[0..3];
    let exchange = &digits[3..6];
    let line = &digits[6..10];

    if area.starts_with(['0', '1']) || exchange.starts_with(['0', '1']) {
        return true;
    }

    if &area[1..] == "11" {
        return true;
    }

    exchange == "555" && line.starts_with("01")
}

/// Harvests plausible phone numbers as 10-digit strings
///
/// # Arguments
///
/// * `text` - Visible page text
/// * `known` - The business's own listed numbers, in any format; never returned
///
/// # Returns
///
/// Deduplicated numbers in order of appearance, at most [`MAX_PHONES`].
pub fn extract_phones(text: &str, known: &[String]) -> Vec<String> {
    let known: HashSet<String> = known.iter().filter_map(|k| normalize_phone(k)).collect();
    let mut seen = HashSet::new();

    RE_PHONE
        .find_iter(text)
        .filter(|m| !touches_digit(text, m.start(), m.end()))
        .filter_map(|m| normalize_phone(m.as_str()))
        .filter(|phone| !is_fake_phone(phone))
        .filter(|phone| !known.contains(phone))
        .filter(|phone| seen.insert(phone.clone()))
        .take(MAX_PHONES)
        .collect()
}

/// True if the match is glued to a longer digit run
fn touches_digit(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(|c| c.is_ascii_digit()) || after.is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_emails_filters_noise() {
        let text = "Contact Info@Acme-Roofing.com or sales@acme-roofing.com. \
                    Template: you@example.com, name@yourdomain.com. \
                    Images: logo@2x.png hero@3x.webp. Again: info@acme-roofing.com";

        assert_eq!(
            extract_emails(text),
            vec!["info@acme-roofing.com", "sales@acme-roofing.com"]
        );
    }

    #[test]
    fn test_extract_emails_cap() {
        let text: String = (0..25)
            .map(|i| format!("person{}@acme-roofing.com ", i))
            .collect();
        assert_eq!(extract_emails(&text).len(), MAX_EMAILS);
    }

    #[test]
    fn test_email_haystack_uses_text_and_mailto_only() {
        let html = r#"<p>Questions?</p>
            <a href="mailto:Office@AcmeRoofing.com?subject=Quote">Email us</a>
            <script>var support = "tracking@analytics-vendor.io";</script>"#;

        let haystack = email_haystack("Questions?", html);
        assert!(haystack.contains("Office@AcmeRoofing.com"));
        assert!(!haystack.contains("subject"));
        assert!(!haystack.contains("tracking@analytics-vendor.io"));
        assert_eq!(extract_emails(&haystack), vec!["office@acmeroofing.com"]);
    }

    #[test]
    fn test_contains_email() {
        assert!(contains_email("reach us at office@smithplumbing.co.uk"));
        assert!(!contains_email("reach us at you@example.com"));
        assert!(!contains_email("no address here"));
    }

    #[test]
    fn test_is_fake_phone_required_cases() {
        assert!(is_fake_phone("0000000000"));
        assert!(is_fake_phone("1234567890"));
        assert!(is_fake_phone("1111111111"));
        assert!(!is_fake_phone("4155551234"));
    }

    #[test]
    fn test_is_fake_phone_repeated_digits() {
        for d in 0..10 {
            let mut digits = d.to_string().repeat(9);
            digits.push(if d == 7 { '3' } else { '7' });
            assert!(is_fake_phone(&digits), "{}", digits);
        }
        assert!(is_fake_phone("7777777777"));
    }

    #[test]
    fn test_is_fake_phone_other_rules() {
        assert!(is_fake_phone("9876543210"));
        assert!(is_fake_phone("2125550123")); // 555-01xx
        assert!(is_fake_phone("0415551234")); // area starts with 0
        assert!(is_fake_phone("4151551234")); // exchange starts with 1
        assert!(is_fake_phone("9115551234")); // N11 area code
        assert!(is_fake_phone("415555123")); // too short

        assert!(!is_fake_phone("3035552299"));
        assert!(!is_fake_phone("7209341180"));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("(415) 555-1234"), Some("4155551234".to_string()));
        assert_eq!(normalize_phone("+1 415.555.1234"), Some("4155551234".to_string()));
        assert_eq!(normalize_phone("1-415-555-1234"), Some("4155551234".to_string()));
        assert_eq!(normalize_phone("555-1234"), None);
        assert_eq!(normalize_phone("2-415-555-1234"), None);
    }

    #[test]
    fn test_extract_phones_excludes_known_and_fake() {
        let text = "Office: (303) 934-1180. Cell +1 720-934-1181. \
                    Fax 303.934.1180. Demo line 123-456-7890. Since 1987-2024.";
        let known = vec!["303-934-1180".to_string()];

        assert_eq!(extract_phones(text, &known), vec!["7209341181"]);
        assert_eq!(
            extract_phones(text, &[]),
            vec!["3039341180", "7209341181"]
        );
    }

    #[test]
    fn test_extract_phones_line_separated_and_glued() {
        let text = "Main\n303-934-1180\n720-934-1181\nOrder #98303934118012";
        assert_eq!(extract_phones(text, &[]), vec!["3039341180", "7209341181"]);
    }

    #[test]
    fn test_extract_phones_cap() {
        let text: String = (0..10)
            .map(|i| format!("(720) 934-11{:02} ", i + 20))
            .collect();
        assert_eq!(extract_phones(&text, &[]).len(), MAX_PHONES);
    }
}
