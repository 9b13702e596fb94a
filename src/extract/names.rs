//! Person-name validation and normalization

use std::collections::HashSet;
use std::sync::LazyLock;

/// Common US first names; the first token of a candidate must be one of these
const FIRST_NAMES: &[&str] = &[
    "aaron", "abby", "abigail", "adam", "adrian", "aidan", "alan", "albert", "alex", "alexa",
    "alexander", "alexandra", "alexis", "alfred", "alice", "alicia", "alison", "allen", "allison",
    "alyssa", "amanda", "amber", "amy", "andrea", "andrew", "andy", "angela", "angie", "anita",
    "ann", "anna", "anne", "annie", "anthony", "april", "arthur", "ashley", "audrey", "austin",
    "barbara", "barry", "becky", "ben", "benjamin", "bernard", "beth", "betty", "beverly", "bill",
    "billy", "blake", "bob", "bobby", "bonnie", "brad", "bradley", "brandon", "brenda", "brent",
    "brett", "brian", "bridget", "brittany", "brooke", "bruce", "bryan", "caleb", "calvin",
    "cameron", "carl", "carlos", "carol", "caroline", "carolyn", "carrie", "casey", "catherine",
    "cathy", "chad", "charles", "charlie", "charlotte", "chelsea", "cheryl", "chris", "christian",
    "christina", "christine", "christopher", "chuck", "cindy", "claire", "clara", "clark",
    "claudia", "clayton", "clifford", "cody", "colin", "colleen", "connie", "connor", "courtney",
    "craig", "crystal", "curtis", "cynthia", "dakota", "dale", "dan", "dana", "daniel",
    "danielle", "danny", "darlene", "darren", "dave", "david", "dawn", "dean", "debbie", "deborah",
    "debra", "denise", "dennis", "derek", "diana", "diane", "dianne", "dolores", "don", "donald",
    "donna", "doris", "dorothy", "doug", "douglas", "drew", "dustin", "dylan", "earl", "ed",
    "eddie", "edward", "eileen", "elaine", "eleanor", "elena", "eli", "elijah", "elizabeth",
    "ellen", "emily", "emma", "eric", "erica", "erik", "erin", "ernest", "ethan", "eugene", "eva",
    "evan", "evelyn", "frances", "francis", "frank", "fred", "frederick", "gabriel", "gail",
    "gary", "gavin", "gene", "george", "gerald", "gina", "glen", "glenn", "gloria", "grace",
    "grant", "greg", "gregory", "hailey", "hannah", "harold", "harry", "heather", "helen", "henry",
    "holly", "howard", "ian", "isaac", "isabella", "jack", "jackie", "jacob", "jacqueline",
    "jake", "james", "jamie", "jan", "jane", "janet", "janice", "jared", "jason", "jay", "jean",
    "jeff", "jeffrey", "jenna", "jennifer", "jenny", "jeremy", "jerry", "jesse", "jessica", "jill",
    "jim", "jimmy", "jo", "joan", "joann", "joanne", "jodi", "joe", "joel", "john", "johnny",
    "jon", "jonathan", "jordan", "jose", "joseph", "josh", "joshua", "joy", "joyce", "juan",
    "judith", "judy", "julia", "julie", "justin", "karen", "kate", "katherine", "kathleen",
    "kathryn", "kathy", "katie", "kayla", "keith", "kelly", "ken", "kenneth", "kevin", "kim",
    "kimberly", "kristen", "kristin", "kurt", "kyle", "lance", "larry", "laura", "lauren",
    "lawrence", "leah", "lee", "leo", "leonard", "leslie", "linda", "lindsay", "lisa", "logan",
    "lori", "louis", "lucas", "lucy", "luis", "luke", "lynn", "madison", "malcolm", "mandy",
    "marc", "marcus", "margaret", "maria", "marie", "marilyn", "mark", "marsha", "martha",
    "martin", "marvin", "mary", "mason", "matt", "matthew", "maureen", "max", "megan", "melanie",
    "melissa", "michael", "michelle", "miguel", "mike", "mildred", "mitchell", "molly", "monica",
    "morgan", "nancy", "natalie", "nathan", "neil", "nicholas", "nick", "nicole", "noah", "norma",
    "norman", "olivia", "owen", "pam", "pamela", "pat", "patricia", "patrick", "paul", "paula",
    "peggy", "penny", "peter", "phil", "philip", "phillip", "phyllis", "rachel", "ralph", "randy",
    "ray", "raymond", "rebecca", "regina", "renee", "rhonda", "rich", "richard", "rick", "ricky",
    "rita", "rob", "robert", "roberta", "robin", "rodney", "roger", "ron", "ronald", "rose",
    "ross", "roy", "ruby", "russell", "ruth", "ryan", "sally", "sam", "samantha", "samuel",
    "sandra", "sandy", "sara", "sarah", "scott", "sean", "seth", "shane", "shannon", "sharon",
    "shawn", "sheila", "shelly", "sherry", "shirley", "sophia", "spencer", "stacy", "stanley",
    "stephanie", "stephen", "steve", "steven", "sue", "susan", "suzanne", "sydney", "tammy",
    "tara", "taylor", "ted", "terry", "theresa", "thomas", "tim", "timothy", "tina", "todd",
    "tom", "tommy", "tony", "tracy", "travis", "trevor", "troy", "tyler", "valerie", "vanessa",
    "vernon", "veronica", "vicki", "victor", "victoria", "vincent", "virginia", "walter", "wanda",
    "warren", "wayne", "wendy", "wesley", "whitney", "william", "willie", "zach", "zachary",
];

/// Words that show up capitalized in headings and buttons but are never names
const NAME_BLACKLIST: &[&str] = &[
    "about", "us", "our", "team", "staff", "contact", "home", "services", "service", "click",
    "here", "read", "more", "learn", "call", "today", "now", "free", "estimate", "quote", "get",
    "view", "all", "see", "the", "and", "of", "for", "with", "your", "we", "meet", "company",
    "inc", "llc", "co", "corp", "group", "roofing", "plumbing", "heating", "cooling", "hvac",
    "electric", "construction", "solutions", "street", "st", "avenue", "ave", "road",
    "rd", "suite", "drive", "county", "city", "north", "south", "east", "west", "privacy",
    "policy", "terms", "copyright", "rights", "reserved", "menu", "search", "login", "sign",
    "facebook", "twitter", "instagram", "linkedin", "youtube", "google", "reviews", "review",
    "testimonials", "gallery", "blog", "news", "careers", "jobs", "apply", "submit", "send",
    "message", "phone", "email", "fax", "address", "hours", "monday", "tuesday", "wednesday",
    "thursday", "friday", "saturday", "sunday", "january", "february", "march", "july",
    "august", "september", "october", "november", "december",
];

static FIRST_NAME_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| FIRST_NAMES.iter().copied().collect());

static BLACKLIST_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| NAME_BLACKLIST.iter().copied().collect());

/// Returns true if every character is a letter, apostrophe, hyphen or period
fn is_name_token(token: &str) -> bool {
    token.chars().any(char::is_alphabetic)
        && token
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, '\'' | '’' | '-' | '.'))
}

/// Checks whether a candidate string is a plausible person name
///
/// The candidate must have 2 to 4 letter-like tokens, open with a known first
/// name, contain no blacklisted word, and end in a token of at least two
/// characters.
///
/// # Examples
///
/// ```
/// use site_harvester::extract::is_valid_person_name;
///
/// assert!(is_valid_person_name("John Smith"));
/// assert!(!is_valid_person_name("Click Here"));
/// ```
pub fn is_valid_person_name(candidate: &str) -> bool {
    let tokens: Vec<&str> = candidate.split_whitespace().collect();
    if !(2..=4).contains(&tokens.len()) {
        return false;
    }

    if !tokens.iter().all(|t| is_name_token(t)) {
        return false;
    }

    let lowered: Vec<String> = tokens
        .iter()
        .map(|t| t.trim_end_matches('.').to_lowercase())
        .collect();

    if !FIRST_NAME_SET.contains(lowered[0].as_str()) {
        return false;
    }

    if lowered.iter().any(|t| BLACKLIST_SET.contains(t.as_str())) {
        return false;
    }

    tokens
        .last()
        .is_some_and(|last| last.trim_end_matches('.').chars().count() >= 2)
}

/// Title-cases a person name
///
/// Handles apostrophes (`o'brien` -> `O'Brien`), `Mc` and `Mac` prefixes
/// (`mcdonald` -> `McDonald`, `macarthur` -> `MacArthur`), hyphenated parts
/// and single-letter initials (`j.` -> `J.`).
pub fn to_title_case(name: &str) -> String {
    name.split_whitespace()
        .map(title_case_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_token(token: &str) -> String {
    if token.contains('-') {
        return token
            .split('-')
            .map(title_case_token)
            .collect::<Vec<_>>()
            .join("-");
    }

    let lower = token.to_lowercase();

    // Initials
    if lower.trim_end_matches('.').chars().count() <= 1 {
        return lower.to_uppercase();
    }

    for apostrophe in ['\'', '’'] {
        if let Some((head, tail)) = lower.split_once(apostrophe) {
            if !tail.is_empty() {
                return format!("{}{}{}", capitalize(head), apostrophe, capitalize(tail));
            }
        }
    }

    if let Some(rest) = lower.strip_prefix("mc") {
        if !rest.is_empty() {
            return format!("Mc{}", capitalize(rest));
        }
    }

    // Short "mac" words (Mack, Macy) are ordinary names
    if let Some(rest) = lower.strip_prefix("mac") {
        if lower.chars().count() >= 6 {
            return format!("Mac{}", capitalize(rest));
        }
    }

    capitalize(&lower)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
