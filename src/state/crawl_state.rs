//! Crawl state definitions for one business's site crawl
//!
//! A crawl moves `Seeded -> Crawling` and then ends in exactly one terminal state.

use std::fmt;

/// Represents the current state of a site crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    // ===== Active States =====
    /// Frontier holds only the site's root URL
    Seeded,

    /// Frontier loop is running
    Crawling,

    // ===== Terminal States =====
    /// Enough signal was gathered before the frontier ran out
    EarlyExited,

    /// Page cap reached or frontier empty
    Exhausted,

    /// Too many consecutive failures, or the crawl deadline passed
    Abandoned,
}

impl CrawlState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Seeded | Self::Crawling)
    }

    /// Returns true if the given transition is allowed
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        match self {
            Self::Seeded => matches!(next, Self::Crawling | Self::Abandoned),
            Self::Crawling => next.is_terminal(),
            _ => false,
        }
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Seeded => "seeded",
            Self::Crawling => "crawling",
            Self::EarlyExited => "early_exited",
            Self::Exhausted => "exhausted",
            Self::Abandoned => "abandoned",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "seeded" => Some(Self::Seeded),
            "crawling" => Some(Self::Crawling),
            "early_exited" => Some(Self::EarlyExited),
            "exhausted" => Some(Self::Exhausted),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    /// Returns all possible crawl states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Seeded,
            Self::Crawling,
            Self::EarlyExited,
            Self::Exhausted,
            Self::Abandoned,
        ]
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
