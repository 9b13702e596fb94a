//! URL handling module for Site-Harvester
//!
//! This module provides URL normalization, registrable-domain scoping,
//! non-content skip rules, and path-based visit prioritization.

mod domain;
mod filter;
mod normalize;
mod priority;

pub use domain::{extract_domain, is_same_site, registrable_domain};
pub use filter::should_skip;
pub use normalize::normalize_url;
pub use priority::{
    is_team_page, path_priority, prioritize, PRIORITY_DEFAULT, PRIORITY_HIGH, PRIORITY_LOW,
    PRIORITY_MEDIUM, PRIORITY_ROOT,
};
