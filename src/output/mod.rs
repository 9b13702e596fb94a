//! Output module for run metrics and reports
//!
//! This module handles:
//! - Accumulating run-level metrics during a batch
//! - Printing the end-of-run summary and stored statistics
//! - Writing the markdown run summary

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use stats::{load_statistics, print_statistics, print_summary, StoredStatistics};
pub use summary::{RunMetrics, RunSummary, WORST_DOMAIN_LIMIT};
