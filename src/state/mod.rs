//! State module for tracking crawl progress and failures
//!
//! # Components
//!
//! - `CrawlState`: Lifecycle of one business's site crawl
//! - `CrawlError` / `ErrorKind`: Classified fetch failures and retry/escalation rules
//! - `DomainHealthTracker`: Per-domain success statistics (soft circuit breaker)
//! - `FailureTracker`: Run-wide failure histograms for reporting
//!
//! Trackers are run-scoped: a batch run constructs fresh instances and passes
//! them down to every crawl.

mod crawl_state;
mod domain_state;
mod error;
mod failure_tracker;

// Re-export main types
pub use crawl_state::CrawlState;
pub use domain_state::{DomainHealthTracker, DomainStat};
pub use error::{classify_message, classify_status, CrawlError, ErrorKind};
pub use failure_tracker::FailureTracker;
