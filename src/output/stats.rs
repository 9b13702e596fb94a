//! Console statistics
//!
//! This module prints the end-of-run summary and the stored counts shown by
//! `--stats`.

use crate::output::RunSummary;
use crate::storage::{RunRecord, Storage, StorageResult};

/// Counts read back from the business record store
#[derive(Debug, Clone)]
pub struct StoredStatistics {
    /// Total number of businesses on file
    pub businesses: u64,

    /// Businesses whose latest crawl succeeded
    pub crawled: u64,

    /// Businesses whose latest crawl failed
    pub failed: u64,

    pub latest_run: Option<RunRecord>,
}

impl StoredStatistics {
    /// Businesses never crawled
    pub fn pending(&self) -> u64 {
        self.businesses.saturating_sub(self.crawled + self.failed)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<StoredStatistics> {
    Ok(StoredStatistics {
        businesses: storage.count_businesses()?,
        crawled: storage.count_crawled()?,
        failed: storage.count_failed()?,
        latest_run: storage.get_latest_run()?,
    })
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Prints stored statistics to stdout
pub fn print_statistics(stats: &StoredStatistics) {
    println!("=== Business Statistics ===\n");

    println!("Businesses:");
    println!("  Total: {}", stats.businesses);
    println!(
        "  Crawled successfully: {} ({:.1}%)",
        stats.crawled,
        percent(stats.crawled, stats.businesses)
    );
    println!(
        "  Last crawl failed: {} ({:.1}%)",
        stats.failed,
        percent(stats.failed, stats.businesses)
    );
    println!("  Never crawled: {}", stats.pending());
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run #{} ({}):", run.id, run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!(
                "  Processed: {} (succeeded {}, failed {}, skipped {})",
                run.processed, run.succeeded, run.failed, run.skipped
            );
            println!(
                "  Pages: {} ({} http, {} browser), {} bytes",
                run.pages, run.http_pages, run.browser_pages, run.bytes
            );
        }
        None => println!("No runs recorded yet."),
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    let metrics = &summary.metrics;

    println!("=== Run #{} Summary ===\n", summary.run_id);

    if summary.fast_mode {
        println!("Browser tier disabled (fast mode)\n");
    }

    println!("Businesses:");
    println!("  Processed: {}", metrics.processed);
    println!(
        "  Succeeded: {} ({:.1}%)",
        metrics.succeeded,
        metrics.success_rate()
    );
    println!("  Failed: {}", metrics.failed);
    println!("  Skipped (unhealthy domain): {}", metrics.skipped);
    println!();

    println!("Pages:");
    println!("  Total: {} ({} bytes)", metrics.pages, metrics.bytes);
    println!("  Via HTTP: {}", metrics.http_pages);
    println!("  Via browser: {}", metrics.browser_pages);
    println!();

    if !summary.failures_by_kind.is_empty() {
        println!("Failures by Type ({}):", summary.total_failures());
        let mut kinds: Vec<_> = summary.failures_by_kind.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1));
        for (kind, count) in kinds {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if !summary.failures_by_code.is_empty() {
        println!("Failures by Code:");
        let mut codes: Vec<_> = summary.failures_by_code.iter().collect();
        codes.sort_by(|a, b| b.1.cmp(a.1));
        for (code, count) in codes {
            println!("  {}: {}", code, count);
        }
        println!();
    }

    if !summary.worst_domains.is_empty() {
        println!("Worst Domains:");
        for stat in &summary.worst_domains {
            println!(
                "  {}: {}/{} failed ({:.0}%){}",
                stat.domain,
                stat.failed,
                stat.attempted,
                stat.failure_rate() * 100.0,
                stat.dominant_error()
                    .map(|kind| format!(", mostly {}", kind))
                    .unwrap_or_default()
            );
        }
    }
}
