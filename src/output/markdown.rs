//! Markdown run summary
//!
//! Renders the end-of-run summary as a markdown report: run metadata,
//! business and page counts, failure histograms and the worst domains.

use crate::output::RunSummary;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run to `output_path`
///
/// # Arguments
///
/// * `summary` - The run summary data
/// * `output_path` - Path where the markdown file should be written
pub fn write_markdown_summary(summary: &RunSummary, output_path: &Path) -> std::io::Result<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let metrics = &summary.metrics;
    let mut md = String::new();

    md.push_str("# Site-Harvester Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = summary.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    if summary.fast_mode {
        md.push_str("- **Mode**: fast (browser tier disabled)\n");
    }
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    md.push_str("## Businesses\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Processed | {} |\n", metrics.processed));
    md.push_str(&format!("| Succeeded | {} |\n", metrics.succeeded));
    md.push_str(&format!("| Failed | {} |\n", metrics.failed));
    md.push_str(&format!("| Skipped | {} |\n\n", metrics.skipped));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        metrics.success_rate()
    ));

    md.push_str("## Pages\n\n");
    md.push_str(&format!("- **Total Pages**: {}\n", metrics.pages));
    md.push_str(&format!("- **Total Bytes**: {}\n", metrics.bytes));
    md.push_str(&format!("- **Via HTTP**: {}\n", metrics.http_pages));
    md.push_str(&format!("- **Via Browser**: {}\n\n", metrics.browser_pages));

    if !summary.failures_by_kind.is_empty() {
        md.push_str("## Failures by Type\n\n");
        md.push_str("| Error Type | Count |\n");
        md.push_str("|------------|-------|\n");

        for (kind, count) in &summary.failures_by_kind {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    if !summary.failures_by_code.is_empty() {
        md.push_str("## Failures by Code\n\n");
        md.push_str("| Code | Count |\n");
        md.push_str("|------|-------|\n");

        for (code, count) in &summary.failures_by_code {
            md.push_str(&format!("| {} | {} |\n", code, count));
        }
        md.push('\n');
    }

    if !summary.worst_domains.is_empty() {
        md.push_str("## Worst Domains\n\n");
        md.push_str("| Domain | Attempts | Failures | Failure Rate | Main Error |\n");
        md.push_str("|--------|----------|----------|--------------|------------|\n");

        for stat in &summary.worst_domains {
            md.push_str(&format!(
                "| {} | {} | {} | {:.0}% | {} |\n",
                stat.domain,
                stat.attempted,
                stat.failed,
                stat.failure_rate() * 100.0,
                stat.dominant_error()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "-".to_string())
            ));
        }
        md.push('\n');
    }

    md
}
