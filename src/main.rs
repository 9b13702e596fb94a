//! Site-Harvester main entry point
//!
//! This is the command-line interface for the business website harvester.

use anyhow::Context;
use clap::Parser;
use site_harvester::config::{load_config_with_hash, Config};
use site_harvester::crawler::{BatchOptions, Coordinator};
use site_harvester::output::{
    load_statistics, print_statistics, print_summary, write_markdown_summary,
};
use site_harvester::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Site-Harvester: crawls business websites and extracts lead signals
///
/// Crawls each eligible business's website with a lightweight HTTP client,
/// escalating to a headless browser for bot challenges and client-rendered
/// pages, then extracts contacts, staff, history and ownership signals.
#[derive(Parser, Debug)]
#[command(name = "site-harvester")]
#[command(version)]
#[command(about = "Business website crawler and signal extractor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Only consider these business ids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    ids: Vec<String>,

    /// Crawl businesses again even if their last crawl succeeded
    #[arg(long)]
    force_recrawl: bool,

    /// Disable the browser tier for this run
    #[arg(long)]
    fast: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and list the businesses that would be crawled
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            ids: self
                .ids
                .iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
            force_recrawl: self.force_recrawl,
            fast_mode: self.fast,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        handle_stats(&config)
    } else {
        let coordinator = Coordinator::new(config.clone(), config_hash, cli.batch_options())
            .context("failed to open business record store")?;

        if cli.dry_run {
            handle_dry_run(&config, &coordinator)
        } else {
            handle_run(&config, &coordinator).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_harvester=info,warn"),
            1 => EnvFilter::new("site_harvester=debug,info"),
            2 => EnvFilter::new("site_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and lists eligible businesses
fn handle_dry_run(config: &Config, coordinator: &Coordinator) -> anyhow::Result<()> {
    println!("=== Site-Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max pages per site: {}",
        config.crawler.effective_max_pages()
    );
    println!(
        "  Concurrent crawls: {}",
        config.crawler.max_concurrent_crawls
    );
    println!(
        "  Browser tier: {}",
        if config.browser.enabled && !config.batch.fast_mode {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Credentials: {}",
        config.rate_limit.credentials.len().max(1)
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Blobs: {}", config.output.blob_dir);
    println!("  Summary: {}", config.output.summary_path);

    let eligible = coordinator.eligible_businesses()?;
    println!("\nEligible Businesses ({}):", eligible.len());
    for business in &eligible {
        println!(
            "  - {} {}",
            business.id,
            business.website.as_deref().unwrap_or_default()
        );
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main batch run
async fn handle_run(config: &Config, coordinator: &Coordinator) -> anyhow::Result<()> {
    let summary = coordinator.run().await.context("batch run failed")?;

    print_summary(&summary);

    let summary_path = Path::new(&config.output.summary_path);
    write_markdown_summary(&summary, summary_path)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;
    tracing::info!("Summary written to {}", summary_path.display());

    Ok(())
}
