//! Depth-Crawler main entry point
//!
//! This is the command-line interface for the depth-bounded concurrent crawler.

use anyhow::Context;
use clap::Parser;
use depth_crawler::config::{read_config_with_hash, validate, BackoffKind, Config};
use depth_crawler::crawler::{CrawlEngine, HtmlContent};
use depth_crawler::output::{print_statistics, CrawlReport, CrawlStatistics};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Depth-Crawler: a concurrent, depth-bounded web crawler
///
/// Crawls outward from the seed URLs up to the configured depth, honoring a host
/// blacklist and a global request rate, and writes a JSON report of every page and
/// host it saw.
#[derive(Parser, Debug)]
#[command(name = "depth-crawler")]
#[command(version)]
#[command(about = "A concurrent, depth-bounded web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Seed URL to start from (repeatable; replaces configured seeds)
    #[arg(short, long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Maximum crawl depth (seeds are depth 0)
    #[arg(short, long)]
    depth: Option<u32>,

    /// Maximum requests per second across all hosts
    #[arg(long)]
    rps: Option<f64>,

    /// Timeout for a single request attempt, in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Retries after the first failed attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Host to blacklist (repeatable; added to configured entries)
    #[arg(long = "bl", value_name = "HOST")]
    blacklist: Vec<String>,

    /// Upstream proxy for all requests
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// Backoff policy between retries
    #[arg(long, value_parser = ["linear", "exponential"])]
    backoff: Option<String>,

    /// Bound on in-flight fetches (0 = unbounded)
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Only record pages served as HTML with status 200
    #[arg(long)]
    html_only: bool,

    /// Where to write the JSON report
    #[arg(short, long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load(&cli)?;
    validate(&config).context("Invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config, config_hash, cli.html_only).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("depth_crawler=info,warn"),
            1 => EnvFilter::new("depth_crawler=debug,info"),
            2 => EnvFilter::new("depth_crawler=trace,debug"),
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

/// Reads the configuration file, if any, and applies command-line overrides
fn load(cli: &Cli) -> anyhow::Result<(Config, Option<String>)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = read_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    if !cli.seeds.is_empty() {
        config.crawler.seeds = cli.seeds.clone();
    }
    if let Some(depth) = cli.depth {
        config.crawler.max_depth = depth;
    }
    if let Some(rps) = cli.rps {
        config.crawler.max_requests_per_second = rps;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.crawler.request_timeout_ms = timeout_ms;
    }
    if let Some(retries) = cli.retries {
        config.crawler.max_retries = retries;
    }
    if let Some(proxy) = &cli.proxy {
        config.crawler.proxy = Some(proxy.clone());
    }
    if let Some(max_concurrent) = cli.max_concurrent {
        config.crawler.max_concurrent_fetches = max_concurrent;
    }
    match cli.backoff.as_deref() {
        Some("linear") => config.backoff.policy = BackoffKind::Linear,
        Some("exponential") => config.backoff.policy = BackoffKind::Exponential,
        _ => {}
    }
    config.blacklist.extend(cli.blacklist.iter().cloned());
    if let Some(report) = &cli.report {
        config.output.report_path = report.display().to_string();
    }

    Ok((config, hash))
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Depth-Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Max requests per second: {}",
        config.crawler.max_requests_per_second
    );
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!("  Max retries: {}", config.crawler.max_retries);
    match config.crawler.max_concurrent_fetches {
        0 => println!("  Concurrent fetches: unbounded"),
        n => println!("  Concurrent fetches: {}", n),
    }
    if let Some(proxy) = &config.crawler.proxy {
        println!("  Proxy: {}", proxy);
    }
    println!("  User agent: {}", config.crawler.user_agent());

    println!("\nBackoff:");
    println!("  Policy: {:?}", config.backoff.policy);
    println!(
        "  Wait: {}ms..{}ms (seed {})",
        config.backoff.min_wait_ms, config.backoff.max_wait_ms, config.backoff.seed
    );

    println!("\nOutput:");
    println!("  Report: {}", config.output.report_path);

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        println!("  - {}", seed);
    }

    println!("\nBlacklisted Hosts ({}):", config.blacklist.len());
    for entry in &config.blacklist {
        println!("  - {}", entry);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: Option<String>,
    html_only: bool,
) -> anyhow::Result<()> {
    let report_path = PathBuf::from(&config.output.report_path);
    let cancel = CancellationToken::new();

    let mut builder = CrawlEngine::builder(config).cancellation_token(cancel.clone());
    if html_only {
        builder = builder.matcher(HtmlContent);
    }
    let engine = Arc::new(builder.build().context("Failed to set up crawler")?);

    // Ctrl-C stops every branch; whatever was recorded still goes into the report
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            cancel.cancel();
        }
    });

    engine.run().await;

    write_report(&engine, config_hash, &report_path)?;
    print_statistics(&CrawlStatistics::from_engine(&engine));

    Ok(())
}

fn write_report(
    engine: &CrawlEngine,
    config_hash: Option<String>,
    path: &Path,
) -> anyhow::Result<()> {
    CrawlReport::from_engine(engine, config_hash)
        .write_json(path)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    println!("✓ Report written to: {}\n", path.display());
    Ok(())
}
