//! Statistics generation from a finished crawl
//!
//! This module provides functionality for summarizing the visited registry and
//! host telemetry once a run is over.

use crate::crawler::CrawlEngine;
use crate::state::PageState;
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Total number of URLs claimed
    pub total_urls: usize,

    /// Count of URLs by state
    pub pages_by_state: BTreeMap<&'static str, usize>,

    /// Number of hosts with at least one accepted response
    pub unique_hosts: usize,

    /// Total number of outgoing links across recorded pages
    pub total_links: usize,

    /// Record count per depth
    pub depth_breakdown: BTreeMap<u32, usize>,

    /// URLs whose fetch failed, sorted
    pub failed_urls: Vec<String>,

    /// Whether the run was cancelled before finishing
    pub cancelled: bool,
}

impl CrawlStatistics {
    /// Collects statistics from the engine's registries
    pub fn from_engine(engine: &CrawlEngine) -> Self {
        let registry = engine.registry();
        let mut depth_breakdown = BTreeMap::new();
        let mut total_links = 0;
        let mut failed_urls = Vec::new();

        for (url, record) in registry.records() {
            *depth_breakdown.entry(record.depth).or_insert(0) += 1;
            total_links += record.links.len();
            if record.state() == PageState::Failed {
                failed_urls.push(url);
            }
        }

        Self {
            total_urls: registry.len(),
            pages_by_state: registry.count_by_state(),
            unique_hosts: engine.telemetry().len(),
            total_links,
            depth_breakdown,
            failed_urls,
            cancelled: engine.cancellation_token().is_cancelled(),
        }
    }

    fn count(&self, state: PageState) -> usize {
        self.pages_by_state.get(state.as_str()).copied().unwrap_or(0)
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    if stats.cancelled {
        println!("Run was cancelled; results are partial.\n");
    }

    println!("Overview:");
    println!("  Total URLs claimed: {}", stats.total_urls);
    println!("  Unique hosts: {}", stats.unique_hosts);
    println!("  Total links found: {}", stats.total_links);
    println!();

    println!("Pages by State:");
    // Sort states by count (descending)
    let mut state_counts: Vec<_> = stats.pages_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (state, count) in state_counts {
        let percentage = if stats.total_urls > 0 {
            (*count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Records by Depth:");
        for (depth, count) in &stats.depth_breakdown {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    if !stats.failed_urls.is_empty() {
        println!("Failed URLs ({}):", stats.failed_urls.len());
        for url in &stats.failed_urls {
            println!("  - {}", url);
        }
        println!();
    }

    let recorded = stats.count(PageState::Recorded);
    let success_rate = if stats.total_urls > 0 {
        (recorded as f64 / stats.total_urls as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} URLs successfully recorded)",
        success_rate, recorded, stats.total_urls
    );
}
