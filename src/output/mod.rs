//! Output module for generating crawl summaries and reports
//!
//! This module handles:
//! - Writing the JSON crawl report
//! - Printing run statistics

mod report;
pub mod stats;

pub use report::{CrawlReport, PageSummary};
pub use stats::{print_statistics, CrawlStatistics};
