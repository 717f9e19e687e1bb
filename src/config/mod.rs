//! Configuration module for Depth-Crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so a file only needs to name its seeds.
//!
//! # Example
//!
//! ```no_run
//! use depth_crawler::config::{read_config_with_hash, validate};
//! use std::path::Path;
//!
//! let (config, _hash) = read_config_with_hash(Path::new("crawler.toml")).unwrap();
//! validate(&config).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BackoffConfig, BackoffKind, Config, CrawlerConfig, OutputConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, parse_config, read_config_with_hash};
pub use validation::validate;
