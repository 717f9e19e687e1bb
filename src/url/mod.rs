//! URL handling module for Depth-Crawler
//!
//! This module provides host extraction, link resolution and the host blacklist.

mod domain;
mod matcher;
mod normalize;

pub use domain::{connect_port, extract_host};
pub use matcher::{matches_wildcard, HostBlacklist};
pub use normalize::{normalize_link, parse_crawlable};
