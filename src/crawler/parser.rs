//! HTML link extraction
//!
//! This module turns a fetched body into the outgoing links the engine follows.
//!
//! # Link Extraction Rules
//!
//! **Include:**
//! - `<a href="...">` tags, absolute or relative to the current page
//!
//! **Exclude:**
//! - `<a href="..." download>`
//! - `javascript:`, `mailto:`, `tel:` and data URIs
//! - Non-HTTP(S) links, and strings that look absolute but do not parse
//! - Links to blacklisted hosts
//!
//! Results are absolute, fragment-free, deduplicated and sorted.

use crate::url::{extract_host, normalize_link, HostBlacklist};
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// Produces the outgoing links of a fetched page
pub trait LinkExtractor: Send + Sync {
    /// Returns absolute http(s) URLs outside `blacklist`, deduplicated and sorted
    fn extract(&self, blacklist: &HostBlacklist, current: &Url, body: &[u8]) -> Vec<Url>;
}

/// Scans `<a href>` elements with an HTML parser
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLinkExtractor;

impl LinkExtractor for DefaultLinkExtractor {
    fn extract(&self, blacklist: &HostBlacklist, current: &Url, body: &[u8]) -> Vec<Url> {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        let selector = match Selector::parse("a[href]") {
            Ok(selector) => selector,
            Err(_) => return Vec::new(),
        };

        // Keyed by string so output order is deterministic
        let mut links = BTreeMap::new();

        for element in document.select(&selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            let Some(href) = element.value().attr("href") else {
                continue;
            };

            let Some(link) = normalize_link(href, current) else {
                tracing::trace!("Dropping link '{}' on {}", href, current);
                continue;
            };

            let blacklisted = extract_host(&link).map_or(true, |host| blacklist.contains(&host));
            if blacklisted {
                continue;
            }

            links.insert(link.to_string(), link);
        }

        links.into_values().collect()
    }
}
