//! Registry of every URL the crawl has claimed
//!
//! The registry is the single point of truth for "should this branch fetch this URL":
//! [`VisitedRegistry::try_claim`] inserts a marker atomically, so of any number of
//! branches discovering the same URL concurrently exactly one wins the claim.

use crate::state::{PageRecord, PageState};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Visit {
    Claimed,
    Skipped,
    Recorded(Arc<PageRecord>),
}

/// Concurrent map of absolute URL to its claim marker or final record
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    pages: DashMap<String, Visit>,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `url` for the calling branch
    ///
    /// Returns `true` if this call inserted the claim marker, `false` if the URL was
    /// already present in any state. Check and insert happen under the same shard
    /// lock, so two concurrent callers can never both see `true`.
    pub fn try_claim(&self, url: &str) -> bool {
        match self.pages.entry(url.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(Visit::Claimed);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Replaces the claim marker of `url` with its final record
    ///
    /// Called at most once per claimed URL. Recording a URL that was never claimed,
    /// or recording twice, leaves the existing entry untouched and returns `false`.
    pub fn record(&self, url: &str, record: PageRecord) -> bool {
        match self.pages.get_mut(url) {
            Some(mut visit) if matches!(*visit, Visit::Claimed) => {
                *visit = Visit::Recorded(Arc::new(record));
                true
            }
            _ => {
                tracing::warn!("Ignoring record for {}: not in claimed state", url);
                false
            }
        }
    }

    /// Marks a claimed URL whose response was rejected by a matcher
    pub fn mark_skipped(&self, url: &str) -> bool {
        match self.pages.get_mut(url) {
            Some(mut visit) if matches!(*visit, Visit::Claimed) => {
                *visit = Visit::Skipped;
                true
            }
            _ => false,
        }
    }

    /// Returns the record for `url`, if one has been written
    pub fn lookup(&self, url: &str) -> Option<Arc<PageRecord>> {
        self.pages.get(url).and_then(|visit| match &*visit {
            Visit::Recorded(record) => Some(Arc::clone(record)),
            _ => None,
        })
    }

    /// Returns the current state of `url`
    pub fn state(&self, url: &str) -> PageState {
        match self.pages.get(url).as_deref() {
            None => PageState::Unvisited,
            Some(Visit::Claimed) => PageState::Claimed,
            Some(Visit::Skipped) => PageState::Skipped,
            Some(Visit::Recorded(record)) => record.state(),
        }
    }

    /// Number of URLs claimed so far, recorded or not
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Counts URLs per state
    pub fn count_by_state(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for visit in self.pages.iter() {
            let state = match visit.value() {
                Visit::Claimed => PageState::Claimed,
                Visit::Skipped => PageState::Skipped,
                Visit::Recorded(record) => record.state(),
            };
            *counts.entry(state.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Copies all written records, ordered by URL
    ///
    /// Intended for after the run has finished, when the registry is read-only.
    pub fn records(&self) -> BTreeMap<String, Arc<PageRecord>> {
        self.pages
            .iter()
            .filter_map(|visit| match visit.value() {
                Visit::Recorded(record) => Some((visit.key().clone(), Arc::clone(record))),
                _ => None,
            })
            .collect()
    }
}
