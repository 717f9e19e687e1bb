/// Page state definitions for tracking crawl progress
///
/// This module defines every state a URL can be in during a crawl, and the record
/// written for it once its branch finishes.
use serde::Serialize;
use std::fmt;

/// Represents the current state of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    // ===== Active States =====
    /// URL has not been offered to the engine yet
    Unvisited,

    /// A branch owns this URL; its record has not been written yet.
    ///
    /// Also terminal when the run was cancelled before the branch finished.
    Claimed,

    // ===== Terminal States =====
    /// Page was fetched, passed every response matcher and had its links extracted
    Recorded,

    /// Fetch failed after retries; a depth-only record was written
    Failed,

    /// A response matcher rejected the response
    Skipped,

    /// URL was never offered because of the depth bound or the blacklist
    NeverClaimed,
}

impl PageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unvisited => "unvisited",
            Self::Claimed => "claimed",
            Self::Recorded => "recorded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::NeverClaimed => "never_claimed",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final record of a claimed URL
///
/// Written exactly once per claimed URL and never mutated afterwards. A failed fetch
/// produces a partial record with only the URL, depth, parent and error set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub url: String,
    pub depth: u32,
    /// `None` for seeds
    pub parent: Option<String>,
    /// Outgoing links in the order the link extractor returned them
    pub links: Vec<String>,
    pub content: Option<Vec<u8>>,
    /// Why the fetch failed, if it did
    pub error: Option<String>,
}

impl PageRecord {
    /// Record for a page that was fetched and processed
    pub fn fetched(
        url: impl Into<String>,
        depth: u32,
        parent: Option<String>,
        links: Vec<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            url: url.into(),
            depth,
            parent,
            links,
            content: Some(content),
            error: None,
        }
    }

    /// Depth-only record for a page whose fetch failed
    pub fn failed(
        url: impl Into<String>,
        depth: u32,
        parent: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            depth,
            parent,
            links: Vec::new(),
            content: None,
            error: Some(error.into()),
        }
    }

    pub fn state(&self) -> PageState {
        if self.error.is_some() {
            PageState::Failed
        } else {
            PageState::Recorded
        }
    }
}
