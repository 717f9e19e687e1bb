//! State module for tracking crawl progress
//!
//! This module provides the shared stores that many crawl branches mutate
//! concurrently and that are handed to reporting once the run finishes.
//!
//! # Components
//!
//! - `PageState`: The lifecycle of a single URL (unvisited, claimed, recorded, ...)
//! - `VisitedRegistry`: Exactly-once claim of URLs and their final `PageRecord`s
//! - `HostTelemetryStore`: Per-host network statistics

mod page_state;
mod registry;
mod telemetry;

// Re-export main types
pub use page_state::{PageRecord, PageState};
pub use registry::VisitedRegistry;
pub use telemetry::{HostSummary, HostTelemetry, HostTelemetryStore, Observation};
