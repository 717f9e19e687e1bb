//! JSON crawl report
//!
//! The report holds the run parameters, per-host network information and a
//! per-page summary. Page content is never serialized.

use crate::crawler::CrawlEngine;
use crate::state::{HostSummary, PageRecord, PageState};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Structured report of one crawl run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub seeds: Vec<String>,
    pub max_depth: u32,
    /// Sorted, including derived `www.` twins
    pub blacklist: Vec<String>,
    /// SHA-256 of the configuration file, when one was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    pub generated_at: String,
    pub cancelled: bool,
    pub network_info: BTreeMap<String, HostSummary>,
    pub page_info: BTreeMap<String, PageSummary>,
}

/// Serializable view of a [`PageRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub depth: u32,
    pub state: PageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&PageRecord> for PageSummary {
    fn from(record: &PageRecord) -> Self {
        Self {
            depth: record.depth,
            state: record.state(),
            parent: record.parent.clone(),
            links: record.links.clone(),
            error: record.error.clone(),
        }
    }
}

impl CrawlReport {
    /// Snapshots the engine's registries
    ///
    /// Meant to be called once [`CrawlEngine::run`] has returned.
    pub fn from_engine(engine: &CrawlEngine, config_hash: Option<String>) -> Self {
        let page_info = engine
            .registry()
            .records()
            .into_iter()
            .map(|(url, record)| (url, PageSummary::from(record.as_ref())))
            .collect();

        Self {
            seeds: engine.seeds().iter().map(|seed| seed.to_string()).collect(),
            max_depth: engine.max_depth(),
            blacklist: engine.blacklist().patterns(),
            config_hash,
            generated_at: Utc::now().to_rfc3339(),
            cancelled: engine.cancellation_token().is_cancelled(),
            network_info: engine.telemetry().summaries(),
            page_info,
        }
    }

    /// Writes the report as pretty-printed JSON to `path`
    pub fn write_json(&self, path: &Path) -> crate::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::info!(
            "Wrote report for {} pages and {} hosts to {}",
            self.page_info.len(),
            self.network_info.len(),
            path.display()
        );
        Ok(())
    }
}
