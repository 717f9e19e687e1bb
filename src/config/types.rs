use serde::Deserialize;
use std::time::Duration;

/// User-Agent sent with every request unless overridden in the config
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

/// Main configuration structure for Depth-Crawler
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub backoff: BackoffConfig,
    pub output: OutputConfig,
    /// Hosts that are never fetched nor followed ("*." prefix matches subdomains)
    pub blacklist: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// URLs crawled at depth 0
    pub seeds: Vec<String>,

    /// Maximum depth to crawl from seed URLs (seeds are depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Global request rate limit
    #[serde(rename = "max-requests-per-second")]
    pub max_requests_per_second: f64,

    /// Timeout applied to each individual HTTP attempt (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Retries after the first attempt of a request
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Upper bound on concurrent fetches, 0 leaves fan-out unbounded
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: usize,

    /// Upstream proxy for all requests
    pub proxy: Option<String>,

    /// User-Agent header override
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            max_depth: 10,
            max_requests_per_second: 15.0,
            request_timeout_ms: 5_000,
            max_retries: 3,
            max_concurrent_fetches: 0,
            proxy: None,
            user_agent: None,
        }
    }
}

/// Which backoff curve the retry client follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Linear,
    Exponential,
}

/// Retry backoff configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub policy: BackoffKind,

    /// Lower bound of the wait, also the width of the jitter range (milliseconds)
    #[serde(rename = "min-wait-ms")]
    pub min_wait_ms: u64,

    /// Upper bound of the wait before jitter (milliseconds)
    #[serde(rename = "max-wait-ms")]
    pub max_wait_ms: u64,

    /// Seed for the jitter random source
    pub seed: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            policy: BackoffKind::Exponential,
            min_wait_ms: 1_000,
            max_wait_ms: 10_000,
            seed: 3230,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the JSON crawl report
    #[serde(rename = "report-path")]
    pub report_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: "crawler_report.json".to_string(),
        }
    }
}
