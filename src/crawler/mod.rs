//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Global request rate limiting
//! - HTTP fetching with pluggable retry and backoff policies
//! - Response filtering and HTML link extraction
//! - Overall crawl coordination through [`CrawlEngine`]

mod engine;
mod fetcher;
mod matcher;
mod parser;
mod rate_limiter;
mod retry;

pub use engine::{CrawlEngine, CrawlEngineBuilder};
pub use fetcher::{build_http_client, RetryClient, RetryClientBuilder, DEFAULT_MAX_RETRIES};
pub use matcher::{
    first_rejection, AcceptAll, ClientErrorStatus, HtmlContent, OkStatus, ResponseMatcher,
    ServerErrorStatus, TextContent,
};
pub use parser::{DefaultLinkExtractor, LinkExtractor};
pub use rate_limiter::RateLimiter;
pub use retry::{
    BackoffPolicy, DefaultRetryPolicy, ExponentialBackoff, LinearBackoff, RetryPolicy,
    DEFAULT_JITTER_SEED,
};
