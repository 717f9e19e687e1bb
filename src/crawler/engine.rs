//! Crawl engine - depth-bounded recursive traversal
//!
//! Every URL goes through the same pipeline:
//!
//! ```text
//! depth check -> claim -> DNS -> rate limit -> fetch (with retries)
//!     -> matchers -> telemetry -> body -> extract links -> record -> recurse
//! ```
//!
//! Each extracted link becomes its own tokio task at `depth + 1`, and a branch only
//! returns once all of its children have returned. The visited registry is the single
//! gate against duplicate fetches: a branch that loses the claim makes no network call.
//!
//! All errors stay inside the branch that hit them. Cancellation is a single token
//! shared by every branch; once it fires, rate limiter waits, requests and backoff
//! sleeps return early and no further records are written.

use crate::config::{validate, Config};
use crate::crawler::fetcher::{RetryClient, RetryClientBuilder};
use crate::crawler::matcher::{first_rejection, AcceptAll, ResponseMatcher};
use crate::crawler::parser::{DefaultLinkExtractor, LinkExtractor};
use crate::crawler::rate_limiter::RateLimiter;
use crate::state::{HostTelemetryStore, Observation, PageRecord, VisitedRegistry};
use crate::url::{connect_port, extract_host, parse_crawlable, HostBlacklist};
use crate::{FetchError, FetchResult};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::{Host, Url};

/// Concurrent crawler over a set of seed URLs
///
/// Construct with [`CrawlEngine::builder`], wrap in an [`Arc`] and call
/// [`CrawlEngine::run`]. Once `run` returns, the registry and telemetry store are
/// complete and can be read through [`CrawlEngine::registry`] and
/// [`CrawlEngine::telemetry`].
pub struct CrawlEngine {
    seeds: Vec<Url>,
    max_depth: u32,
    blacklist: HostBlacklist,
    client: RetryClient,
    rate_limiter: RateLimiter,
    /// Present when in-flight fetches are bounded
    fetch_permits: Option<Semaphore>,
    extractor: Box<dyn LinkExtractor>,
    matchers: Vec<Box<dyn ResponseMatcher>>,
    registry: VisitedRegistry,
    telemetry: HostTelemetryStore,
    cancel: CancellationToken,
}

impl CrawlEngine {
    pub fn builder(config: Config) -> CrawlEngineBuilder {
        CrawlEngineBuilder::new(config)
    }

    /// Crawls every seed at depth 0 and waits for all branches to finish
    pub async fn run(self: &Arc<Self>) {
        tracing::info!(
            "Starting crawl of {} seed(s), max depth {}, {:?} between requests",
            self.seeds.len(),
            self.max_depth,
            self.rate_limiter.interval()
        );
        let started = Instant::now();

        let roots: Vec<JoinHandle<()>> = self
            .seeds
            .iter()
            .map(|seed| tokio::spawn(self.crawl(seed.clone(), 0, None)))
            .collect();
        join_branches(roots).await;

        if self.cancel.is_cancelled() {
            tracing::warn!(
                "Crawl cancelled after {:.2?}; {} URLs claimed so far",
                started.elapsed(),
                self.registry.len()
            );
        } else {
            tracing::info!(
                "Crawl finished in {:.2?}: {} URLs claimed across {} hosts",
                started.elapsed(),
                self.registry.len(),
                self.telemetry.len()
            );
        }
    }

    /// Crawls `url` and, recursively, everything reachable from it within the depth bound
    ///
    /// The returned future resolves after the whole subtree has finished.
    pub fn crawl(
        self: &Arc<Self>,
        url: Url,
        depth: u32,
        parent: Option<Url>,
    ) -> BoxFuture<'static, ()> {
        let engine = Arc::clone(self);

        async move {
            if depth > engine.max_depth || engine.cancel.is_cancelled() {
                return;
            }

            let Some(host) = extract_host(&url) else {
                tracing::warn!("Skipping {}: no host", url);
                return;
            };
            if engine.blacklist.contains(&host) {
                tracing::debug!("Skipping blacklisted {}", url);
                return;
            }

            if !engine.registry.try_claim(url.as_str()) {
                tracing::debug!("Already claimed: {}", url);
                return;
            }

            let Some(links) = engine.visit(&url, &host, depth, parent.as_ref()).await else {
                return;
            };

            if depth >= engine.max_depth {
                return;
            }

            let children: Vec<JoinHandle<()>> = links
                .into_iter()
                .map(|link| tokio::spawn(engine.crawl(link, depth + 1, Some(url.clone()))))
                .collect();
            join_branches(children).await;
        }
        .boxed()
    }

    /// Fetches and records one claimed URL, returning the links to follow
    ///
    /// Returns `None` whenever the branch ends here: failure, rejection or cancellation.
    async fn visit(
        &self,
        url: &Url,
        host: &str,
        depth: u32,
        parent: Option<&Url>,
    ) -> Option<Vec<Url>> {
        let key = url.as_str();
        let parent = parent.map(Url::to_string);

        let dns_addrs = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            resolved = resolve_host(url, host) => match resolved {
                Ok(addrs) => addrs,
                Err(e) => {
                    tracing::warn!("{}", e);
                    return None;
                }
            },
        };

        let _permit = self.acquire_fetch_permit().await?;

        if self.rate_limiter.wait(&self.cancel).await.is_err() {
            tracing::debug!("Cancelled while waiting to fetch {}", url);
            return None;
        }

        let started = Instant::now();
        let response = match self.client.get(url, &self.cancel).await {
            Ok(response) => response,
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Cancelled while fetching {}", url);
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to fetch {}: {}", url, e);
                self.registry
                    .record(key, PageRecord::failed(key, depth, parent, e.to_string()));
                return None;
            }
        };
        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(matcher) = first_rejection(&self.matchers, &response) {
            tracing::debug!(
                "Skipping {} (HTTP {}): rejected by {}",
                url,
                response.status().as_u16(),
                matcher
            );
            self.registry.mark_skipped(key);
            return None;
        }

        let remote_addr = response.remote_addr().map(|addr| addr.ip().to_string());
        self.telemetry.observe(
            host,
            Observation {
                remote_addr: remote_addr.as_deref(),
                dns_addrs: &dns_addrs,
                path: url.path(),
                response_time_ms,
            },
        );

        let body = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            body = response.bytes() => body,
        };
        let body = match body {
            Ok(body) => body,
            Err(source) => {
                let e = FetchError::Body {
                    url: key.to_string(),
                    source,
                };
                tracing::error!("{}", e);
                self.registry
                    .record(key, PageRecord::failed(key, depth, parent, e.to_string()));
                return None;
            }
        };

        let links = self.extractor.extract(&self.blacklist, url, &body);

        if self.cancel.is_cancelled() {
            return None;
        }

        tracing::info!(
            "Visited {} (depth {}, {} links, {} ms)",
            url,
            depth,
            links.len(),
            response_time_ms
        );
        self.registry.record(
            key,
            PageRecord::fetched(
                key,
                depth,
                parent,
                links.iter().map(Url::to_string).collect(),
                body.to_vec(),
            ),
        );

        Some(links)
    }

    /// Waits for a fetch slot when fetches are bounded
    ///
    /// The outer `None` means the branch was cancelled while waiting.
    async fn acquire_fetch_permit(&self) -> Option<Option<SemaphorePermit<'_>>> {
        let Some(permits) = &self.fetch_permits else {
            return Some(None);
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = permits.acquire() => permit.ok().map(Some),
        }
    }

    pub fn registry(&self) -> &VisitedRegistry {
        &self.registry
    }

    pub fn telemetry(&self) -> &HostTelemetryStore {
        &self.telemetry
    }

    pub fn seeds(&self) -> &[Url] {
        &self.seeds
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn blacklist(&self) -> &HostBlacklist {
        &self.blacklist
    }

    /// Token that stops the whole crawl when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Joins spawned branches, logging any that panicked
async fn join_branches(handles: Vec<JoinHandle<()>>) {
    for result in join_all(handles).await {
        if let Err(e) = result {
            tracing::error!("Crawl task failed: {}", e);
        }
    }
}

/// Resolves the addresses of `host` for telemetry
///
/// IP literals resolve to themselves without a lookup.
async fn resolve_host(url: &Url, host: &str) -> FetchResult<Vec<String>> {
    match url.host() {
        Some(Host::Ipv4(ip)) => return Ok(vec![ip.to_string()]),
        Some(Host::Ipv6(ip)) => return Ok(vec![ip.to_string()]),
        _ => {}
    }

    let addrs = tokio::net::lookup_host((host, connect_port(url)))
        .await
        .map_err(|source| FetchError::Dns {
            host: host.to_string(),
            source,
        })?;

    let unique: BTreeSet<String> = addrs.map(|addr| addr.ip().to_string()).collect();
    Ok(unique.into_iter().collect())
}

/// Builder for [`CrawlEngine`]
///
/// The configuration is validated in [`CrawlEngineBuilder::build`], before any
/// network activity.
pub struct CrawlEngineBuilder {
    config: Config,
    client: Option<RetryClient>,
    extractor: Box<dyn LinkExtractor>,
    matchers: Vec<Box<dyn ResponseMatcher>>,
    cancel: CancellationToken,
}

impl CrawlEngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: None,
            extractor: Box::new(DefaultLinkExtractor),
            matchers: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `client` instead of one built from the configuration
    pub fn retry_client(mut self, client: RetryClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn link_extractor(mut self, extractor: impl LinkExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Appends a matcher; matchers run in the order they were added
    pub fn matcher(mut self, matcher: impl ResponseMatcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> crate::Result<CrawlEngine> {
        let config = self.config;
        validate(&config)?;

        let seeds = config
            .crawler
            .seeds
            .iter()
            .map(|seed| parse_crawlable(seed))
            .collect::<Result<Vec<_>, _>>()?;

        let client = match self.client {
            Some(client) => client,
            None => RetryClientBuilder::from_config(&config).build()?,
        };

        let mut matchers = self.matchers;
        if matchers.is_empty() {
            tracing::warn!("No response matchers configured; accepting every response");
            matchers.push(Box::new(AcceptAll));
        }

        let fetch_permits = match config.crawler.max_concurrent_fetches {
            0 => None,
            n => Some(Semaphore::new(n)),
        };

        Ok(CrawlEngine {
            seeds,
            max_depth: config.crawler.max_depth,
            blacklist: HostBlacklist::new(&config.blacklist),
            client,
            rate_limiter: RateLimiter::new(config.crawler.max_requests_per_second),
            fetch_permits,
            extractor: self.extractor,
            matchers,
            registry: VisitedRegistry::new(),
            telemetry: HostTelemetryStore::new(),
            cancel: self.cancel,
        })
    }
}
