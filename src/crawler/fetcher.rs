//! Retrying HTTP client
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent, timeout and proxy
//! - Repeating transient failures per a pluggable [`RetryPolicy`]
//! - Waiting between attempts per a pluggable [`BackoffPolicy`]
//! - Aborting promptly on cancellation
//!
//! Only idempotent GET requests are issued, so replaying a request is always safe.

use crate::config::{BackoffKind, Config, DEFAULT_USER_AGENT};
use crate::crawler::retry::{
    BackoffPolicy, DefaultRetryPolicy, ExponentialBackoff, LinearBackoff, RetryPolicy,
};
use crate::{FetchError, FetchResult};
use reqwest::{redirect::Policy, Client, Proxy, Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default lower bound for backoff waits
const DEFAULT_MIN_WAIT: Duration = Duration::from_secs(1);

/// Default upper bound for backoff waits
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// Default per-attempt timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum redirect hops followed for a single attempt
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - Value of the User-Agent header sent with every request
/// * `timeout` - Timeout for a single attempt
/// * `proxy` - Optional upstream proxy URL for all requests
///
/// # Example
///
/// ```no_run
/// use depth_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("MyCrawler/1.0", Duration::from_secs(5), None).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &str,
    timeout: Duration,
    proxy: Option<&str>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// HTTP client executing one logical request with bounded retries
#[derive(Debug, Clone)]
pub struct RetryClient {
    client: Client,
    max_retries: u32,
    min_wait: Duration,
    max_wait: Duration,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
}

impl RetryClient {
    pub fn builder() -> RetryClientBuilder {
        RetryClientBuilder::default()
    }

    /// Most attempts a single request can take
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Issues a GET request for `url`
    pub async fn get(&self, url: &Url, cancel: &CancellationToken) -> FetchResult<Response> {
        let request = self
            .client
            .get(url.clone())
            .build()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        self.execute(request, cancel).await
    }

    /// Executes `request`, retrying while the retry policy asks for it
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Policy says done | Return the response (or transport error) as is |
    /// | Policy says retry, attempts left | Back off, then try again |
    /// | Policy says retry, no attempts left | `RetriesExhausted` / `Transport` |
    /// | Cancelled before or during an attempt or wait | `Cancelled`, no attempt consumed |
    pub async fn execute(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> FetchResult<Response> {
        let url = request.url().to_string();
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let attempt_request = request
                .try_clone()
                .ok_or_else(|| FetchError::NotReplayable { url: url.clone() })?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                outcome = self.client.execute(attempt_request) => outcome,
            };
            attempt += 1;

            if !self.retry_policy.should_retry(&outcome) {
                return outcome.map_err(|source| FetchError::Transport {
                    url: url.clone(),
                    source,
                });
            }

            if attempt >= max_attempts {
                return Err(match outcome {
                    Ok(response) => FetchError::RetriesExhausted {
                        url,
                        status: response.status().as_u16(),
                        attempts: attempt,
                    },
                    Err(source) => FetchError::Transport { url, source },
                });
            }

            let wait = self
                .backoff_policy
                .delay(self.min_wait, self.max_wait, attempt - 1);
            // Consumes the outcome so the discarded response is released before the wait
            tracing::warn!(
                "Retrying {} (attempt {}/{}) after {} in {:?}",
                url,
                attempt + 1,
                max_attempts,
                retry_reason(outcome),
                wait
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

/// Describes a discarded attempt for the retry log, dropping its response
fn retry_reason(outcome: Result<Response, reqwest::Error>) -> String {
    match outcome {
        Ok(response) => format!("HTTP {}", response.status().as_u16()),
        Err(e) => format!("error '{}'", e),
    }
}

/// Builder for [`RetryClient`]
///
/// Defaults: 3 retries, exponential backoff between 1s and 10s, retry on transport
/// errors and 5xx, 5s timeout per attempt, no proxy.
#[derive(Debug)]
pub struct RetryClientBuilder {
    user_agent: String,
    timeout: Duration,
    proxy: Option<String>,
    max_retries: u32,
    min_wait: Duration,
    max_wait: Duration,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
}

impl Default for RetryClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
            max_retries: DEFAULT_MAX_RETRIES,
            min_wait: DEFAULT_MIN_WAIT,
            max_wait: DEFAULT_MAX_WAIT,
            retry_policy: Arc::new(DefaultRetryPolicy),
            backoff_policy: Arc::new(ExponentialBackoff::default()),
        }
    }
}

impl RetryClientBuilder {
    /// Starts from the crawler and backoff sections of `config`
    pub fn from_config(config: &Config) -> Self {
        let backoff = &config.backoff;
        let backoff_policy: Arc<dyn BackoffPolicy> = match backoff.policy {
            BackoffKind::Linear => Arc::new(LinearBackoff::new(backoff.seed)),
            BackoffKind::Exponential => Arc::new(ExponentialBackoff::new(backoff.seed)),
        };

        Self {
            user_agent: config.crawler.user_agent().to_string(),
            timeout: config.crawler.request_timeout(),
            proxy: config.crawler.proxy.clone(),
            max_retries: config.crawler.max_retries,
            min_wait: Duration::from_millis(backoff.min_wait_ms),
            max_wait: Duration::from_millis(backoff.max_wait_ms),
            retry_policy: Arc::new(DefaultRetryPolicy),
            backoff_policy,
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the bounds handed to the backoff policy
    pub fn wait_bounds(mut self, min_wait: Duration, max_wait: Duration) -> Self {
        self.min_wait = min_wait;
        self.max_wait = max_wait;
        self
    }

    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn backoff_policy(mut self, policy: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff_policy = policy;
        self
    }

    pub fn build(self) -> Result<RetryClient, reqwest::Error> {
        let client = build_http_client(&self.user_agent, self.timeout, self.proxy.as_deref())?;
        Ok(RetryClient {
            client,
            max_retries: self.max_retries,
            min_wait: self.min_wait,
            max_wait: self.max_wait,
            retry_policy: self.retry_policy,
            backoff_policy: self.backoff_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client(max_retries: u32) -> RetryClient {
        RetryClient::builder()
            .max_retries(max_retries)
            .wait_bounds(Duration::from_millis(1), Duration::from_millis(5))
            .build()
            .unwrap()
    }

    fn url_for(server: &MockServer, route: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client("TestCrawler/1.0", Duration::from_secs(1), None).is_ok());
        assert!(build_http_client(
            "TestCrawler/1.0",
            Duration::from_secs(1),
            Some("http://localhost:8080")
        )
        .is_ok());
    }

    #[test]
    fn test_builder_from_config() {
        let mut config = Config::default();
        config.crawler.max_retries = 7;
        let client = RetryClientBuilder::from_config(&config).build().unwrap();
        assert_eq!(client.max_attempts(), 8);
    }

    #[tokio::test]
    async fn test_success_is_not_retried() {
        let server = MockServer::start().await;
        // wiremock splits header values on commas, so match a comma-free agent
        Mock::given(method("GET"))
            .and(path("/ok"))
            .and(header("user-agent", "TestCrawler/1.0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = RetryClient::builder()
            .user_agent("TestCrawler/1.0")
            .wait_bounds(Duration::from_millis(1), Duration::from_millis(5))
            .build()
            .unwrap();
        let response = client
            .get(&url_for(&server, "/ok"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let response = fast_client(3)
            .get(&url_for(&server, "/missing"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = fast_client(2)
            .get(&url_for(&server, "/flaky"), &CancellationToken::new())
            .await;

        match result {
            Err(FetchError::RetriesExhausted {
                status, attempts, ..
            }) => {
                assert_eq!(status, 503);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let result = fast_client(0)
            .get(&url_for(&server, "/"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(FetchError::RetriesExhausted { .. })));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recover"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/recover"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
            .mount(&server)
            .await;

        let response = fast_client(3)
            .get(&url_for(&server, "/recover"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "fine");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_reason_consumes_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let response = reqwest::get(url_for(&server, "/busy")).await;
        assert_eq!(retry_reason(response), "HTTP 503");
    }

    #[tokio::test]
    async fn test_discarded_bodies_do_not_block_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/large"))
            .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(256 * 1024)))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/large"))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .mount(&server)
            .await;

        let response = fast_client(3)
            .get(&url_for(&server, "/large"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "done");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_is_retried() {
        // Nothing listens on this port once the listener is dropped
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{}/gone", port)).unwrap();

        let result = fast_client(1).get(&url, &CancellationToken::new()).await;
        assert!(matches!(result, Err(FetchError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fast_client(3).get(&url_for(&server, "/"), &cancel).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = RetryClient::builder()
            .max_retries(5)
            .wait_bounds(Duration::from_secs(30), Duration::from_secs(60))
            .build()
            .unwrap();
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                cancel.cancel();
            })
        };

        let started = std::time::Instant::now();
        let result = client.get(&url_for(&server, "/"), &cancel).await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(FetchError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[derive(Debug)]
    struct RetryTeapots;

    impl RetryPolicy for RetryTeapots {
        fn should_retry(&self, outcome: &Result<Response, reqwest::Error>) -> bool {
            matches!(outcome, Ok(response) if response.status().as_u16() == 418)
        }
    }

    #[tokio::test]
    async fn test_custom_retry_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(418))
            .expect(2)
            .mount(&server)
            .await;

        let client = RetryClient::builder()
            .max_retries(1)
            .wait_bounds(Duration::from_millis(1), Duration::from_millis(2))
            .retry_policy(Arc::new(RetryTeapots))
            .backoff_policy(Arc::new(LinearBackoff::new(1)))
            .build()
            .unwrap();

        let result = client
            .get(&url_for(&server, "/"), &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(FetchError::RetriesExhausted { status: 418, .. })
        ));
    }
}
