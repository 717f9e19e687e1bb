//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use depth_crawler::config::{BackoffConfig, Config, CrawlerConfig};
use depth_crawler::crawler::{CrawlEngine, HtmlContent, OkStatus};
use depth_crawler::state::PageState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `seeds` with fast retries
fn create_test_config(seeds: Vec<String>, max_depth: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            seeds,
            max_depth,
            max_requests_per_second: 1000.0,
            request_timeout_ms: 5000,
            max_retries: 2,
            ..Default::default()
        },
        backoff: BackoffConfig {
            min_wait_ms: 1,
            max_wait_ms: 5,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

/// Mounts a page at `route` linking to each of `links` (absolute URLs)
async fn mount_page(server: &MockServer, route: &str, links: &[String]) {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{}">link</a>"#, link))
        .collect();
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(format!("<html><body>{}</body></html>", anchors)))
        .mount(server)
        .await;
}

async fn run(config: Config) -> Arc<CrawlEngine> {
    let engine = Arc::new(CrawlEngine::builder(config).build().unwrap());
    engine.run().await;
    engine
}

#[tokio::test]
async fn test_blacklisted_and_malformed_links_are_not_followed() {
    let server = MockServer::start().await;
    let base = server.uri();
    let root = format!("{}/", base);
    let link_a = format!("{}/a", base);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><body>
            <a href="{}">A</a>
            <a href="http://ads.example.com/b">B</a>
            <a href="ht!tp://broken.example.com/c">C</a>
            </body></html>"#,
            link_a
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/a", &[format!("{}/deeper", base)]).await;
    Mock::given(method("GET"))
        .and(path("/deeper"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(vec![root.clone()], 1);
    config.blacklist = vec!["ads.example.com".to_string()];
    let engine = run(config).await;

    let registry = engine.registry();
    assert_eq!(registry.len(), 2);

    let root_record = registry.lookup(&root).unwrap();
    assert_eq!(root_record.depth, 0);
    assert_eq!(root_record.parent, None);
    assert_eq!(root_record.links, vec![link_a.clone()]);

    let a_record = registry.lookup(&link_a).unwrap();
    assert_eq!(a_record.depth, 1);
    assert_eq!(a_record.parent.as_deref(), Some(root.as_str()));
    assert_eq!(registry.state(&format!("{}/deeper", base)), PageState::Unvisited);
}

#[tokio::test]
async fn test_shared_link_is_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    let shared = format!("{}/shared", base);

    mount_page(
        &server,
        "/",
        &[format!("{}/left", base), format!("{}/right", base)],
    )
    .await;
    mount_page(&server, "/left", &[shared.clone()]).await;
    mount_page(&server, "/right", &[shared.clone()]).await;
    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(html("<html></html>".to_string()))
        .expect(1)
        .mount(&server)
        .await;

    let engine = run(create_test_config(vec![base.clone()], 2)).await;

    assert_eq!(engine.registry().len(), 4);
    let record = engine.registry().lookup(&shared).unwrap();
    assert_eq!(record.depth, 2);

    let telemetry = engine.telemetry().get("127.0.0.1").unwrap();
    assert_eq!(telemetry.visited_paths.len(), 4);
    assert!(telemetry.visited_paths.contains("/shared"));
    assert!(telemetry.dns_addrs.contains("127.0.0.1"));
    assert!(telemetry.remote_addrs.contains("127.0.0.1"));
}

#[tokio::test]
async fn test_depth_bound_and_parent_depth() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", &[format!("{}/one", base)]).await;
    mount_page(&server, "/one", &[format!("{}/two", base)]).await;
    mount_page(&server, "/two", &[format!("{}/three", base)]).await;
    Mock::given(method("GET"))
        .and(path("/three"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = run(create_test_config(vec![base.clone()], 2)).await;

    let records = engine.registry().records();
    assert_eq!(records.len(), 3);

    for record in records.values() {
        match &record.parent {
            None => assert_eq!(record.depth, 0),
            Some(parent) => {
                let parent_record = &records[parent];
                assert_eq!(record.depth, parent_record.depth + 1);
            }
        }
    }
}

#[tokio::test]
async fn test_server_error_retried_then_recorded_as_failed() {
    let server = MockServer::start().await;
    let root = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let engine = run(create_test_config(vec![root.clone()], 1)).await;

    assert_eq!(engine.registry().state(&root), PageState::Failed);
    let record = engine.registry().lookup(&root).unwrap();
    assert_eq!(record.depth, 0);
    assert!(record.links.is_empty());
    assert!(record.content.is_none());
    assert!(record.error.is_some());
    assert!(engine.telemetry().is_empty());
}

#[tokio::test]
async fn test_client_error_not_retried_and_skipped_by_matcher() {
    let server = MockServer::start().await;
    let root = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let engine = Arc::new(
        CrawlEngine::builder(create_test_config(vec![root.clone()], 1))
            .matcher(OkStatus)
            .build()
            .unwrap(),
    );
    engine.run().await;

    assert_eq!(engine.registry().state(&root), PageState::Skipped);
    assert!(engine.registry().lookup(&root).is_none());
    assert!(engine.telemetry().is_empty());
}

#[tokio::test]
async fn test_html_matcher_skips_other_content() {
    let server = MockServer::start().await;
    let base = server.uri();
    let image = format!("{}/image.png", base);

    mount_page(&server, "/", &[image.clone()]).await;
    Mock::given(method("GET"))
        .and(path("/image.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("png", "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let engine = Arc::new(
        CrawlEngine::builder(create_test_config(vec![base.clone()], 1))
            .matcher(HtmlContent)
            .build()
            .unwrap(),
    );
    engine.run().await;

    assert_eq!(engine.registry().state(&image), PageState::Skipped);
    let counts = engine.registry().count_by_state();
    assert_eq!(counts.get("recorded"), Some(&1));
    assert_eq!(counts.get("skipped"), Some(&1));
}

#[tokio::test]
async fn test_user_agent_header_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "TestBot/1.0"))
        .respond_with(html("<html></html>".to_string()))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(vec![server.uri()], 1);
    config.crawler.user_agent = Some("TestBot/1.0".to_string());
    let engine = run(config).await;

    assert_eq!(engine.registry().count_by_state().get("recorded"), Some(&1));
}

#[tokio::test]
async fn test_multiple_seeds_share_registry() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    let shared = format!("{}/common", first.uri());

    mount_page(&first, "/", &[shared.clone()]).await;
    mount_page(&second, "/", &[shared.clone()]).await;
    Mock::given(method("GET"))
        .and(path("/common"))
        .respond_with(html("<html></html>".to_string()))
        .expect(1)
        .mount(&first)
        .await;

    let engine = run(create_test_config(vec![first.uri(), second.uri()], 1)).await;

    assert_eq!(engine.registry().len(), 3);
    assert_eq!(engine.registry().lookup(&shared).unwrap().depth, 1);
}

#[tokio::test]
async fn test_rate_limit_spaces_requests() {
    let server = MockServer::start().await;
    let base = server.uri();
    let links: Vec<String> = (0..4).map(|i| format!("{}/p{}", base, i)).collect();

    mount_page(&server, "/", &links).await;
    Mock::given(method("GET"))
        .respond_with(html("<html></html>".to_string()))
        .mount(&server)
        .await;

    let mut config = create_test_config(vec![base.clone()], 1);
    config.crawler.max_requests_per_second = 5.0;

    let started = Instant::now();
    let engine = run(config).await;

    // Five requests at five per second: four full intervals after the first grant
    assert!(started.elapsed() >= Duration::from_millis(750));
    assert_eq!(engine.registry().len(), 5);
}

#[tokio::test]
async fn test_concurrency_bound_still_completes() {
    let server = MockServer::start().await;
    let base = server.uri();
    let links: Vec<String> = (0..6).map(|i| format!("{}/p{}", base, i)).collect();

    mount_page(&server, "/", &links).await;
    for link in &links {
        mount_page(&server, &link[base.len()..], &[format!("{}/", base)]).await;
    }

    let mut config = create_test_config(vec![base.clone()], 3);
    config.crawler.max_concurrent_fetches = 1;
    let engine = run(config).await;

    assert_eq!(engine.registry().count_by_state().get("recorded"), Some(&7));
}

#[tokio::test]
async fn test_cancellation_stops_crawl_promptly() {
    let server = MockServer::start().await;
    let base = server.uri();
    let links: Vec<String> = (0..5).map(|i| format!("{}/slow{}", base, i)).collect();

    mount_page(&server, "/", &links).await;
    Mock::given(method("GET"))
        .respond_with(html("<html></html>".to_string()).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let mut config = create_test_config(vec![base.clone()], 1);
    config.crawler.request_timeout_ms = 60_000;

    let cancel = CancellationToken::new();
    let engine = Arc::new(
        CrawlEngine::builder(config)
            .cancellation_token(cancel.clone())
            .build()
            .unwrap(),
    );

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    engine.run().await;
    canceller.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));

    let registry = engine.registry();
    assert_eq!(registry.state(&format!("{}/", base)), PageState::Recorded);
    for link in &links {
        // Claimed but never recorded
        assert_eq!(registry.state(link), PageState::Claimed);
        assert!(registry.lookup(link).is_none());
    }
}

#[tokio::test]
async fn test_unresolvable_host_stays_claimed_and_siblings_continue() {
    let server = MockServer::start().await;
    let base = server.uri();
    let root = format!("{}/", base);
    let sibling = format!("{}/ok", base);
    // .invalid never resolves
    let unresolvable = "http://missing.invalid/".to_string();

    mount_page(&server, "/", &[sibling.clone(), unresolvable.clone()]).await;
    mount_page(&server, "/ok", &[]).await;

    let engine = run(create_test_config(vec![root.clone()], 1)).await;
    let registry = engine.registry();

    assert_eq!(registry.state(&unresolvable), PageState::Claimed);
    assert!(registry.lookup(&unresolvable).is_none());

    assert_eq!(registry.state(&root), PageState::Recorded);
    assert_eq!(registry.state(&sibling), PageState::Recorded);
    assert_eq!(registry.lookup(&sibling).unwrap().depth, 1);
    assert!(registry
        .lookup(&root)
        .unwrap()
        .links
        .contains(&unresolvable));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unreadable_body_recorded_as_failed() {
    let server = MockServer::start().await;
    let base = server.uri();
    let root = format!("{}/", base);
    let broken = format!("{}/broken", base);

    mount_page(&server, "/", &[broken.clone()]).await;
    // Claims gzip but is not, so decoding fails while the body is read
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_raw("definitely not gzip", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = run(create_test_config(vec![root.clone()], 1)).await;
    let registry = engine.registry();

    assert_eq!(registry.state(&root), PageState::Recorded);
    assert_eq!(registry.state(&broken), PageState::Failed);
    let record = registry.lookup(&broken).unwrap();
    assert_eq!(record.depth, 1);
    assert!(record.links.is_empty());
    assert!(record.content.is_none());
    let error = record.error.as_deref().unwrap();
    assert!(error.contains("Failed to read body"), "{}", error);
}
