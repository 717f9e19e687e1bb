//! Response filters applied before a page is recorded
//!
//! The engine runs its matchers in order and stops at the first one that rejects the
//! response. A rejected response is never read and its URL ends up `Skipped`.

use reqwest::header::CONTENT_TYPE;
use reqwest::Response;

/// Pure predicate over a received response
pub trait ResponseMatcher: Send + Sync {
    /// Returns true if the response should be processed
    fn matches(&self, response: &Response) -> bool;

    /// Short name used in log messages
    fn name(&self) -> &'static str;
}

/// Returns the name of the first matcher rejecting `response`, if any
pub fn first_rejection(
    matchers: &[Box<dyn ResponseMatcher>],
    response: &Response,
) -> Option<&'static str> {
    matchers
        .iter()
        .find(|matcher| !matcher.matches(response))
        .map(|matcher| matcher.name())
}

/// Accepts every response
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ResponseMatcher for AcceptAll {
    fn matches(&self, _response: &Response) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "accept-all"
    }
}

/// Accepts `200 OK` only
#[derive(Debug, Clone, Copy, Default)]
pub struct OkStatus;

impl ResponseMatcher for OkStatus {
    fn matches(&self, response: &Response) -> bool {
        response.status() == reqwest::StatusCode::OK
    }

    fn name(&self) -> &'static str {
        "ok-status"
    }
}

/// Accepts 4xx responses
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientErrorStatus;

impl ResponseMatcher for ClientErrorStatus {
    fn matches(&self, response: &Response) -> bool {
        response.status().is_client_error()
    }

    fn name(&self) -> &'static str {
        "client-error-status"
    }
}

/// Accepts 5xx responses
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerErrorStatus;

impl ResponseMatcher for ServerErrorStatus {
    fn matches(&self, response: &Response) -> bool {
        response.status().is_server_error()
    }

    fn name(&self) -> &'static str {
        "server-error-status"
    }
}

/// Accepts `200 OK` responses declaring an HTML body
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlContent;

impl ResponseMatcher for HtmlContent {
    fn matches(&self, response: &Response) -> bool {
        response.status() == reqwest::StatusCode::OK
            && content_type(response).is_some_and(|ct| ct.contains("text/html"))
    }

    fn name(&self) -> &'static str {
        "html-content"
    }
}

/// Accepts textual bodies, or bodies without a declared type
#[derive(Debug, Clone, Copy, Default)]
pub struct TextContent;

impl ResponseMatcher for TextContent {
    fn matches(&self, response: &Response) -> bool {
        match content_type(response) {
            Some(ct) => ct.contains("text"),
            None => true,
        }
    }

    fn name(&self) -> &'static str {
        "text-content"
    }
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase)
}
