use url::Url;

/// Extracts the host from a URL
///
/// The host is lowercased and never includes the port. URLs without a host (which
/// cannot happen for valid HTTP(S) URLs) yield `None`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use depth_crawler::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the port a connection to this URL would use
///
/// Falls back to the scheme's well-known port when the URL does not name one.
pub fn connect_port(url: &Url) -> u16 {
    url.port_or_known_default().unwrap_or(80)
}
