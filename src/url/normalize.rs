use crate::{UrlError, UrlResult};
use url::Url;

/// Parses an absolute URL the crawler is able to fetch
///
/// The URL must use `http` or `https` and name a host. The fragment is removed, since
/// it never changes what the server returns.
///
/// # Examples
///
/// ```
/// use depth_crawler::url::parse_crawlable;
///
/// let url = parse_crawlable("https://example.com/page#section").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// assert!(parse_crawlable("ftp://example.com/").is_err());
/// ```
pub fn parse_crawlable(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    into_crawlable(url)
}

/// Resolves an `href` found on `base` into a crawlable absolute URL
///
/// Returns `None` if the link should be excluded:
/// - empty or fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - strings that look absolute (contain `://`) but do not parse
/// - non-HTTP(S) URLs after resolution, or URLs without a host
///
/// Relative hrefs are joined onto `base`.
pub fn normalize_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) if !href.contains("://") => {
            base.join(href).ok()?
        }
        Err(_) => return None,
    };

    into_crawlable(resolved).ok()
}

fn into_crawlable(mut url: Url) -> UrlResult<Url> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }
    url.set_fragment(None);
    Ok(url)
}
