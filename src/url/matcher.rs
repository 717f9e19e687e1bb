use std::collections::BTreeSet;

/// Checks if a host matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches:
///    - "example.com" (the bare host)
///    - "blog.example.com" (single subdomain)
///    - "api.v2.example.com" (nested subdomains)
///
/// # Examples
///
/// ```
/// use depth_crawler::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "other.com"));
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Set of hosts that are neither fetched nor followed
///
/// Every plain entry is stored together with its `www.` twin, so blacklisting
/// `example.com` also covers `www.example.com` and the other way round. Entries
/// starting with `*.` cover the host and all of its subdomains.
#[derive(Debug, Clone, Default)]
pub struct HostBlacklist {
    patterns: BTreeSet<String>,
}

impl HostBlacklist {
    /// Builds a blacklist from configured host patterns
    ///
    /// Patterns are trimmed and lowercased; blank entries are ignored.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = BTreeSet::new();

        for host in hosts {
            let host = host.as_ref().trim().to_lowercase();
            if host.is_empty() {
                continue;
            }

            if !host.starts_with("*.") {
                match host.strip_prefix("www.") {
                    Some(bare) => patterns.insert(bare.to_string()),
                    None => patterns.insert(format!("www.{}", host)),
                };
            }
            patterns.insert(host);
        }

        Self { patterns }
    }

    /// Returns true if `host` is covered by any pattern
    pub fn contains(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.patterns
            .iter()
            .any(|pattern| matches_wildcard(pattern, &host))
    }

    /// All patterns, sorted, including the derived `www.` twins
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}
