use crate::config::types::{BackoffConfig, Config, CrawlerConfig, OutputConfig};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Depth above which a crawl is expected to take a very long time
const DEPTH_WARNING_THRESHOLD: u32 = 10;

/// Request rate above which remote hosts tend to start refusing the crawler
const RATE_WARNING_THRESHOLD: f64 = 20.0;

/// Request rate below which the limiter runs at its slowest interval of one per day
const RATE_FLOOR: f64 = 1.0 / 86_400.0;

/// Validates the entire configuration
///
/// This runs once before any crawling starts; a failure here is the only error that
/// aborts a whole run.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_backoff_config(&config.backoff)?;
    validate_output_config(&config.output)?;
    validate_blacklist(&config.blacklist)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        validate_http_url(seed, "seed URL")?;
    }

    if config.max_depth < 1 {
        return Err(ConfigError::Validation(format!(
            "max_depth must be >= 1, got {}",
            config.max_depth
        )));
    }
    if config.max_depth > DEPTH_WARNING_THRESHOLD {
        tracing::warn!(
            "max_depth {} > {} may take a long time to complete",
            config.max_depth,
            DEPTH_WARNING_THRESHOLD
        );
    }

    if !config.max_requests_per_second.is_finite() || config.max_requests_per_second <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "max_requests_per_second must be > 0, got {}",
            config.max_requests_per_second
        )));
    }
    if config.max_requests_per_second > RATE_WARNING_THRESHOLD {
        tracing::warn!(
            "max_requests_per_second {} > {} may cause unexpected behaviour",
            config.max_requests_per_second,
            RATE_WARNING_THRESHOLD
        );
    }
    if config.max_requests_per_second < RATE_FLOOR {
        tracing::warn!(
            "max_requests_per_second {} is below one per day; requests will be spaced a day apart",
            config.max_requests_per_second
        );
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be > 0".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        validate_http_url(proxy, "proxy URL")?;
    }

    if let Some(user_agent) = &config.user_agent {
        if user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates retry backoff configuration
fn validate_backoff_config(config: &BackoffConfig) -> ConfigResult<()> {
    if config.max_wait_ms < config.min_wait_ms {
        return Err(ConfigError::Validation(format!(
            "max_wait_ms ({}) must be >= min_wait_ms ({})",
            config.max_wait_ms, config.min_wait_ms
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.report_path.is_empty() {
        return Err(ConfigError::Validation(
            "report_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates blacklist host entries
fn validate_blacklist(hosts: &[String]) -> ConfigResult<()> {
    for host in hosts {
        validate_host_pattern(host)?;
    }
    Ok(())
}

/// Parses `value` and requires an http(s) scheme and a host
fn validate_http_url(value: &str, what: &str) -> ConfigResult<()> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            what, value
        )));
    }

    Ok(())
}

/// Validates a host pattern (supports a leading "*." wildcard)
fn validate_host_pattern(pattern: &str) -> ConfigResult<()> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    let host = pattern.strip_prefix("*.").unwrap_or(pattern);

    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(format!(
            "Host pattern '{}' has nothing after the wildcard",
            pattern
        )));
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.')
        || host.ends_with('.')
        || host.starts_with('-')
        || host.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}
