use crate::config::types::Config;
use crate::ConfigResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads a configuration file once, returning the parsed config and its hash
///
/// The config is not validated: values from the command line still have to be
/// layered on top, so call [`validate`](crate::config::validate) once the final
/// config is assembled.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Parsed configuration and the hash of the file content
/// * `Err(ConfigError)` - Failed to read or parse the file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use depth_crawler::config::{read_config_with_hash, validate};
///
/// let (config, hash) = read_config_with_hash(Path::new("crawler.toml")).unwrap();
/// validate(&config).unwrap();
/// println!("Max depth: {} (config {})", config.crawler.max_depth, hash);
/// ```
pub fn read_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, compute_config_hash(&content)))
}

/// Parses TOML configuration content
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    Ok(toml::from_str(content)?)
}

/// Computes a hex-encoded SHA-256 hash of configuration content
///
/// The hash is embedded in the crawl report so runs can be matched to the
/// configuration that produced them.
pub fn compute_config_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
