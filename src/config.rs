//! Frame configuration assembled from CLI arguments.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryConfig;

/// Everything one album instance needs: identity, cache placement, and
/// timing knobs. Built from the CLI in the binary; constructed directly in
/// library use.
pub struct FrameConfig {
    pub token: String,
    pub album_name: String,
    pub cache_root: PathBuf,
    pub rotation_interval: Duration,
    pub staleness_ttl: Duration,
    pub request_timeout: Duration,
    pub concurrent_downloads: usize,
    pub retry: RetryConfig,
}

impl std::fmt::Debug for FrameConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameConfig")
            .field("token", &"<redacted>")
            .field("album_name", &self.album_name)
            .field("cache_root", &self.cache_root)
            .field("rotation_interval", &self.rotation_interval)
            .field("staleness_ttl", &self.staleness_ttl)
            .finish_non_exhaustive()
    }
}

impl FrameConfig {
    /// Configuration with default timings for the given album.
    pub fn new(
        token: impl Into<String>,
        album_name: impl Into<String>,
        cache_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            token: token.into(),
            album_name: album_name.into(),
            cache_root: cache_root.into(),
            rotation_interval: Duration::from_secs(300),
            staleness_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(15),
            concurrent_downloads: 4,
            retry: RetryConfig::default(),
        }
    }

    pub fn from_cli(cli: &crate::cli::Cli) -> anyhow::Result<Self> {
        let token = normalize_token(&cli.token)?;
        Ok(Self {
            token,
            album_name: cli.album_name.clone(),
            cache_root: expand_tilde(&cli.cache_directory),
            rotation_interval: Duration::from_secs(cli.rotation_interval.max(1)),
            staleness_ttl: Duration::from_secs(cli.staleness_ttl),
            request_timeout: Duration::from_secs(cli.request_timeout.max(1)),
            concurrent_downloads: cli.concurrent_downloads.max(1),
            retry: RetryConfig::default(),
        })
    }

    /// Directory name of this album's cache under the cache root. The token
    /// is validated to be filesystem-safe, so it doubles as the instance key.
    pub fn instance_key(&self) -> &str {
        &self.token
    }
}

/// Accept either a bare stream token or a pasted shared-album URL
/// (`https://www.icloud.com/sharedalbum/#B0abc...`); the token is the part
/// after the `#`.
fn normalize_token(raw: &str) -> anyhow::Result<String> {
    let token = match raw.rsplit_once('#') {
        Some((_, fragment)) => fragment,
        None => raw,
    }
    .trim();
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
        anyhow::bail!(
            "'{raw}' does not look like a shared-album token or link; \
             expected an alphanumeric token, optionally after a '#'"
        );
    }
    Ok(token.to_string())
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bare_token() {
        assert_eq!(normalize_token("B0a5qXyZ1").unwrap(), "B0a5qXyZ1");
    }

    #[test]
    fn test_normalize_full_shared_album_url() {
        let url = "https://www.icloud.com/sharedalbum/#B0a5qXyZ1";
        assert_eq!(normalize_token(url).unwrap(), "B0a5qXyZ1");
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(normalize_token("  B0a5qXyZ1 ").unwrap(), "B0a5qXyZ1");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_token("").is_err());
        assert!(normalize_token("https://example.com/no-fragment/").is_err());
        assert!(normalize_token("token with spaces").is_err());
        assert!(normalize_token("../escape").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/frames"), home.join("frames"));
        }
        assert_eq!(expand_tilde("/var/cache"), PathBuf::from("/var/cache"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = FrameConfig::new("secret", "Album", "/tmp/cache");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_defaults_match_service_cadence() {
        let config = FrameConfig::new("tok", "Album", "/tmp/cache");
        assert_eq!(config.rotation_interval, Duration::from_secs(300));
        assert_eq!(config.staleness_ttl, Duration::from_secs(3600));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }
}
