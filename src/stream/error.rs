use thiserror::Error;

/// Errors produced by the shared-stream client.
///
/// Discovery-phase failures (`Network`, `Protocol`, `RedirectUnresolved`,
/// `EmptyAlbum`) are non-destructive: the orchestrator returns before
/// reconciliation, so the existing cache keeps serving. `Status` is the
/// per-asset download failure, logged and skipped within a cycle.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Transport-level failure: connect, TLS, timeout, or body read.
    #[error("network error talking to shared-stream service: {0}")]
    Network(String),

    /// The service answered, but with something we cannot interpret.
    #[error("unexpected shared-stream response: {0}")]
    Protocol(String),

    /// The shard kept relocating past the single allowed retry.
    #[error("shard redirect unresolved after retry (last host: {0})")]
    RedirectUnresolved(String),

    /// A well-formed stream response containing zero photos. Distinct from
    /// a populated list so callers never mistake a transient empty result
    /// for "the album is now empty".
    #[error("album stream returned no photos")]
    EmptyAlbum,

    /// An asset download answered with a non-success HTTP status.
    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },
}

impl StreamError {
    /// Whether a download retry loop should try again.
    ///
    /// Server errors and rate limits are transient; anything else means the
    /// asset URL itself is bad and retrying cannot help.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Network(_) => true,
            StreamError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_retryable() {
        assert!(StreamError::Network("timed out".into()).is_retryable());
    }

    #[test]
    fn test_status_5xx_and_429_retryable() {
        for status in [429, 500, 503] {
            let e = StreamError::Status {
                status,
                url: "x".into(),
            };
            assert!(e.is_retryable(), "status {status}");
        }
    }

    #[test]
    fn test_status_4xx_not_retryable() {
        for status in [400, 403, 404] {
            let e = StreamError::Status {
                status,
                url: "x".into(),
            };
            assert!(!e.is_retryable(), "status {status}");
        }
    }

    #[test]
    fn test_discovery_errors_not_retryable() {
        assert!(!StreamError::Protocol("bad body".into()).is_retryable());
        assert!(!StreamError::RedirectUnresolved("p42".into()).is_retryable());
        assert!(!StreamError::EmptyAlbum.is_retryable());
    }
}
