use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `cirrus-api` crate.
///
/// Every failure mode of a dashboard call lands in exactly one variant,
/// and [`Error::kind`] collapses the variants into the classification the
/// retry layer in `cirrus-core` drives its policy from.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication / authorization ──────────────────────────────
    /// API key rejected (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// API key valid but lacks access to the resource (HTTP 403).
    #[error("Not authorized: {message}")]
    Authorization { message: String },

    // ── Throttling ──────────────────────────────────────────────────
    /// The provider's rate ceiling was hit (HTTP 429). Carries the
    /// `Retry-After` hint when the provider supplied one.
    #[error("Rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Protocol ────────────────────────────────────────────────────
    /// 5xx response from the dashboard.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// 4xx response other than auth or rate limiting. Treated as a
    /// logic/configuration defect, not retried.
    #[error("Client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Coarse classification consumed by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    RateLimited,
    Authentication,
    Authorization,
    Server,
    Client,
    Unknown,
}

impl Error {
    /// Classify this error for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Server { .. } => ErrorKind::Server,
            Self::Client { .. } => ErrorKind::Client,
            Self::Transport(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    ErrorKind::Connection
                } else {
                    ErrorKind::Unknown
                }
            }
            Self::InvalidUrl(_) | Self::Deserialization { .. } => ErrorKind::Unknown,
        }
    }

    /// The provider-supplied `Retry-After` hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Returns `true` if this error is a credential problem that no
    /// amount of retrying will fix.
    pub fn is_terminal_auth(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Authentication | ErrorKind::Authorization
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_status_variants() {
        let auth = Error::Authentication {
            message: "bad key".into(),
        };
        assert_eq!(auth.kind(), ErrorKind::Authentication);
        assert!(auth.is_terminal_auth());

        let forbidden = Error::Authorization {
            message: "no access to org".into(),
        };
        assert_eq!(forbidden.kind(), ErrorKind::Authorization);
        assert!(forbidden.is_terminal_auth());

        let server = Error::Server {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(server.kind(), ErrorKind::Server);
        assert!(!server.is_terminal_auth());

        let client = Error::Client {
            status: 404,
            message: "not found".into(),
        };
        assert_eq!(client.kind(), ErrorKind::Client);
    }

    #[test]
    fn retry_after_only_from_rate_limit_hint() {
        let hinted = Error::RateLimited {
            retry_after_secs: Some(4),
        };
        assert_eq!(hinted.retry_after(), Some(Duration::from_secs(4)));
        assert_eq!(hinted.kind(), ErrorKind::RateLimited);

        let bare = Error::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(bare.retry_after(), None);

        let server = Error::Server {
            status: 500,
            message: String::new(),
        };
        assert_eq!(server.retry_after(), None);
    }
}
