// ── Core error types ──
//
// The retry pipeline requires error identity to survive end-to-end: an
// exhausted retry re-raises the last dashboard error unchanged, never a
// summary of it. The `Api` variant is therefore transparent rather than
// flattened into domain variants; only the setup boundary translates
// into the terminal `AuthenticationFailed` / `NotReady` shapes the host
// layer acts on.

use std::time::Duration;

use cirrus_api::ErrorKind;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A dashboard call failed. Preserves the original error (and its
    /// HTTP status) end-to-end through the retry pipeline.
    #[error(transparent)]
    Api(#[from] cirrus_api::Error),

    /// Credentials were rejected during setup. Terminal -- the
    /// integration cannot start until the key is fixed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The dashboard was unreachable during setup. Retryable -- the host
    /// should surface a "not ready" signal and try again later.
    #[error("Dashboard not reachable: {message}")]
    NotReady { message: String },

    /// Work was submitted while the rate limiter or fleet hub was
    /// shutting down.
    #[error("Shutting down")]
    ShuttingDown,

    /// Invalid configuration handed to the core at construction.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Classification for retry decisions. Only dashboard errors carry a
    /// meaningful class; everything else is `Unknown` (never retried).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(e) => e.kind(),
            _ => ErrorKind::Unknown,
        }
    }

    /// The provider-supplied retry-after hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api(e) => e.retry_after(),
            _ => None,
        }
    }

    /// Translate a pipeline error into the shape the setup caller acts
    /// on: terminal auth failures and retryable connectivity failures
    /// get dedicated variants, anything else passes through.
    pub fn into_setup_error(self) -> Self {
        match self.kind() {
            ErrorKind::Authentication | ErrorKind::Authorization => Self::AuthenticationFailed {
                message: self.to_string(),
            },
            ErrorKind::Connection | ErrorKind::RateLimited | ErrorKind::Server => Self::NotReady {
                message: self.to_string(),
            },
            _ => self,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_error_identity_is_preserved() {
        let err = CoreError::from(cirrus_api::Error::Server {
            status: 503,
            message: "overloaded".into(),
        });

        assert_eq!(err.kind(), ErrorKind::Server);
        match err {
            CoreError::Api(cirrus_api::Error::Server { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected transparent Api variant, got: {other:?}"),
        }
    }

    #[test]
    fn setup_translation_splits_terminal_from_retryable() {
        let auth = CoreError::from(cirrus_api::Error::Authentication {
            message: "bad key".into(),
        });
        assert!(matches!(
            auth.into_setup_error(),
            CoreError::AuthenticationFailed { .. }
        ));

        let conn = CoreError::from(cirrus_api::Error::RateLimited {
            retry_after_secs: None,
        });
        assert!(matches!(
            conn.into_setup_error(),
            CoreError::NotReady { .. }
        ));

        let shutdown = CoreError::ShuttingDown;
        assert!(matches!(
            shutdown.into_setup_error(),
            CoreError::ShuttingDown
        ));
    }
}
