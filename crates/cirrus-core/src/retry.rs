// ── Classification-driven retry ──
//
// Decides, per error, whether a unit of work runs again and how long to
// wait first. Credential failures terminate immediately; connection,
// rate-limit, and 5xx failures back off exponentially, with a
// provider-supplied retry-after hint overriding the computed delay
// (capped at the strategy maximum). Exhaustion re-raises the last error
// unchanged.

use std::time::Duration;

use cirrus_api::ErrorKind;
use tracing::{debug, warn};

use crate::error::CoreError;

/// Backoff policy for one class of operation.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    pub name: &'static str,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl RetryStrategy {
    /// One-time initialization: patient, because failure blocks setup.
    pub fn setup() -> Self {
        Self {
            name: "setup",
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Device discovery: moderate.
    pub fn discovery() -> Self {
        Self {
            name: "discovery",
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Fast refresh cycles: staleness beats blocking the cycle.
    pub fn realtime() -> Self {
        Self {
            name: "realtime",
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Slow-changing data: moderate.
    pub fn static_data() -> Self {
        Self {
            name: "static-data",
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Interactive validation flows: fail fast.
    pub fn config_validation() -> Self {
        Self {
            name: "config-validation",
            max_attempts: 2,
            base_delay: Duration::from_millis(250),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(1),
        }
    }

    /// Delay before the next attempt. `attempt` is the attempt that
    /// just failed, starting at 1.
    fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.min(self.max_delay);
        }
        let exponent = i32::try_from(attempt.saturating_sub(1).min(16)).unwrap_or(16);
        let delay = self.base_delay.mul_f64(self.backoff_factor.powi(exponent));
        delay.min(self.max_delay)
    }
}

/// Whether an error class is worth another attempt.
fn is_retryable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Connection | ErrorKind::RateLimited | ErrorKind::Server
    )
}

/// Run `attempt_fn` under `strategy`, classifying each failure.
///
/// Authentication/authorization errors surface after exactly one
/// attempt. 4xx client errors and unknown failures are not retried
/// either -- they indicate a defect, not a transient condition.
pub async fn run_with_retry<T, F, Fut>(
    operation: &str,
    strategy: &RetryStrategy,
    mut attempt_fn: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt: u32 = 1;
    let mut total_delay = Duration::ZERO;
    loop {
        match attempt_fn().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, ?total_delay, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let kind = err.kind();
                if !is_retryable(kind) {
                    debug!(operation, ?kind, error = %err, "failure is not retryable");
                    return Err(err);
                }
                if attempt >= strategy.max_attempts {
                    warn!(
                        operation,
                        attempt,
                        ?total_delay,
                        strategy = strategy.name,
                        error = %err,
                        "retries exhausted"
                    );
                    return Err(err);
                }

                let delay = strategy.delay_for(attempt, err.retry_after());
                warn!(
                    operation,
                    attempt,
                    ?kind,
                    ?delay,
                    strategy = strategy.name,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                total_delay += delay;
                attempt += 1;
            }
        }
    }
}
