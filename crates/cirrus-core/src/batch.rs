// ── Bounded-concurrency batch execution ──
//
// Runs a homogeneous list of independent calls in consecutive chunks:
// everything in a chunk starts concurrently, the whole chunk is awaited
// before the next begins, and a pacing delay separates chunks. This
// keeps telemetry fetches bursty but bounded, with a ceiling distinct
// from (and typically below) the global rate limiter's.
//
// No retry or rate limiting happens here -- callers wrap each call
// before handing it over.

use std::time::Duration;

use futures::future;
use tracing::debug;

use crate::call::{ApiCall, CallResult};

/// Execute `calls` in chunks of `max_concurrent`.
///
/// The result vec has the same length and order as the input; each
/// call's outcome is captured independently, so one failure never
/// cancels or blocks its siblings.
pub async fn run_batched(
    calls: &[ApiCall],
    max_concurrent: usize,
    inter_batch_delay: Duration,
) -> Vec<CallResult> {
    let chunk_size = max_concurrent.max(1);
    let mut results = Vec::with_capacity(calls.len());

    for (index, chunk) in calls.chunks(chunk_size).enumerate() {
        if index > 0 && !inter_batch_delay.is_zero() {
            tokio::time::sleep(inter_batch_delay).await;
        }
        debug!(batch = index, size = chunk.len(), "running call batch");
        let outcomes = future::join_all(chunk.iter().map(ApiCall::invoke)).await;
        results.extend(outcomes);
    }

    results
}
