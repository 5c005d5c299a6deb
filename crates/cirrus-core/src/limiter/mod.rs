// ── Shared rate limiter ──
//
// The only component that gates outbound calls. A bounded pool of
// worker tasks pulls type-erased jobs from a priority queue; before
// executing, a worker must acquire a token from the sliding-window
// gate. Lower numeric priority wins; ties are FIFO via a monotonic
// sequence counter.
//
// The limiter itself never fails -- it only delays. Errors from the
// wrapped call propagate to the submitter through its reply channel.

mod window;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::CoreError;
use window::SlidingWindow;

pub use window::RateLimiterStats;

/// Well-known priority levels. Lower values are serviced first;
/// anything in `0..=u8::MAX` is accepted.
pub mod priority {
    pub const SETUP: u8 = 0;
    pub const DISCOVERY: u8 = 10;
    pub const TELEMETRY: u8 = 20;
    pub const BACKGROUND: u8 = 30;
}

/// Shutdown sentinels sort after every real job (real priorities are
/// widened from `u8`, so `u16::MAX` is unreachable by submissions).
const SENTINEL_PRIORITY: u16 = u16::MAX;

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Worker count: the global call concurrency ceiling.
    pub max_concurrent: usize,
    /// Call starts allowed in any trailing 1-second window.
    pub calls_per_second: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            calls_per_second: 8,
        }
    }
}

enum Job {
    Work(BoxFuture<'static, ()>),
    Shutdown,
}

struct QueueEntry {
    priority: u16,
    seq: u64,
    job: Job,
}

// BinaryHeap is a max-heap; reverse the comparison so the smallest
// (priority, seq) pair pops first.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

/// Process-wide outbound call gate.
///
/// Cheaply cloneable via `Arc`; constructed once at integration start
/// and handed by reference to every hub.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<LimiterInner>,
}

struct LimiterInner {
    config: RateLimiterConfig,
    queue: Mutex<BinaryHeap<QueueEntry>>,
    notify: Notify,
    window: SlidingWindow,
    seq: AtomicU64,
    accepting: AtomicBool,
    started: AtomicBool,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let window = SlidingWindow::new(config.calls_per_second);
        Self {
            inner: Arc::new(LimiterInner {
                config,
                queue: Mutex::new(BinaryHeap::new()),
                notify: Notify::new(),
                window,
                seq: AtomicU64::new(0),
                accepting: AtomicBool::new(true),
                started: AtomicBool::new(false),
                workers: tokio::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    /// Spawn the worker pool. Idempotent.
    pub async fn start(&self) {
        if self.inner.started.swap(true, AtomicOrdering::AcqRel) {
            return;
        }

        let count = self.inner.config.max_concurrent.max(1);
        let mut workers = self.inner.workers.lock().await;
        for id in 0..count {
            let inner = Arc::clone(&self.inner);
            workers.push(tokio::spawn(worker_loop(inner, id)));
        }
        debug!(workers = count, "rate limiter started");
    }

    /// Queue a unit of work and await its outcome.
    ///
    /// The closure is invoked on a worker once a concurrency slot and a
    /// window token are held; its error (if any) comes back unchanged.
    pub async fn submit<T, F, Fut>(&self, priority: u8, make_call: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        if !self.inner.accepting.load(AtomicOrdering::Acquire) {
            return Err(CoreError::ShuttingDown);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let work: BoxFuture<'static, ()> = Box::pin(async move {
            let _ = reply_tx.send(make_call().await);
        });

        self.inner.push(u16::from(priority), Job::Work(work));

        // Sender dropped means the pool shut down before running us.
        reply_rx.await.map_err(|_| CoreError::ShuttingDown)?
    }

    /// Drain and join the worker pool. Idempotent; queued work accepted
    /// before the call still runs -- the sentinels sort after it.
    pub async fn stop(&self) {
        if !self.inner.accepting.swap(false, AtomicOrdering::AcqRel) {
            return;
        }

        if self.inner.started.load(AtomicOrdering::Acquire) {
            for _ in 0..self.inner.config.max_concurrent.max(1) {
                self.inner.push(SENTINEL_PRIORITY, Job::Shutdown);
            }
        }

        let mut workers = self.inner.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }

        // Anything still queued (pool never started) is dropped so
        // blocked submitters observe the shutdown.
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("rate limiter stopped");
    }

    /// Diagnostics snapshot (window occupancy, throttle counters).
    pub fn stats(&self) -> RateLimiterStats {
        self.inner.window.stats()
    }

    /// Jobs waiting for a worker.
    pub fn queue_depth(&self) -> usize {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl LimiterInner {
    fn push(&self, priority: u16, job: Job) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(QueueEntry { priority, seq, job });
        self.notify.notify_one();
    }

    async fn next_job(&self) -> Job {
        loop {
            let (job, more_queued) = {
                let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
                let job = queue.pop().map(|entry| entry.job);
                (job, !queue.is_empty())
            };

            if let Some(job) = job {
                if more_queued {
                    // Hand the wakeup on in case a notify permit was
                    // consumed while other jobs were queued.
                    self.notify.notify_one();
                }
                return job;
            }

            self.notify.notified().await;
        }
    }
}

async fn worker_loop(inner: Arc<LimiterInner>, worker_id: usize) {
    loop {
        match inner.next_job().await {
            Job::Shutdown => {
                debug!(worker = worker_id, "worker draining");
                break;
            }
            Job::Work(work) => {
                inner.window.acquire().await;
                work.await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn ok_call(v: Value) -> impl FnOnce() -> futures::future::Ready<Result<Value, CoreError>> {
        move || futures::future::ready(Ok(v))
    }

    #[tokio::test(start_paused = true)]
    async fn submit_returns_the_call_result() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        limiter.start().await;

        let result = limiter
            .submit(priority::TELEMETRY, ok_call(json!({"ok": true})))
            .await
            .unwrap();
        assert_eq!(result, json!({"ok": true}));

        limiter.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn errors_propagate_unchanged() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        limiter.start().await;

        let result: Result<Value, CoreError> = limiter
            .submit(priority::TELEMETRY, || async {
                Err(CoreError::from(cirrus_api::Error::Server {
                    status: 502,
                    message: "bad gateway".into(),
                }))
            })
            .await;

        match result {
            Err(CoreError::Api(cirrus_api::Error::Server { status, .. })) => {
                assert_eq!(status, 502);
            }
            other => panic!("expected Server passthrough, got: {other:?}"),
        }

        limiter.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn submit_after_stop_is_rejected() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        limiter.start().await;
        limiter.stop().await;
        // Second stop is a no-op.
        limiter.stop().await;

        let result: Result<Value, CoreError> =
            limiter.submit(priority::SETUP, ok_call(json!(1))).await;
        assert!(matches!(result, Err(CoreError::ShuttingDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_concurrent: 2,
            calls_per_second: 100,
        });
        limiter.start().await;
        limiter.start().await;

        let result = limiter
            .submit(priority::SETUP, ok_call(json!("fine")))
            .await
            .unwrap();
        assert_eq!(result, json!("fine"));

        limiter.stop().await;
    }
}
