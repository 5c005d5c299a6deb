// ── Opaque outbound calls ──
//
// Hubs and the tiered scheduler never hand endpoint semantics to the
// shared machinery; they hand it an `ApiCall`: a named, repeatable,
// type-erased unit of work returning a JSON payload or a classified
// error. Cross-cutting behavior (cache, rate limit, retry) is layered
// on by explicit composition, built once per call site.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::error::CoreError;
use crate::limiter::RateLimiter;
use crate::retry::{run_with_retry, RetryStrategy};

pub type CallResult = Result<Value, CoreError>;
pub type CallFuture = BoxFuture<'static, CallResult>;

/// A repeatable outbound call. Cloning is cheap; invoking creates a
/// fresh future each time, which is what lets the retry layer re-run it.
#[derive(Clone)]
pub struct ApiCall {
    name: Arc<str>,
    run: Arc<dyn Fn() -> CallFuture + Send + Sync>,
}

impl ApiCall {
    /// Wrap a closure producing the call future.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            run: Arc::new(move || Box::pin(f())),
        }
    }

    /// The operation name used in logs and retry diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start one execution of the call.
    pub fn invoke(&self) -> CallFuture {
        (self.run)()
    }

    // ── Composition layers ───────────────────────────────────────────

    /// Route every execution through the shared rate limiter.
    pub fn with_rate_limit(self, limiter: Arc<RateLimiter>, priority: u8) -> Self {
        let name = Arc::clone(&self.name);
        let inner = self;
        Self {
            name,
            run: Arc::new(move || {
                let limiter = Arc::clone(&limiter);
                let inner = inner.clone();
                Box::pin(async move { limiter.submit(priority, move || inner.invoke()).await })
            }),
        }
    }

    /// Re-run failed executions according to `strategy`.
    pub fn with_retry(self, strategy: RetryStrategy) -> Self {
        let name = Arc::clone(&self.name);
        let inner = self;
        Self {
            name: Arc::clone(&name),
            run: Arc::new(move || {
                let name = Arc::clone(&name);
                let strategy = strategy.clone();
                let inner = inner.clone();
                Box::pin(async move {
                    run_with_retry(&name, &strategy, || inner.invoke()).await
                })
            }),
        }
    }

    /// Serve from the response cache when a fresh entry exists;
    /// populate it after a successful fetch otherwise.
    pub fn with_cache(self, cache: Arc<ResponseCache>, key: String, ttl: Duration) -> Self {
        let name = Arc::clone(&self.name);
        let inner = self;
        Self {
            name,
            run: Arc::new(move || {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                let inner = inner.clone();
                Box::pin(async move {
                    if let Some(hit) = cache.get(&key) {
                        return Ok(hit);
                    }
                    let value = inner.invoke().await?;
                    cache.put(key, value.clone(), ttl);
                    Ok(value)
                })
            }),
        }
    }
}

impl std::fmt::Debug for ApiCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCall").field("name", &self.name).finish()
    }
}
