// ── Short-lived response cache ──
//
// Avoids redundant calls for data that changes slowly relative to the
// refresh cadence. Expiry is lazy (checked on read) plus an explicit
// sweep the owner may run periodically to bound memory. Entries are
// whole JSON payloads; a read never observes a half-written entry
// because the map entry is replaced atomically.

use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;
use tracing::trace;

use crate::config::CacheTtls;

/// The three TTL classes callers pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlTier {
    /// Per-refresh-cycle data (port status, sensor readings).
    Standard,
    /// Changes a few times an hour (connection statistics).
    Extended,
    /// Near-static (SSID configuration).
    Long,
}

struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Keyed TTL store shared by every hub.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttls: CacheTtls,
}

impl ResponseCache {
    pub fn new(ttls: CacheTtls) -> Self {
        Self {
            entries: DashMap::new(),
            ttls,
        }
    }

    /// Compose a collision-free key from (scope, data kind, optional
    /// sub-identifier). Per-device and per-network data with the same
    /// kind land under different scopes.
    pub fn key(scope: &str, kind: &str, sub: Option<&str>) -> String {
        match sub {
            Some(sub) => format!("{scope}:{kind}:{sub}"),
            None => format!("{scope}:{kind}"),
        }
    }

    /// The configured duration for a TTL tier.
    pub fn ttl(&self, tier: TtlTier) -> Duration {
        match tier {
            TtlTier::Standard => self.ttls.standard,
            TtlTier::Extended => self.ttls.extended,
            TtlTier::Long => self.ttls.long,
        }
    }

    /// Fetch a fresh entry. An expired entry reads as a miss and is
    /// evicted on the spot.
    pub fn get(&self, key: &str) -> Option<Value> {
        let hit = {
            let entry = self.entries.get(key)?;
            if entry.is_expired(Instant::now()) {
                None
            } else {
                Some(entry.value.clone())
            }
        };

        if hit.is_none() {
            self.entries.remove(key);
            trace!(key, "cache entry expired");
        }
        hit
    }

    pub fn put(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// `put` with a tier instead of an explicit duration.
    pub fn put_tier(&self, key: impl Into<String>, value: Value, tier: TtlTier) {
        self.put(key, value, self.ttl(tier));
    }

    /// Drop everything, fresh or not.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn cache() -> ResponseCache {
        ResponseCache::new(CacheTtls::default())
    }

    #[tokio::test(start_paused = true)]
    async fn get_after_put_returns_the_value() {
        let cache = cache();
        cache.put("net1:port-statuses", json!({"p": 1}), Duration::from_secs(60));
        assert_eq!(
            cache.get("net1:port-statuses"),
            Some(json!({"p": 1}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let cache = cache();
        cache.put("k", json!(1), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("k"), Some(json!(1)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k"), None);
        // Lazy eviction removed the entry on read.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_bounds_the_store() {
        let cache = cache();
        cache.put("a", json!(1), Duration::from_secs(10));
        cache.put("b", json!(2), Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_all_clears_fresh_entries() {
        let cache = cache();
        cache.put_tier("a", json!(1), TtlTier::Long);
        cache.invalidate_all();
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn keys_cannot_collide_across_scopes() {
        let per_network = ResponseCache::key("N_1", "connection-stats", None);
        let per_device = ResponseCache::key("N_1", "connection-stats", Some("Q2AP-1"));
        assert_ne!(per_network, per_device);
        assert_eq!(per_device, "N_1:connection-stats:Q2AP-1");
    }

    #[test]
    fn tier_durations_follow_config() {
        let cache = ResponseCache::new(CacheTtls {
            standard: Duration::from_secs(5),
            extended: Duration::from_secs(50),
            long: Duration::from_secs(500),
        });
        assert_eq!(cache.ttl(TtlTier::Standard), Duration::from_secs(5));
        assert_eq!(cache.ttl(TtlTier::Extended), Duration::from_secs(50));
        assert_eq!(cache.ttl(TtlTier::Long), Duration::from_secs(500));
    }
}
