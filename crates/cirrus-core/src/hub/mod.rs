// ── Fleet hubs ──
//
// `FleetHub` owns one organization's view; `DeviceInventoryHub` owns
// one (network, device-class) slice of it. Both lean on the shared
// machinery in `limiter`/`retry`/`cache`/`batch`.

pub mod fleet;
pub mod inventory;

pub use fleet::{validate_config, FleetHub, FleetState, OrgAggregate, TierStatus};
pub use inventory::{DeviceInventoryHub, DiscoveryOutcome, HubState, TelemetrySummary};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cirrus_api::{DashboardClient, DeviceStatusInfo, TransportConfig};
use dashmap::DashMap;

use crate::cache::ResponseCache;
use crate::config::FleetConfig;
use crate::error::CoreError;
use crate::limiter::{RateLimiter, RateLimiterConfig};
use crate::model::DeviceStatus;

/// Process-wide handles shared by every hub of one integration
/// instance. Constructed once, passed by reference -- never a
/// module-level singleton, so tests can build isolated instances.
pub struct SharedResources {
    pub client: Arc<DashboardClient>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResponseCache>,
    pub statuses: StatusFeed,
    pub config: FleetConfig,
}

impl SharedResources {
    pub fn new(config: FleetConfig) -> Result<Arc<Self>, CoreError> {
        let transport = TransportConfig {
            timeout: config.timeout,
        };
        let client = DashboardClient::new(config.base_url.clone(), &config.api_key, &transport)?;

        let limiter = RateLimiter::new(RateLimiterConfig {
            max_concurrent: config.max_concurrent_calls,
            calls_per_second: config.calls_per_second,
        });

        let cache = ResponseCache::new(config.cache_ttls.clone());

        Ok(Arc::new(Self {
            client: Arc::new(client),
            limiter: Arc::new(limiter),
            cache: Arc::new(cache),
            statuses: StatusFeed::new(),
            config,
        }))
    }
}

struct StatusRecord {
    status: DeviceStatus,
    last_reported_at: Option<DateTime<Utc>>,
}

/// Organization-wide device status feed, refreshed by the semi-static
/// tier and consulted by every hub when splitting online/offline.
pub struct StatusFeed {
    records: DashMap<String, StatusRecord>,
    /// Lookups that found no record and fell open to "reachable".
    unknown_lookups: AtomicU64,
}

impl StatusFeed {
    fn new() -> Self {
        Self {
            records: DashMap::new(),
            unknown_lookups: AtomicU64::new(0),
        }
    }

    /// Replace the feed with a full status listing.
    pub fn apply(&self, statuses: &[DeviceStatusInfo]) {
        self.records.clear();
        for info in statuses {
            self.records.insert(
                info.serial.clone(),
                StatusRecord {
                    status: DeviceStatus::from(info.status),
                    last_reported_at: info.last_reported_at,
                },
            );
        }
    }

    /// The recorded status, if the feed has seen this serial.
    pub fn status_of(&self, serial: &str) -> Option<DeviceStatus> {
        self.records.get(serial).map(|r| r.status)
    }

    /// The status used for eligibility decisions. A serial missing from
    /// the feed reads as `Unknown` (fail-open) and bumps a counter so
    /// the resulting call pressure stays observable.
    pub fn effective_status(&self, serial: &str) -> DeviceStatus {
        match self.status_of(serial) {
            Some(status) => status,
            None => {
                self.unknown_lookups.fetch_add(1, Ordering::Relaxed);
                DeviceStatus::Unknown
            }
        }
    }

    pub fn last_seen(&self, serial: &str) -> Option<DateTime<Utc>> {
        self.records.get(serial).and_then(|r| r.last_reported_at)
    }

    pub fn unknown_lookups(&self) -> u64 {
        self.unknown_lookups.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use cirrus_api::StatusValue;

    use super::*;

    fn info(serial: &str, status: StatusValue) -> DeviceStatusInfo {
        DeviceStatusInfo {
            serial: serial.to_owned(),
            status,
            last_reported_at: None,
        }
    }

    #[test]
    fn apply_replaces_the_feed_wholesale() {
        let feed = StatusFeed::new();
        feed.apply(&[info("A", StatusValue::Online), info("B", StatusValue::Offline)]);
        assert_eq!(feed.status_of("A"), Some(DeviceStatus::Online));
        assert_eq!(feed.status_of("B"), Some(DeviceStatus::Offline));

        feed.apply(&[info("B", StatusValue::Online)]);
        assert_eq!(feed.status_of("A"), None);
        assert_eq!(feed.status_of("B"), Some(DeviceStatus::Online));
    }

    #[test]
    fn missing_serials_fail_open_and_are_counted() {
        let feed = StatusFeed::new();
        feed.apply(&[info("A", StatusValue::Online)]);

        assert_eq!(feed.effective_status("GHOST"), DeviceStatus::Unknown);
        assert!(DeviceStatus::Unknown.is_reachable());
        assert_eq!(feed.unknown_lookups(), 1);

        // Known serials do not bump the counter.
        assert_eq!(feed.effective_status("A"), DeviceStatus::Online);
        assert_eq!(feed.unknown_lookups(), 1);
    }
}
