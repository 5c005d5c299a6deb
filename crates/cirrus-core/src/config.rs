// ── Runtime fleet configuration ──
//
// These values describe *how* to mirror one organization. The host
// layer (config wizard) constructs a `FleetConfig` and hands it in;
// the core treats it as immutable for the instance lifetime and never
// touches disk. Changing any value means rebuilding the FleetHub.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::model::{DeviceClass, RefreshTier};

/// Per-tier refresh intervals.
#[derive(Debug, Clone)]
pub struct TierIntervals {
    /// Licensing/entitlement summary.
    pub static_data: Duration,
    /// Device status overview, memory history, ethernet/power status.
    pub semi_static: Duration,
    /// Alert counts, client overview, Bluetooth client counts.
    pub dynamic: Duration,
}

impl Default for TierIntervals {
    fn default() -> Self {
        Self {
            static_data: Duration::from_secs(3600),
            semi_static: Duration::from_secs(1800),
            dynamic: Duration::from_secs(300),
        }
    }
}

impl TierIntervals {
    pub fn interval(&self, tier: RefreshTier) -> Duration {
        match tier {
            RefreshTier::Static => self.static_data,
            RefreshTier::SemiStatic => self.semi_static,
            RefreshTier::Dynamic => self.dynamic,
        }
    }
}

/// Cache TTL tiers (see `cache::TtlTier` for which data uses which).
#[derive(Debug, Clone)]
pub struct CacheTtls {
    pub standard: Duration,
    pub extended: Duration,
    pub long: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            standard: Duration::from_secs(60),
            extended: Duration::from_secs(300),
            long: Duration::from_secs(1800),
        }
    }
}

/// Which device classes get telemetry refreshes.
#[derive(Debug, Clone)]
pub struct ClassToggles {
    pub sensor: bool,
    pub wireless: bool,
    pub switch: bool,
}

impl Default for ClassToggles {
    fn default() -> Self {
        Self {
            sensor: true,
            wireless: true,
            switch: true,
        }
    }
}

impl ClassToggles {
    pub fn enabled(&self, class: DeviceClass) -> bool {
        match class {
            DeviceClass::Sensor => self.sensor,
            DeviceClass::Wireless => self.wireless,
            DeviceClass::Switch => self.switch,
        }
    }
}

/// Configuration for mirroring a single organization.
///
/// Built by the host layer, passed to `FleetHub` -- the core never
/// reads config files.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Dashboard API key.
    pub api_key: SecretString,
    /// Organization to mirror.
    pub organization_id: String,
    /// Dashboard base URL (e.g. `https://dashboard.cirrus.example`).
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// How often each hub refreshes telemetry.
    pub scan_interval: Duration,
    /// How often each hub re-discovers its device list.
    pub discovery_interval: Duration,
    /// Floor between completed discoveries; re-entries inside this
    /// window are no-ops regardless of which timer fired.
    pub min_discovery_interval: Duration,
    /// Per-tier refresh intervals.
    pub tier_intervals: TierIntervals,
    /// Cache TTL tier overrides.
    pub cache_ttls: CacheTtls,
    /// Per-class telemetry toggles.
    pub classes: ClassToggles,
    /// Rate limiter worker count (global call concurrency).
    pub max_concurrent_calls: usize,
    /// Rate ceiling: call starts allowed per trailing second.
    pub calls_per_second: usize,
    /// Batch executor chunk size for per-device telemetry calls.
    pub batch_size: usize,
    /// Pause between telemetry batches.
    pub inter_batch_delay: Duration,
    /// Trailing window requested from stats endpoints.
    pub telemetry_timespan: Duration,
}

impl FleetConfig {
    /// Build a config with documented defaults for everything except
    /// the credentials and organization identity.
    pub fn new(api_key: SecretString, organization_id: impl Into<String>, base_url: Url) -> Self {
        Self {
            api_key,
            organization_id: organization_id.into(),
            base_url,
            timeout: Duration::from_secs(30),
            scan_interval: Duration::from_secs(60),
            discovery_interval: Duration::from_secs(300),
            min_discovery_interval: Duration::from_secs(30),
            tier_intervals: TierIntervals::default(),
            cache_ttls: CacheTtls::default(),
            classes: ClassToggles::default(),
            max_concurrent_calls: 4,
            calls_per_second: 8,
            batch_size: 4,
            inter_batch_delay: Duration::from_millis(150),
            telemetry_timespan: Duration::from_secs(300),
        }
    }
}
