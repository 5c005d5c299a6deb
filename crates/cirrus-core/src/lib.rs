// cirrus-core: API orchestration and fleet inventory layer.
//
// Mirrors one organization's device fleet (networks → class hubs →
// devices) into an in-memory model under a shared request-rate budget.
// The shared machinery (rate limiter, retry, cache, batch executor) is
// dependency-injected into every hub; nothing here is a module-level
// singleton.

pub mod batch;
pub mod cache;
pub mod call;
pub mod config;
pub mod error;
pub mod hub;
pub mod limiter;
pub mod model;
pub mod retry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use batch::run_batched;
pub use cache::{ResponseCache, TtlTier};
pub use call::{ApiCall, CallResult};
pub use config::{CacheTtls, ClassToggles, FleetConfig, TierIntervals};
pub use error::CoreError;
pub use hub::{
    validate_config, DeviceInventoryHub, DiscoveryOutcome, FleetHub, FleetState, HubState,
    OrgAggregate, SharedResources, StatusFeed, TelemetrySummary, TierStatus,
};
pub use limiter::{priority, RateLimiter, RateLimiterConfig, RateLimiterStats};
pub use retry::{run_with_retry, RetryStrategy};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Device, DeviceClass, DeviceStatus, DeviceTelemetry, Network, Organization, RefreshTier,
    SensorCapability, TelemetryKind,
};
