// ── Fleet domain model ──
//
// Canonical representations of the mirrored hierarchy: organization →
// network → device, plus the telemetry records hubs maintain per
// serial. Wire types from `cirrus-api` are converted here and never
// leak to consumers.

pub mod device;
pub mod telemetry;

use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter};
use url::Url;

pub use device::{
    sensor_capabilities_for_model, sensor_capabilities_from_readings, Device, DeviceClass,
    DeviceStatus, SensorCapability,
};
pub use telemetry::{DeviceTelemetry, TelemetryKind};

/// The top-level tenant. Identity is immutable for the process
/// lifetime; the display name is refreshed.
#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub base_url: Url,
}

/// A site-level grouping of devices. Back-references its organization;
/// ownership stays with the FleetHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub organization_id: String,
}

/// One of the three independently-paced refresh cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum RefreshTier {
    /// Licensing/entitlement summary (~hourly).
    Static,
    /// Status overview, memory history, ethernet/power (~30 min).
    SemiStatic,
    /// Alerts, client overview, Bluetooth counts (~5 min).
    Dynamic,
}
