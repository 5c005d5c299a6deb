// Wire models for the dashboard API.
//
// Inventory endpoints are strongly typed; aggregate/report endpoints
// stay `serde_json::Value` (see `endpoints`) because their field set
// varies by product line and firmware.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// An organization as returned by `GET organizations/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationInfo {
    pub id: String,
    pub name: String,
    /// Dashboard URL for this organization, used as the API shard base.
    pub url: Option<String>,
}

/// A network within an organization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    pub organization_id: String,
    /// Product lines present in this network (e.g. `"sensor"`).
    #[serde(default)]
    pub product_types: Vec<String>,
}

/// A device in the organization-wide inventory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub serial: String,
    pub model: String,
    #[serde(default)]
    pub name: Option<String>,
    pub network_id: String,
    pub product_type: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
}

/// Connectivity state from the organization-wide status feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusValue {
    Online,
    Alerting,
    Dormant,
    Offline,
    #[serde(other)]
    Unknown,
}

/// One entry of `GET organizations/{id}/devices/statuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusInfo {
    pub serial: String,
    pub status: StatusValue,
    #[serde(default)]
    pub last_reported_at: Option<DateTime<Utc>>,
}
