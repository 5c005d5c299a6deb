// ── Device model ──

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use cirrus_api::{DeviceInfo, StatusValue};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter};

/// A category of device with a distinct telemetry shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceClass {
    Sensor,
    Wireless,
    Switch,
}

impl DeviceClass {
    /// Map the wire `productType` onto a class. Unrecognized product
    /// lines have no hub and are ignored by discovery.
    pub fn from_product_type(product_type: &str) -> Option<Self> {
        match product_type {
            "sensor" => Some(Self::Sensor),
            "wireless" => Some(Self::Wireless),
            "switch" => Some(Self::Switch),
            _ => None,
        }
    }
}

/// Connectivity state mirrored from the organization-wide status feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Alerting,
    Dormant,
    Offline,
    /// Not present in the status feed. Treated as reachable (fail-open)
    /// so a feed gap cannot starve a device's telemetry; hubs count
    /// these so the pressure stays observable.
    Unknown,
}

impl From<StatusValue> for DeviceStatus {
    fn from(value: StatusValue) -> Self {
        match value {
            StatusValue::Online => Self::Online,
            StatusValue::Alerting => Self::Alerting,
            StatusValue::Dormant => Self::Dormant,
            StatusValue::Offline => Self::Offline,
            StatusValue::Unknown => Self::Unknown,
        }
    }
}

impl DeviceStatus {
    /// Whether the device is eligible for detailed telemetry calls.
    pub fn is_reachable(self) -> bool {
        matches!(self, Self::Online | Self::Alerting | Self::Unknown)
    }
}

/// A device in a hub's inventory. The serial is the stable identity;
/// device lists are replaced wholesale on every discovery pass.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub serial: String,
    pub model: String,
    pub name: Option<String>,
    pub network_id: String,
    pub class: DeviceClass,
    pub mac: Option<String>,
    pub firmware: Option<String>,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Device {
    /// Build a device from the wire inventory record plus the status
    /// known at discovery time.
    pub fn from_info(info: DeviceInfo, class: DeviceClass, status: DeviceStatus) -> Self {
        Self {
            serial: info.serial,
            model: info.model,
            name: info.name,
            network_id: info.network_id,
            class,
            mac: info.mac,
            firmware: info.firmware,
            status,
            last_seen: None,
        }
    }
}

// ── Sensor capabilities ──────────────────────────────────────────────

/// A metric a sensor can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum SensorCapability {
    Temperature,
    Humidity,
    Co2,
    Tvoc,
    Pm25,
    Noise,
    IndoorAirQuality,
    Door,
    Water,
    Battery,
    Button,
}

impl SensorCapability {
    fn from_metric(metric: &str) -> Option<Self> {
        match metric {
            "temperature" => Some(Self::Temperature),
            "humidity" => Some(Self::Humidity),
            "co2" => Some(Self::Co2),
            "tvoc" => Some(Self::Tvoc),
            "pm25" => Some(Self::Pm25),
            "noise" => Some(Self::Noise),
            "indoorAirQuality" => Some(Self::IndoorAirQuality),
            "door" => Some(Self::Door),
            "water" => Some(Self::Water),
            "battery" => Some(Self::Battery),
            "button" => Some(Self::Button),
            _ => None,
        }
    }
}

/// Resolve a sensor's capability set from a live readings payload: one
/// capability per `metric` the device actually reported.
pub fn sensor_capabilities_from_readings(readings: &serde_json::Value) -> BTreeSet<SensorCapability> {
    let mut caps = BTreeSet::new();
    if let Some(entries) = readings.as_array() {
        for entry in entries {
            if let Some(metric) = entry.get("metric").and_then(|m| m.as_str()) {
                if let Some(cap) = SensorCapability::from_metric(metric) {
                    caps.insert(cap);
                }
            }
        }
    }
    caps
}

/// Static per-model fallback used when no live reading is available at
/// discovery time. Keyed on the model family prefix.
pub fn sensor_capabilities_for_model(model: &str) -> BTreeSet<SensorCapability> {
    let caps: &[SensorCapability] = if model.starts_with("SN-2") {
        &[
            SensorCapability::Temperature,
            SensorCapability::Humidity,
            SensorCapability::Battery,
        ]
    } else if model.starts_with("SN-3") {
        &[
            SensorCapability::Temperature,
            SensorCapability::Humidity,
            SensorCapability::Co2,
            SensorCapability::Tvoc,
            SensorCapability::Pm25,
            SensorCapability::Noise,
            SensorCapability::IndoorAirQuality,
        ]
    } else if model.starts_with("SN-4") {
        &[SensorCapability::Door, SensorCapability::Battery]
    } else if model.starts_with("SN-5") {
        &[SensorCapability::Water, SensorCapability::Battery]
    } else {
        &[]
    };
    caps.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_type_mapping() {
        assert_eq!(
            DeviceClass::from_product_type("sensor"),
            Some(DeviceClass::Sensor)
        );
        assert_eq!(
            DeviceClass::from_product_type("wireless"),
            Some(DeviceClass::Wireless)
        );
        assert_eq!(DeviceClass::from_product_type("cellularGateway"), None);
    }

    #[test]
    fn unknown_status_is_fail_open() {
        assert!(DeviceStatus::Unknown.is_reachable());
        assert!(DeviceStatus::Online.is_reachable());
        assert!(DeviceStatus::Alerting.is_reachable());
        assert!(!DeviceStatus::Offline.is_reachable());
        assert!(!DeviceStatus::Dormant.is_reachable());
    }

    #[test]
    fn live_readings_win_over_model_table() {
        let readings = json!([
            { "metric": "temperature", "temperature": { "celsius": 20.0 } },
            { "metric": "door", "door": { "open": false } },
            { "metric": "somethingNew", "value": 1 },
        ]);

        let caps = sensor_capabilities_from_readings(&readings);
        assert!(caps.contains(&SensorCapability::Temperature));
        assert!(caps.contains(&SensorCapability::Door));
        assert_eq!(caps.len(), 2);
    }

    #[test]
    fn model_fallback_table() {
        let caps = sensor_capabilities_for_model("SN-30-EU");
        assert!(caps.contains(&SensorCapability::Co2));
        assert!(caps.contains(&SensorCapability::IndoorAirQuality));

        assert!(sensor_capabilities_for_model("AP-40").is_empty());
    }
}
