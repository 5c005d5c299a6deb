// ── Per-device telemetry records ──
//
// Telemetry is merged per serial, one slot per metric kind. A failed
// fetch leaves its slot absent; the rest of the record survives.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter};

use super::DeviceClass;

/// One class-specific metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum TelemetryKind {
    SensorReadings,
    ConnectionStats,
    LatencyStats,
    PortStatuses,
}

impl DeviceClass {
    /// The metric families fetched per device of this class.
    pub fn telemetry_kinds(self) -> &'static [TelemetryKind] {
        match self {
            Self::Sensor => &[TelemetryKind::SensorReadings],
            Self::Wireless => &[TelemetryKind::ConnectionStats, TelemetryKind::LatencyStats],
            Self::Switch => &[TelemetryKind::PortStatuses],
        }
    }
}

/// The telemetry record a hub maintains for one serial.
#[derive(Debug, Clone, Default)]
pub struct DeviceTelemetry {
    pub metrics: BTreeMap<TelemetryKind, Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceTelemetry {
    /// Merge one fetched metric into the record.
    pub fn merge(&mut self, kind: TelemetryKind, value: Value) {
        self.metrics.insert(kind, value);
        self.updated_at = Some(Utc::now());
    }

    pub fn metric(&self, kind: TelemetryKind) -> Option<&Value> {
        self.metrics.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_other_slots() {
        let mut record = DeviceTelemetry::default();
        record.merge(TelemetryKind::ConnectionStats, json!({"success": 5}));
        record.merge(TelemetryKind::LatencyStats, json!({"p50": 12}));

        assert_eq!(
            record.metric(TelemetryKind::ConnectionStats),
            Some(&json!({"success": 5}))
        );
        assert_eq!(record.metrics.len(), 2);
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn class_kinds_are_disjoint_per_shape() {
        assert_eq!(
            DeviceClass::Sensor.telemetry_kinds(),
            &[TelemetryKind::SensorReadings]
        );
        assert_eq!(DeviceClass::Wireless.telemetry_kinds().len(), 2);
        assert_eq!(
            DeviceClass::Switch.telemetry_kinds(),
            &[TelemetryKind::PortStatuses]
        );
    }
}
