// Sensor telemetry endpoints
//
// Latest readings come back as one entry per device with a `readings`
// array whose element shape depends on the metric, so the payload stays
// loosely typed.

use serde_json::Value;
use tracing::debug;

use crate::client::DashboardClient;
use crate::error::Error;

impl DashboardClient {
    /// Latest reading per metric for the requested sensors.
    ///
    /// `GET organizations/{id}/sensor/readings/latest?serials[]=...`
    ///
    /// When `serials` is empty the dashboard returns readings for every
    /// sensor in the organization.
    pub async fn latest_sensor_readings(
        &self,
        org_id: &str,
        serials: &[String],
    ) -> Result<Value, Error> {
        debug!(org_id, count = serials.len(), "fetching latest sensor readings");

        let params: Vec<(&str, String)> = serials
            .iter()
            .map(|s| ("serials[]", s.clone()))
            .collect();

        self.get_with_params(
            &format!("organizations/{org_id}/sensor/readings/latest"),
            &params,
        )
        .await
    }
}
