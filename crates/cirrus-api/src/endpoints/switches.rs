// Switch telemetry endpoints

use serde_json::Value;
use tracing::debug;

use crate::client::DashboardClient;
use crate::error::Error;

impl DashboardClient {
    /// Per-port status and counters for one switch.
    ///
    /// `GET devices/{serial}/switch/ports/statuses?timespan=...`
    pub async fn switch_port_statuses(
        &self,
        serial: &str,
        timespan_secs: u64,
    ) -> Result<Value, Error> {
        debug!(serial, timespan_secs, "fetching switch port statuses");
        self.get_with_params(
            &format!("devices/{serial}/switch/ports/statuses"),
            &[("timespan", timespan_secs.to_string())],
        )
        .await
    }
}
