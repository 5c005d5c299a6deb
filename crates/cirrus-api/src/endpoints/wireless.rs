// Wireless telemetry endpoints
//
// Per-device connection/latency statistics and per-network SSID
// configuration. Timespans are whole seconds.

use serde_json::Value;
use tracing::debug;

use crate::client::DashboardClient;
use crate::error::Error;

impl DashboardClient {
    /// Aggregated client connection statistics for one access point.
    ///
    /// `GET devices/{serial}/wireless/connectionStats?timespan=...`
    pub async fn wireless_connection_stats(
        &self,
        serial: &str,
        timespan_secs: u64,
    ) -> Result<Value, Error> {
        debug!(serial, timespan_secs, "fetching wireless connection stats");
        self.get_with_params(
            &format!("devices/{serial}/wireless/connectionStats"),
            &[("timespan", timespan_secs.to_string())],
        )
        .await
    }

    /// Latency statistics for one access point.
    ///
    /// `GET devices/{serial}/wireless/latencyStats?timespan=...`
    pub async fn wireless_latency_stats(
        &self,
        serial: &str,
        timespan_secs: u64,
    ) -> Result<Value, Error> {
        debug!(serial, timespan_secs, "fetching wireless latency stats");
        self.get_with_params(
            &format!("devices/{serial}/wireless/latencyStats"),
            &[("timespan", timespan_secs.to_string())],
        )
        .await
    }

    /// SSID configuration for a network. Near-static data.
    ///
    /// `GET networks/{id}/wireless/ssids`
    pub async fn wireless_ssids(&self, network_id: &str) -> Result<Value, Error> {
        debug!(network_id, "fetching SSID configuration");
        self.get(&format!("networks/{network_id}/wireless/ssids"))
            .await
    }
}
