// Network-scoped endpoints

use tracing::debug;

use crate::client::DashboardClient;
use crate::error::Error;
use crate::models::DeviceInfo;

impl DashboardClient {
    /// List the devices claimed into a single network.
    ///
    /// `GET networks/{id}/devices`
    pub async fn list_network_devices(&self, network_id: &str) -> Result<Vec<DeviceInfo>, Error> {
        debug!(network_id, "listing network devices");
        self.get(&format!("networks/{network_id}/devices")).await
    }
}
