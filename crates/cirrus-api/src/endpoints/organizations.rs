// Organization-scoped endpoints
//
// Inventory (typed) plus the org-wide aggregate overviews consumed by
// the tiered refresh scheduler. Overviews return loosely-typed JSON
// because the field set varies by product mix and license model.

use serde_json::Value;
use tracing::debug;

use crate::client::DashboardClient;
use crate::error::Error;
use crate::models::{DeviceInfo, DeviceStatusInfo, NetworkInfo, OrganizationInfo};

impl DashboardClient {
    /// Fetch a single organization.
    ///
    /// `GET organizations/{id}`
    pub async fn get_organization(&self, org_id: &str) -> Result<OrganizationInfo, Error> {
        debug!(org_id, "fetching organization");
        self.get(&format!("organizations/{org_id}")).await
    }

    /// List all networks in an organization.
    ///
    /// `GET organizations/{id}/networks`
    pub async fn list_networks(&self, org_id: &str) -> Result<Vec<NetworkInfo>, Error> {
        debug!(org_id, "listing networks");
        self.get(&format!("organizations/{org_id}/networks")).await
    }

    /// List the organization-wide device inventory.
    ///
    /// `GET organizations/{id}/devices`
    pub async fn list_devices(&self, org_id: &str) -> Result<Vec<DeviceInfo>, Error> {
        debug!(org_id, "listing devices");
        self.get(&format!("organizations/{org_id}/devices")).await
    }

    /// List connectivity statuses for every device in the organization.
    ///
    /// `GET organizations/{id}/devices/statuses`
    pub async fn list_device_statuses(
        &self,
        org_id: &str,
    ) -> Result<Vec<DeviceStatusInfo>, Error> {
        debug!(org_id, "listing device statuses");
        self.get(&format!("organizations/{org_id}/devices/statuses"))
            .await
    }

    /// Licensing/entitlement summary.
    ///
    /// `GET organizations/{id}/licenses/overview`
    pub async fn licenses_overview(&self, org_id: &str) -> Result<Value, Error> {
        debug!(org_id, "fetching licenses overview");
        self.get(&format!("organizations/{org_id}/licenses/overview"))
            .await
    }

    /// Active alert counts by severity and category.
    ///
    /// `GET organizations/{id}/assurance/alerts/overview`
    pub async fn alerts_overview(&self, org_id: &str) -> Result<Value, Error> {
        debug!(org_id, "fetching alerts overview");
        self.get(&format!("organizations/{org_id}/assurance/alerts/overview"))
            .await
    }

    /// Client-count and usage overview for the trailing window.
    ///
    /// `GET organizations/{id}/clients/overview`
    pub async fn clients_overview(&self, org_id: &str) -> Result<Value, Error> {
        debug!(org_id, "fetching clients overview");
        self.get(&format!("organizations/{org_id}/clients/overview"))
            .await
    }

    /// Per-device memory utilization history.
    ///
    /// `GET organizations/{id}/devices/system/memory/usage/history`
    pub async fn memory_usage_history(&self, org_id: &str) -> Result<Value, Error> {
        debug!(org_id, "fetching memory usage history");
        self.get(&format!(
            "organizations/{org_id}/devices/system/memory/usage/history"
        ))
        .await
    }

    /// Ethernet/power status for wireless devices (PoE, aggregation).
    ///
    /// `GET organizations/{id}/wireless/devices/ethernet/statuses`
    pub async fn ethernet_statuses(&self, org_id: &str) -> Result<Value, Error> {
        debug!(org_id, "fetching ethernet statuses");
        self.get(&format!(
            "organizations/{org_id}/wireless/devices/ethernet/statuses"
        ))
        .await
    }

    /// Short-range Bluetooth client counts across the organization.
    ///
    /// `GET organizations/{id}/bluetooth/clients/overview`
    pub async fn bluetooth_clients_overview(&self, org_id: &str) -> Result<Value, Error> {
        debug!(org_id, "fetching bluetooth clients overview");
        self.get(&format!("organizations/{org_id}/bluetooth/clients/overview"))
            .await
    }
}
