// Endpoint methods for `DashboardClient`, grouped by resource family.
//
// Each file contributes an inherent impl block. Inventory endpoints are
// typed; aggregates return `serde_json::Value`.

mod networks;
mod organizations;
mod sensors;
mod switches;
mod wireless;
