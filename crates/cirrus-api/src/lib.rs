// cirrus-api: async client for the cloud dashboard API.
//
// Transport mechanics live in `client`/`transport`; endpoint methods are
// implemented as inherent impl blocks split by resource family under
// `endpoints`. `cirrus-core` consumes this crate and never touches
// reqwest directly.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod transport;

pub use client::DashboardClient;
pub use error::{Error, ErrorKind};
pub use models::{DeviceInfo, DeviceStatusInfo, NetworkInfo, OrganizationInfo, StatusValue};
pub use transport::TransportConfig;
