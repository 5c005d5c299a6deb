// Dashboard API HTTP client
//
// Wraps `reqwest::Client` with versioned URL construction and
// status-code triage into the crate's error taxonomy. All endpoint
// modules (organizations, sensors, wireless, switches) are implemented
// as inherent methods in separate files to keep this module focused on
// transport mechanics.

use reqwest::StatusCode;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const API_PREFIX: &str = "api/v1/";

/// Error body shape the dashboard returns alongside non-2xx statuses.
#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Raw HTTP client for the cloud dashboard API.
///
/// Handles base-URL normalization, `api/v1/` path construction, and the
/// mapping from HTTP status codes to [`Error`] variants. Callers get
/// decoded payloads or a classified error, never a raw response.
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DashboardClient {
    /// Create a client from a base URL and API key.
    pub fn new(
        base_url: Url,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(api_key)?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
        })
    }

    /// The dashboard base URL (normalized, trailing slash).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"organizations/{id}/networks"`) onto
    /// the versioned API root.
    fn url(&self, path: &str) -> Result<Url, Error> {
        let full = format!("{API_PREFIX}{path}");
        Ok(self.base_url.join(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON payload.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        handle_response(resp).await
    }

    /// Send a GET request with query parameters and decode the payload.
    pub(crate) async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(Error::Transport)?;
        handle_response(resp).await
    }
}

/// Ensure the base URL ends with a slash so `Url::join` keeps the path.
fn normalize_base_url(mut url: Url) -> Url {
    let path = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{path}/"));
    url
}

/// Triage a response: 2xx decodes the body, everything else maps onto
/// the error taxonomy.
async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status.is_success() {
        let body = resp.text().await.map_err(Error::Transport)?;
        return serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        });
    }

    let retry_after = parse_retry_after(&resp);
    let message = error_message(resp).await;

    match status {
        StatusCode::UNAUTHORIZED => Err(Error::Authentication { message }),
        StatusCode::FORBIDDEN => Err(Error::Authorization { message }),
        StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited {
            retry_after_secs: retry_after,
        }),
        s if s.is_server_error() => Err(Error::Server {
            status: s.as_u16(),
            message,
        }),
        s => Err(Error::Client {
            status: s.as_u16(),
            message,
        }),
    }
}

/// Parse the `Retry-After` header as whole seconds, if present.
fn parse_retry_after(resp: &reqwest::Response) -> Option<u64> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Extract a human-readable message from an error response body.
///
/// The dashboard uses `{"errors": ["..."]}`; anything else falls back to
/// the raw body or the bare status line.
async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
        if !parsed.errors.is_empty() {
            return parsed.errors.join("; ");
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_owned()
    } else {
        body
    }
}
