// Developer API HTTP client
//
// Wraps `reqwest::Client` with the hub's URL layout and the `{ data: [...] }`
// envelope used by the device listing. Every request carries the bearer token
// through the client's default headers.

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::models::{RawDevice, flatten_depth2};
use crate::transport::TransportConfig;

const API_PREFIX: [&str; 3] = ["api", "v1", "developer"];

/// HTTP client for a single Access hub.
///
/// Cheap to clone; the inner `reqwest::Client` shares its connection pool.
#[derive(Debug, Clone)]
pub struct AccessClient {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope {
    data: Vec<serde_json::Value>,
}

impl AccessClient {
    /// Create a client for the hub at `base_url` (e.g. `https://10.0.0.1:12445`).
    pub fn new(
        base_url: Url,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(token)?;
        Ok(Self::from_reqwest(base_url, http))
    }

    /// Create a client from a pre-built `reqwest::Client`.
    ///
    /// The caller is responsible for attaching the `Authorization` header.
    pub fn from_reqwest(base_url: Url, http: reqwest::Client) -> Self {
        Self { http, base_url }
    }

    /// The hub base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/api/v1/developer/{segments...}` with each segment escaped.
    fn api_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    /// WebSocket URL of the device notification stream.
    ///
    /// `https` maps to `wss` and `http` to `ws`.
    pub fn notifications_url(&self) -> Result<Url, Error> {
        let mut url = self.api_url(&["devices", "notifications"])?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(Error::InvalidBaseUrl(format!(
                    "unsupported scheme {other:?} in {}",
                    self.base_url
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?;
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// List every device adopted by the hub.
    ///
    /// The `data` array is flattened two levels deep. Entries that do not
    /// decode as a device are skipped with a warning; an empty listing is an
    /// error.
    pub async fn list_devices(&self) -> Result<Vec<RawDevice>, Error> {
        const ENDPOINT: &str = "devices";

        let url = self.api_url(&[ENDPOINT])?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        let body = expect_ok(resp).await?;

        let envelope: DataEnvelope =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        let entries = flatten_depth2(envelope.data);
        if entries.is_empty() {
            return Err(Error::EmptyData { endpoint: ENDPOINT });
        }

        let devices: Vec<RawDevice> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<RawDevice>(entry) {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!(error = %e, "skipping malformed device entry");
                    None
                }
            })
            .collect();

        debug!(count = devices.len(), "devices listed");
        Ok(devices)
    }

    /// Fetch the door listing. The body is returned untouched.
    pub async fn list_doors(&self) -> Result<serde_json::Value, Error> {
        let url = self.api_url(&["doors"])?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        let body = expect_ok(resp).await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Trigger a remote unlock of a door.
    ///
    /// Issues exactly one `PUT`; anything but HTTP 200 is an error. No retry
    /// happens here.
    pub async fn unlock_door(&self, door_id: &str) -> Result<(), Error> {
        let url = self.api_url(&["doors", door_id, "unlock"])?;
        debug!("PUT {url}");

        let resp = self
            .http
            .put(url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        expect_ok(resp).await?;

        debug!(door_id, "door unlock accepted");
        Ok(())
    }
}

/// Read the body of a 200 response, or turn any other status into `Error::Api`.
async fn expect_ok(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if status == reqwest::StatusCode::OK {
        return Ok(body);
    }

    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_owned()
    } else {
        body
    };
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}
