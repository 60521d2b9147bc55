// Pull API HTTP client
//
// Wraps `reqwest::Client` with alert-server URL construction, status
// mapping, and body decoding. This is the request/response fallback for
// the push channel and the transport for operator actions.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{ActionRequest, ActionResponse, AlertPage, AlertPayload};
use crate::transport::TransportConfig;

/// Raw HTTP client for the alert server's pull API.
pub struct AlertClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AlertClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `https://nvr.local/api`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Full snapshot of the active partition.
    ///
    /// `GET /alerts/active`
    pub async fn list_active(&self) -> Result<Vec<AlertPayload>, Error> {
        let url = self.url("alerts/active")?;
        debug!("listing active alerts");
        self.get(url).await
    }

    /// One page of alert history.
    ///
    /// `GET /alerts?page={page}&limit={limit}`
    pub async fn list_alerts(&self, page: u32, limit: u32) -> Result<AlertPage, Error> {
        let mut url = self.url("alerts")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());
        debug!(page, limit, "listing alert history");
        self.get(url).await
    }

    /// A single alert.
    ///
    /// `GET /alerts/{id}`
    pub async fn get_alert(&self, id: &str) -> Result<AlertPayload, Error> {
        let url = self.url(&format!("alerts/{id}"))?;
        debug!(alert_id = id, "fetching alert");
        self.get(url).await
    }

    /// Submit an operator action.
    ///
    /// `POST /alerts/{id}/actions` with `{action, ...extra}`. A `success: false`
    /// body is returned as-is; interpreting it is the caller's job.
    pub async fn post_action(
        &self,
        id: &str,
        request: &ActionRequest,
    ) -> Result<ActionResponse, Error> {
        let url = self.url(&format!("alerts/{id}/actions"))?;
        debug!(alert_id = id, action = %request.action, "posting alert action");
        self.post(url, request).await
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join `path` onto the base URL, treating the base as a directory.
    fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        Self::parse_body(resp).await
    }

    async fn post<T: DeserializeOwned>(&self, url: Url, body: &impl Serialize) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self.http.post(url).json(body).send().await?;
        Self::parse_body(resp).await
    }

    /// Map HTTP status to errors, then decode the JSON body.
    async fn parse_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("server returned {status}"),
            });
        }

        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Pull `error` / `message` out of a JSON error body, if there is one.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}
