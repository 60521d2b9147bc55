// Raw wire types for the alert server.
//
// These mirror the JSON the server emits and are intentionally loose:
// enumerated fields stay strings here and are validated by `vigia-core`
// when converting into domain types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-assigned identifier. Emitted as either a JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Alert timestamp: seconds since epoch, or an RFC 3339 string from
/// older server builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Seconds(f64),
    Text(String),
}

/// An alert as carried by push messages and pull responses.
///
/// Uses `#[serde(flatten)]` to capture all fields beyond the core set,
/// so nothing from the server is silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub id: RawId,

    /// Alert kind: `"intrusion"`, `"loitering"`, `"tailgating"`, ...
    #[serde(rename = "type")]
    pub alert_type: String,

    /// `"high"`, `"medium"` or `"low"`.
    pub priority: String,

    /// `"new"`, `"in_progress"`, `"acknowledged"`, `"resolved"`, `"false_alarm"`.
    pub status: String,

    pub timestamp: RawTimestamp,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub camera_id: Option<RawId>,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub video_url: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub assigned_to: Option<String>,

    /// All remaining fields the server sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /alerts?page&limit` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPage {
    pub alerts: Vec<AlertPayload>,
    pub total: u64,
}

/// `POST /alerts/{id}/actions` request body: `{action, ...extra}`.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /alerts/{id}/actions` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default)]
    pub alert: Option<AlertPayload>,
    #[serde(default)]
    pub message: Option<String>,
}
