// ── Push channel protocol ──
//
// The closed set of message kinds exchanged over the push channel.
// Inbound frames are validated here, at the channel boundary; anything
// that does not match a known kind is a protocol error.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::AlertPayload;

/// Server → client message, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// A newly raised alert.
    NewAlert { alert: AlertPayload },
    /// An existing alert changed (status, assignee, notes...).
    UpdateAlert { alert: AlertPayload },
    /// Full snapshot of the active partition.
    ActiveAlerts { alerts: Vec<AlertPayload> },
}

impl PushMessage {
    /// Wire name of this message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewAlert { .. } => "new_alert",
            Self::UpdateAlert { .. } => "update_alert",
            Self::ActiveAlerts { .. } => "active_alerts",
        }
    }
}

/// Client → server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Ask the server for an `active_alerts` snapshot.
    GetActiveAlerts,
}

impl OutboundMessage {
    pub fn to_json(self) -> String {
        match self {
            Self::GetActiveAlerts => r#"{"type":"get_active_alerts"}"#.to_owned(),
        }
    }
}

/// Validate a text frame into a [`PushMessage`].
///
/// Malformed JSON, a missing `type`, an unknown kind, and a known kind with
/// an invalid body are all reported as [`Error::Protocol`].
pub fn parse_push(text: &str) -> Result<PushMessage, Error> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::Protocol {
            message: format!("malformed JSON: {e}"),
        })?;

    let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
        return Err(Error::Protocol {
            message: "message has no string `type` field".into(),
        });
    };
    let kind = kind.to_owned();

    serde_json::from_value(value).map_err(|e| Error::Protocol {
        message: format!("invalid `{kind}` message: {e}"),
    })
}
