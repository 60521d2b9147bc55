// ── API-to-domain type conversions ──
//
// Bridges raw `vigia_api` payloads into canonical `vigia_core::model` types.
// Priority and status decide placement in the store, so unknown values are
// rejected rather than guessed. Unknown alert kinds are kept verbatim.

use chrono::{DateTime, Utc};

use vigia_api::{AlertPayload, RawId, RawTimestamp};

use crate::error::CoreError;
use crate::model::{Alert, AlertId, AlertStatus, AlertType, Priority};

// ── Helpers ────────────────────────────────────────────────────────

fn raw_id_to_string(id: RawId) -> String {
    match id {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    }
}

/// Convert fractional epoch seconds to `DateTime<Utc>`.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Seconds since epoch, or an RFC 3339 string from older server builds.
fn parse_timestamp(raw: &RawTimestamp) -> Result<DateTime<Utc>, CoreError> {
    let parsed = match raw {
        RawTimestamp::Seconds(secs) => epoch_to_datetime(*secs),
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| text.parse::<f64>().ok().and_then(epoch_to_datetime)),
    };
    parsed.ok_or_else(|| CoreError::Protocol {
        message: format!("invalid alert timestamp: {raw:?}"),
    })
}

// ── Alert ──────────────────────────────────────────────────────────

impl TryFrom<AlertPayload> for Alert {
    type Error = CoreError;

    fn try_from(raw: AlertPayload) -> Result<Self, Self::Error> {
        let id = AlertId::from(raw_id_to_string(raw.id));

        let priority: Priority = raw.priority.parse().map_err(|_| CoreError::Protocol {
            message: format!("alert {id}: unknown priority `{}`", raw.priority),
        })?;
        let status: AlertStatus = raw.status.parse().map_err(|_| CoreError::Protocol {
            message: format!("alert {id}: unknown status `{}`", raw.status),
        })?;
        let timestamp = parse_timestamp(&raw.timestamp)?;

        Ok(Alert {
            id,
            alert_type: AlertType::from(raw.alert_type.as_str()),
            priority,
            status,
            timestamp,
            location: raw.location,
            camera_id: raw.camera_id.map(raw_id_to_string),
            message: raw.message,
            image_url: raw.image_url,
            video_url: raw.video_url,
            notes: raw.notes,
            assigned_to: raw.assigned_to,
        })
    }
}

/// Convert a batch, failing on the first invalid alert.
pub fn alerts_from_payloads(payloads: Vec<AlertPayload>) -> Result<Vec<Alert>, CoreError> {
    payloads.into_iter().map(Alert::try_from).collect()
}
