// ── Alert domain types ──

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ── AlertId ─────────────────────────────────────────────────────────

/// Opaque server-assigned alert identifier.
///
/// The server emits ids as numbers or strings; both normalize to the same
/// textual form, so `101` and `"101"` name the same alert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(String);

impl AlertId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlertId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for AlertId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for AlertId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

// ── AlertType ───────────────────────────────────────────────────────

/// What the analytics pipeline detected. Open-ended: kinds this build does
/// not know are kept verbatim in [`AlertType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertType {
    Intrusion,
    TheftDetected,
    Loitering,
    PerimeterBreach,
    Tailgating,
    Other(String),
}

impl AlertType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Intrusion => "intrusion",
            Self::TheftDetected => "theft_detected",
            Self::Loitering => "loitering",
            Self::PerimeterBreach => "perimeter_breach",
            Self::Tailgating => "tailgating",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AlertType {
    fn from(s: &str) -> Self {
        match s {
            "intrusion" => Self::Intrusion,
            "theft_detected" => Self::TheftDetected,
            "loitering" => Self::Loitering,
            "perimeter_breach" => Self::PerimeterBreach,
            "tailgating" => Self::Tailgating,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl FromStr for AlertType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl Serialize for AlertType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AlertType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

// ── Priority ────────────────────────────────────────────────────────

/// Operator-facing urgency. Ordered most urgent first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

// ── AlertStatus ─────────────────────────────────────────────────────

/// Lifecycle status. Decides which partition an alert lives in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertStatus {
    New,
    InProgress,
    Acknowledged,
    Resolved,
    FalseAlarm,
}

impl AlertStatus {
    /// `new | in_progress` are active; everything else is settled.
    pub fn partition(self) -> Partition {
        match self {
            Self::New | Self::InProgress => Partition::Active,
            Self::Acknowledged | Self::Resolved | Self::FalseAlarm => Partition::Settled,
        }
    }
}

/// The two disjoint halves of the alert store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Partition {
    Active,
    Settled,
}

// ── Alert ───────────────────────────────────────────────────────────

/// A security alert raised by the surveillance backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub priority: Priority,
    pub status: AlertStatus,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub camera_id: Option<String>,
    pub message: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<String>,
}

impl Alert {
    /// Partition derived from the current status. Never cached.
    pub fn partition(&self) -> Partition {
        self.status.partition()
    }

    pub fn is_active(&self) -> bool {
        self.partition() == Partition::Active
    }
}
