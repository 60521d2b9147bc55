// ── Operator actions ──
//
// Every write flows through `ActionDispatcher`. Nothing is applied
// optimistically: the store only changes once the server confirms the
// action and returns the alert's new state.

mod dispatcher;

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

pub use dispatcher::{ActionDispatcher, ActionOutcome};

/// Operator actions understood by `POST /alerts/{id}/actions`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertAction {
    Acknowledge,
    Resolve,
    /// Sent as `false_alarm`.
    #[strum(to_string = "false_alarm")]
    #[serde(rename = "false_alarm")]
    MarkFalseAlarm,
    Escalate,
    /// Carries `assigned_to` in the request extras.
    Assign,
    /// Carries `notes` in the request extras.
    AddNote,
}
