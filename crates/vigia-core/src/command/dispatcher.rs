// ── Action dispatcher ──
//
// Sends an operator action, waits for the server's verdict and applies
// the confirmed alert state through `AlertStore::apply_update`.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigia_api::{ActionRequest, AlertClient};

use super::AlertAction;
use crate::error::CoreError;
use crate::hub::{HubEvent, SubscriptionHub};
use crate::model::{Alert, AlertId};
use crate::store::{AlertStore, Placement};

/// Confirmed result of an operator action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// The alert as confirmed by the server, if the response carried one.
    pub alert: Option<Arc<Alert>>,
    /// Where the store placed it.
    pub placement: Option<Placement>,
    /// Optional server message.
    pub message: Option<String>,
}

/// Sends operator actions and applies confirmed transitions.
#[derive(Clone)]
pub struct ActionDispatcher {
    client: Arc<AlertClient>,
    store: Arc<AlertStore>,
    hub: SubscriptionHub,
    cancel: CancellationToken,
}

impl ActionDispatcher {
    /// Responses arriving after `cancel` fires are discarded.
    pub fn new(
        client: Arc<AlertClient>,
        store: Arc<AlertStore>,
        hub: SubscriptionHub,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            store,
            hub,
            cancel,
        }
    }

    /// Send `action` for `id` with `extra` merged into the request body.
    ///
    /// On `success: true` the embedded alert is applied verbatim and
    /// published as `update`. On `success: false` returns
    /// [`CoreError::ActionRejected`]; the store is untouched. No retry.
    pub async fn dispatch(
        &self,
        id: &AlertId,
        action: AlertAction,
        extra: Map<String, Value>,
    ) -> Result<ActionOutcome, CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Stopped);
        }

        let request = ActionRequest {
            action: action.to_string(),
            extra,
        };
        debug!(alert_id = %id, %action, "dispatching alert action");

        let response = self
            .client
            .post_action(id.as_str(), &request)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    CoreError::AlertNotFound { id: id.to_string() }
                } else {
                    CoreError::from(e)
                }
            })?;

        if self.cancel.is_cancelled() {
            debug!(alert_id = %id, %action, "discarding action response after stop");
            return Err(CoreError::Stopped);
        }

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "rejected by server".into());
            warn!(alert_id = %id, %action, %message, "alert action rejected");
            return Err(CoreError::ActionRejected {
                id: id.to_string(),
                action: action.to_string(),
                message,
            });
        }

        let Some(payload) = response.alert else {
            info!(alert_id = %id, %action, "alert action confirmed without alert body");
            return Ok(ActionOutcome {
                alert: None,
                placement: None,
                message: response.message,
            });
        };

        let alert = Alert::try_from(payload)?;
        let confirmed = Arc::new(alert.clone());
        let placement = self.store.apply_update(alert);
        self.hub.publish(&HubEvent::Update(Arc::clone(&confirmed)));

        info!(
            alert_id = %confirmed.id,
            %action,
            status = %confirmed.status,
            "alert action confirmed"
        );

        Ok(ActionOutcome {
            alert: Some(confirmed),
            placement: Some(placement),
            message: response.message,
        })
    }

    // ── Convenience wrappers ─────────────────────────────────────────

    pub async fn acknowledge(
        &self,
        id: &AlertId,
        note: Option<&str>,
    ) -> Result<ActionOutcome, CoreError> {
        self.dispatch(id, AlertAction::Acknowledge, note_extra(note))
            .await
    }

    pub async fn resolve(
        &self,
        id: &AlertId,
        note: Option<&str>,
    ) -> Result<ActionOutcome, CoreError> {
        self.dispatch(id, AlertAction::Resolve, note_extra(note))
            .await
    }

    pub async fn mark_false_alarm(
        &self,
        id: &AlertId,
        note: Option<&str>,
    ) -> Result<ActionOutcome, CoreError> {
        self.dispatch(id, AlertAction::MarkFalseAlarm, note_extra(note))
            .await
    }

    pub async fn escalate(
        &self,
        id: &AlertId,
        note: Option<&str>,
    ) -> Result<ActionOutcome, CoreError> {
        self.dispatch(id, AlertAction::Escalate, note_extra(note))
            .await
    }

    pub async fn assign(&self, id: &AlertId, user: &str) -> Result<ActionOutcome, CoreError> {
        let mut extra = Map::new();
        extra.insert("assigned_to".into(), Value::String(user.to_owned()));
        self.dispatch(id, AlertAction::Assign, extra).await
    }

    pub async fn add_note(&self, id: &AlertId, text: &str) -> Result<ActionOutcome, CoreError> {
        self.dispatch(id, AlertAction::AddNote, note_extra(Some(text)))
            .await
    }
}

fn note_extra(note: Option<&str>) -> Map<String, Value> {
    let mut extra = Map::new();
    if let Some(note) = note {
        extra.insert("notes".into(), Value::String(note.to_owned()));
    }
    extra
}
