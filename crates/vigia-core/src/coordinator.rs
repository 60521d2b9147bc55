// ── Sync coordinator ──
//
// Full lifecycle management for one alert-server session. Chooses between
// the push channel and the pull API, drives the initial snapshot, keeps the
// store fresh while live, and polls while degraded.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use strum::Display;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigia_api::{
    AlertClient, ChannelEvent, ConnectionManager, ConnectionState, OutboundMessage, PushMessage,
};

use crate::command::ActionDispatcher;
use crate::config::SyncConfig;
use crate::convert::alerts_from_payloads;
use crate::error::CoreError;
use crate::hub::{HubEvent, SubscriptionHub};
use crate::model::{Alert, AlertId, HistoryPage};
use crate::stats::AlertStatistics;
use crate::store::AlertStore;

// ── SyncState ────────────────────────────────────────────────────────

/// Coordinator lifecycle.
///
/// `INIT → SYNCING_SNAPSHOT → LIVE ⇄ DEGRADED`, any state → `STOPPED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Init,
    SyncingSnapshot,
    /// Push channel open and the store reflects the latest snapshot.
    Live,
    /// Push channel unavailable; the store is refreshed by polling.
    Degraded,
    Stopped,
}

// ── SyncCoordinator ──────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Owns the push channel,
/// the store, the subscription hub and the action dispatcher for one
/// server.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: SyncConfig,
    client: Arc<AlertClient>,
    channel: ConnectionManager,
    store: Arc<AlertStore>,
    hub: SubscriptionHub,
    dispatcher: ActionDispatcher,
    sync_state: watch::Sender<SyncState>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncCoordinator {
    /// Create a coordinator from configuration. Does NOT connect --
    /// call [`start()`](Self::start) to load the snapshot and spawn the
    /// background loop.
    pub fn new(config: SyncConfig) -> Result<Self, CoreError> {
        let transport = config.transport();
        let client = Arc::new(AlertClient::new(config.api_url.clone(), &transport)?);
        Self::with_client(config, client)
    }

    /// Create a coordinator around a pre-built pull client.
    pub fn with_client(config: SyncConfig, client: Arc<AlertClient>) -> Result<Self, CoreError> {
        let cancel = CancellationToken::new();
        let channel = ConnectionManager::new(
            config.push_endpoint()?,
            config.reconnect.clone(),
            &config.transport(),
            cancel.child_token(),
        );
        let store = Arc::new(AlertStore::new());
        let hub = SubscriptionHub::new();
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&client),
            Arc::clone(&store),
            hub.clone(),
            cancel.clone(),
        );
        let (sync_state, _) = watch::channel(SyncState::Init);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                config,
                client,
                channel,
                store,
                hub,
                dispatcher,
                sync_state,
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start synchronizing.
    ///
    /// Opens the push channel (when enabled), spawns the coordinator loop
    /// and loads the initial snapshot: via the push channel if it is
    /// already open, otherwise via `GET /alerts/active`. A failed initial
    /// load is returned as [`CoreError::SnapshotLoad`]; the coordinator
    /// keeps running in `DEGRADED` and retries on the poll interval.
    pub async fn start(&self) -> Result<(), CoreError> {
        match self.state() {
            SyncState::Init => {}
            SyncState::Stopped => return Err(CoreError::Stopped),
            state => {
                debug!(%state, "coordinator already started");
                return Ok(());
            }
        }

        self.set_state(SyncState::SyncingSnapshot);

        // Subscribe before connecting so the first `Connected` is not missed.
        let events = self.inner.channel.subscribe();
        if self.inner.config.websocket_enabled {
            self.inner.channel.connect().await;
        } else {
            debug!("push channel disabled, running on polling alone");
        }

        {
            let mut handles = self.inner.task_handles.lock().await;
            let coordinator = self.clone();
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(sync_loop(coordinator, events, cancel)));
        }

        match self.request_snapshot().await {
            Ok(()) => {
                info!(url = %self.inner.config.api_url, "alert sync started");
                Ok(())
            }
            Err(CoreError::Stopped) => Err(CoreError::Stopped),
            Err(e) => {
                warn!(error = %e, "initial snapshot load failed");
                self.set_state(SyncState::Degraded);
                Err(e)
            }
        }
    }

    /// Stop synchronizing.
    ///
    /// Cancels timers, closes the push channel and clears all listeners.
    /// Responses still in flight are discarded when they arrive.
    pub async fn stop(&self) {
        if self.state() == SyncState::Stopped {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.channel.shutdown().await;

        // The loop may be parked on a pull request; its result would be
        // discarded anyway.
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
            let _ = handle.await;
        }
        drop(handles);

        self.inner.hub.clear();
        self.inner.sync_state.send_replace(SyncState::Stopped);
        info!("alert sync stopped");
    }

    /// One-shot: start, run closure, stop.
    ///
    /// Optimized for CLI: disables the push channel and periodic refresh
    /// since only a single request-response cycle is needed.
    pub async fn oneshot<F, Fut, T>(config: SyncConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(SyncCoordinator) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.websocket_enabled = false;
        cfg.refresh_interval_secs = 0;

        let coordinator = SyncCoordinator::new(cfg)?;
        if let Err(e) = coordinator.start().await {
            coordinator.stop().await;
            return Err(e);
        }
        let result = f(coordinator.clone()).await;
        coordinator.stop().await;
        result
    }

    // ── Pull operations ──────────────────────────────────────────────

    /// Fetch one page of alert history and publish it on `history`.
    /// History is not stored.
    pub async fn load_history(&self, page: u32, limit: u32) -> Result<Arc<HistoryPage>, CoreError> {
        self.ensure_running()?;
        let raw = self.inner.client.list_alerts(page, limit).await?;
        self.ensure_running()?;

        let alerts = alerts_from_payloads(raw.alerts)?
            .into_iter()
            .map(Arc::new)
            .collect();
        let history = Arc::new(HistoryPage {
            page,
            limit,
            total: raw.total,
            alerts,
        });

        self.inner.hub.publish(&HubEvent::History(Arc::clone(&history)));
        debug!(page, limit, total = history.total, "alert history loaded");
        Ok(history)
    }

    /// Re-read one alert from the server and apply it as an update.
    pub async fn fetch_alert(&self, id: &AlertId) -> Result<Arc<Alert>, CoreError> {
        self.ensure_running()?;
        let raw = self
            .inner
            .client
            .get_alert(id.as_str())
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    CoreError::AlertNotFound { id: id.to_string() }
                } else {
                    CoreError::from(e)
                }
            })?;
        self.ensure_running()?;

        let alert = Alert::try_from(raw)?;
        let fetched = Arc::new(alert.clone());
        self.inner.store.apply_update(alert);
        self.inner.hub.publish(&HubEvent::Update(Arc::clone(&fetched)));
        Ok(fetched)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<AlertStore> {
        &self.inner.store
    }

    pub fn hub(&self) -> &SubscriptionHub {
        &self.inner.hub
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.inner.dispatcher
    }

    /// Counters computed from the current store contents.
    pub fn statistics(&self) -> AlertStatistics {
        AlertStatistics::from_snapshot(&self.inner.store.snapshot())
    }

    /// Current coordinator state.
    pub fn state(&self) -> SyncState {
        *self.inner.sync_state.borrow()
    }

    /// Subscribe to coordinator state changes.
    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.inner.sync_state.subscribe()
    }

    /// Subscribe to push channel state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.channel.subscribe_state()
    }

    /// When the last full snapshot was applied.
    pub fn last_snapshot(&self) -> Option<DateTime<Utc>> {
        self.inner.store.last_snapshot_at()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn ensure_running(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            Err(CoreError::Stopped)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, next: SyncState) {
        self.inner.sync_state.send_if_modified(|current| {
            if *current == next || *current == SyncState::Stopped {
                return false;
            }
            info!(from = %current, to = %next, "sync state changed");
            *current = next;
            true
        });
    }

    /// Ask for a snapshot over the push channel if it is open, else pull.
    async fn request_snapshot(&self) -> Result<(), CoreError> {
        if self.inner.channel.state() == ConnectionState::Open {
            match self.inner.channel.send(OutboundMessage::GetActiveAlerts).await {
                Ok(()) => {
                    debug!("requested snapshot over push channel");
                    return Ok(());
                }
                Err(e) => debug!(error = %e, "push snapshot request failed, pulling instead"),
            }
        }
        self.pull_snapshot().await
    }

    /// `GET /alerts/active`, applied through the same path as a pushed snapshot.
    async fn pull_snapshot(&self) -> Result<(), CoreError> {
        self.ensure_running()?;
        let payloads = self
            .inner
            .client
            .list_active()
            .await
            .map_err(|e| CoreError::SnapshotLoad {
                reason: e.to_string(),
            })?;
        self.ensure_running()?;

        let alerts = alerts_from_payloads(payloads).map_err(|e| CoreError::SnapshotLoad {
            reason: e.to_string(),
        })?;
        self.apply_snapshot(alerts);
        Ok(())
    }

    fn apply_snapshot(&self, alerts: Vec<Alert>) {
        let count = alerts.len();
        self.inner.store.replace_snapshot(alerts);
        let active = Arc::new(self.inner.store.active());
        self.inner.hub.publish(&HubEvent::Load(active));
        debug!(count, "snapshot applied");

        let next = if self.inner.channel.state() == ConnectionState::Open {
            SyncState::Live
        } else {
            SyncState::Degraded
        };
        self.set_state(next);
    }

    async fn handle_channel_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.set_state(SyncState::SyncingSnapshot);
                if let Err(e) = self.request_snapshot().await {
                    warn!(error = %e, "snapshot after reconnect failed");
                    self.set_state(SyncState::Degraded);
                }
            }
            ChannelEvent::Disconnected { reason } => {
                debug!(%reason, "push channel disconnected");
                self.set_state(SyncState::Degraded);
            }
            ChannelEvent::Message(message) => self.handle_push(&message).await,
        }
    }

    async fn handle_push(&self, message: &PushMessage) {
        match message {
            PushMessage::NewAlert { alert } => match Alert::try_from(alert.clone()) {
                Ok(alert) => {
                    let published = Arc::new(alert.clone());
                    self.inner.store.upsert_active(alert);
                    self.inner.hub.publish(&HubEvent::New(published));
                }
                Err(e) => warn!(error = %e, "dropping invalid new_alert"),
            },
            PushMessage::UpdateAlert { alert } => match Alert::try_from(alert.clone()) {
                Ok(alert) => {
                    let published = Arc::new(alert.clone());
                    self.inner.store.apply_update(alert);
                    self.inner.hub.publish(&HubEvent::Update(published));
                }
                Err(e) => warn!(error = %e, "dropping invalid update_alert"),
            },
            PushMessage::ActiveAlerts { alerts } => match alerts_from_payloads(alerts.clone()) {
                Ok(alerts) => self.apply_snapshot(alerts),
                Err(e) => {
                    warn!(error = %e, "dropping invalid active_alerts snapshot, pulling instead");
                    if let Err(e) = self.pull_snapshot().await {
                        warn!(error = %e, "fallback snapshot pull failed");
                    }
                }
            },
        }
    }
}

// ── Background loop ──────────────────────────────────────────────────

/// Apply channel events in arrival order; poll while degraded or while a
/// snapshot is outstanding, and refresh while live.
async fn sync_loop(
    coordinator: SyncCoordinator,
    mut events: broadcast::Receiver<ChannelEvent>,
    cancel: CancellationToken,
) {
    let config = &coordinator.inner.config;
    let mut poll = ticker(config.poll_interval_secs.max(1));
    let mut refresh = (config.refresh_interval_secs > 0).then(|| ticker(config.refresh_interval_secs));

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => coordinator.handle_channel_event(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "coordinator fell behind the push channel, resyncing");
                    if let Err(e) = coordinator.request_snapshot().await {
                        warn!(error = %e, "resync after lag failed");
                    }
                }
                Err(RecvError::Closed) => break,
            },
            _ = poll.tick() => {
                // A push snapshot request may never be answered; pull instead
                // of waiting on it.
                let state = coordinator.state();
                if matches!(state, SyncState::Degraded | SyncState::SyncingSnapshot) {
                    if let Err(e) = coordinator.pull_snapshot().await {
                        warn!(error = %e, %state, "snapshot poll failed");
                    }
                }
            }
            () = maybe_tick(refresh.as_mut()) => {
                if coordinator.state() == SyncState::Live {
                    if let Err(e) = coordinator.request_snapshot().await {
                        warn!(error = %e, "periodic refresh failed");
                    }
                }
            }
        }
    }

    debug!("sync loop exiting");
}

/// An interval whose immediate first tick is already consumed.
fn ticker(secs: u64) -> Interval {
    let period = Duration::from_secs(secs);
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn maybe_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_state_names() {
        assert_eq!(SyncState::SyncingSnapshot.to_string(), "SYNCING_SNAPSHOT");
        assert_eq!(SyncState::Live.to_string(), "LIVE");
    }
}
