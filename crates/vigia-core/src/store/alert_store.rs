// ── Central alert store ──
//
// Single source of truth for every alert this session has seen.
// Mutations are short synchronous critical sections; each one publishes
// a fresh immutable `StoreSnapshot` to `watch` subscribers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::trace;

use super::partitions::{AlertPartitions, Placement};
use crate::model::{Alert, AlertId, Partition};
use crate::stream::AlertStream;

/// Immutable view of the store at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Active alerts in display order (newest arrival first).
    pub active: Vec<Arc<Alert>>,
    /// Settled alerts, retained for the session.
    pub settled: Vec<Arc<Alert>>,
    /// Bumped on every mutation.
    pub version: u64,
}

impl StoreSnapshot {
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn settled_count(&self) -> usize {
        self.settled.len()
    }

    pub fn get(&self, id: &AlertId) -> Option<&Arc<Alert>> {
        self.active
            .iter()
            .chain(self.settled.iter())
            .find(|alert| alert.id == *id)
    }
}

/// Two-partition alert cache with change notification.
///
/// Thread-safe: all mutations go through one mutex and never suspend.
/// Readers use the latest published [`StoreSnapshot`] and never block
/// writers for long.
pub struct AlertStore {
    partitions: Mutex<AlertPartitions>,
    snapshot: watch::Sender<Arc<StoreSnapshot>>,
    last_snapshot_at: watch::Sender<Option<DateTime<Utc>>>,
}

impl AlertStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(StoreSnapshot::default()));
        let (last_snapshot_at, _) = watch::channel(None);

        Self {
            partitions: Mutex::new(AlertPartitions::new()),
            snapshot,
            last_snapshot_at,
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Insert or refresh an alert announced as new.
    pub fn upsert_active(&self, alert: Alert) -> Placement {
        let id = alert.id.clone();
        let placement = self.mutate(|p| p.upsert_active(alert));
        trace!(alert_id = %id, ?placement, "upsert_active");
        placement
    }

    /// Apply a server-confirmed change, moving the alert between
    /// partitions if its status requires it.
    pub fn apply_update(&self, alert: Alert) -> Placement {
        let id = alert.id.clone();
        let placement = self.mutate(|p| p.apply_update(alert));
        trace!(alert_id = %id, ?placement, "apply_update");
        placement
    }

    /// Replace the active partition with a full snapshot. Idempotent.
    pub fn replace_snapshot(&self, alerts: Vec<Alert>) {
        let count = alerts.len();
        self.mutate(|p| p.replace_snapshot(alerts));
        self.last_snapshot_at.send_replace(Some(Utc::now()));
        trace!(count, "replace_snapshot");
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Look up an alert in whichever partition holds it.
    pub fn get(&self, id: &AlertId) -> Option<Arc<Alert>> {
        self.lock().get(id)
    }

    pub fn partition_of(&self, id: &AlertId) -> Option<Partition> {
        self.lock().partition_of(id)
    }

    /// Latest snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Active alerts in display order.
    pub fn active(&self) -> Vec<Arc<Alert>> {
        self.snapshot().active.clone()
    }

    pub fn settled(&self) -> Vec<Arc<Alert>> {
        self.snapshot().settled.clone()
    }

    pub fn active_count(&self) -> usize {
        self.snapshot.borrow().active_count()
    }

    pub fn settled_count(&self) -> usize {
        self.snapshot.borrow().settled_count()
    }

    /// When the active partition was last replaced by a full snapshot.
    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        *self.last_snapshot_at.borrow()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe(&self) -> AlertStream {
        AlertStream::new(self.snapshot.subscribe())
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, AlertPartitions> {
        // Partitions are left consistent after every step, so a poisoned
        // lock still guards valid state.
        self.partitions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one mutation and publish the resulting snapshot.
    fn mutate<R>(&self, f: impl FnOnce(&mut AlertPartitions) -> R) -> R {
        let mut partitions = self.lock();
        let result = f(&mut partitions);
        debug_assert!(partitions.is_consistent(), "alert partitions out of sync");

        let active = partitions.active_in_order();
        let settled = partitions.settled_in_order();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| {
            *snap = Arc::new(StoreSnapshot {
                active,
                settled,
                version: snap.version + 1,
            });
        });
        result
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}
