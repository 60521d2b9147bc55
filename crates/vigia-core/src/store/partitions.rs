// ── Two-partition alert cache ──
//
// Pure, synchronous state behind `AlertStore`. Every id lives in exactly one
// of `active` / `settled`, and `queue` holds exactly the ids of `active`,
// newest arrival first.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::model::{Alert, AlertId, Partition};

/// Where a mutation left an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First sighting of this id.
    Inserted(Partition),
    /// Replaced in place; queue position unchanged.
    Replaced(Partition),
    /// Crossed from one partition to the other.
    Moved { from: Partition, to: Partition },
}

#[derive(Debug, Default)]
pub(crate) struct AlertPartitions {
    active: HashMap<AlertId, Arc<Alert>>,
    queue: VecDeque<AlertId>,
    settled: IndexMap<AlertId, Arc<Alert>>,
}

impl AlertPartitions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Insert or refresh an alert announced as new.
    ///
    /// Already active: replaced in place. Settled or unseen: placed into
    /// active at the front of the queue. An alert whose status is not an
    /// active one goes where its status says.
    pub(crate) fn upsert_active(&mut self, alert: Alert) -> Placement {
        if alert.partition() != Partition::Active {
            return self.apply_update(alert);
        }

        let id = alert.id.clone();
        let alert = Arc::new(alert);

        if let Some(slot) = self.active.get_mut(&id) {
            *slot = alert;
            return Placement::Replaced(Partition::Active);
        }

        let was_settled = self.settled.shift_remove(&id).is_some();
        self.active.insert(id.clone(), alert);
        self.queue.push_front(id);

        if was_settled {
            Placement::Moved {
                from: Partition::Settled,
                to: Partition::Active,
            }
        } else {
            Placement::Inserted(Partition::Active)
        }
    }

    /// Apply a changed alert, moving it if its status crossed partitions.
    pub(crate) fn apply_update(&mut self, alert: Alert) -> Placement {
        let id = alert.id.clone();
        let destination = alert.partition();
        let source = self.partition_of(&id);
        let alert = Arc::new(alert);

        match (source, destination) {
            (Some(Partition::Active), Partition::Active) => {
                self.active.insert(id, alert);
                Placement::Replaced(Partition::Active)
            }
            (Some(Partition::Settled), Partition::Settled) => {
                self.settled.insert(id, alert);
                Placement::Replaced(Partition::Settled)
            }
            (Some(Partition::Active), Partition::Settled) => {
                self.active.remove(&id);
                self.queue.retain(|queued| *queued != id);
                self.settled.insert(id, alert);
                Placement::Moved {
                    from: Partition::Active,
                    to: Partition::Settled,
                }
            }
            (Some(Partition::Settled), Partition::Active) => {
                self.settled.shift_remove(&id);
                self.active.insert(id.clone(), alert);
                self.queue.push_front(id);
                Placement::Moved {
                    from: Partition::Settled,
                    to: Partition::Active,
                }
            }
            (None, Partition::Active) => {
                self.active.insert(id.clone(), alert);
                self.queue.push_front(id);
                Placement::Inserted(Partition::Active)
            }
            (None, Partition::Settled) => {
                self.settled.insert(id, alert);
                Placement::Inserted(Partition::Settled)
            }
        }
    }

    /// Replace the active partition with `alerts`, as a run of fresh
    /// `upsert_active` calls. Settled alerts not named in the snapshot are
    /// kept.
    ///
    /// The snapshot is authoritative for the active set: an alert that was
    /// active but is missing from it is dropped from the store, not moved
    /// to settled, since its final status is unknown.
    pub(crate) fn replace_snapshot(&mut self, alerts: Vec<Alert>) {
        self.active.clear();
        self.queue.clear();
        for alert in alerts {
            self.upsert_active(alert);
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub(crate) fn get(&self, id: &AlertId) -> Option<Arc<Alert>> {
        self.active
            .get(id)
            .or_else(|| self.settled.get(id))
            .map(Arc::clone)
    }

    pub(crate) fn partition_of(&self, id: &AlertId) -> Option<Partition> {
        if self.active.contains_key(id) {
            Some(Partition::Active)
        } else if self.settled.contains_key(id) {
            Some(Partition::Settled)
        } else {
            None
        }
    }

    /// Active alerts in display order (newest arrival first).
    pub(crate) fn active_in_order(&self) -> Vec<Arc<Alert>> {
        self.queue
            .iter()
            .filter_map(|id| self.active.get(id).map(Arc::clone))
            .collect()
    }

    /// Settled alerts in the order they settled.
    pub(crate) fn settled_in_order(&self) -> Vec<Arc<Alert>> {
        self.settled.values().map(Arc::clone).collect()
    }

    #[cfg(test)]
    pub(crate) fn queue(&self) -> impl Iterator<Item = &AlertId> {
        self.queue.iter()
    }

    /// Queue ids are exactly the active ids, with no duplicates, and no id
    /// is in both partitions.
    pub(crate) fn is_consistent(&self) -> bool {
        let queue_len_matches = self.queue.len() == self.active.len();
        let queue_in_active = self.queue.iter().all(|id| self.active.contains_key(id));
        let active_in_queue = self.active.keys().all(|id| self.queue.contains(id));
        let disjoint = self.active.keys().all(|id| !self.settled.contains_key(id));
        queue_len_matches && queue_in_active && active_in_queue && disjoint
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{AlertStatus, AlertType, Priority};
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    fn alert(id: &str, status: AlertStatus) -> Alert {
        Alert {
            id: AlertId::from(id),
            alert_type: AlertType::Intrusion,
            priority: Priority::High,
            status,
            timestamp: DateTime::from_timestamp(1_760_000_000, 0).unwrap(),
            location: "Dock 2".into(),
            camera_id: None,
            message: String::new(),
            image_url: None,
            video_url: None,
            notes: None,
            assigned_to: None,
        }
    }

    fn queue_ids(p: &AlertPartitions) -> Vec<&str> {
        p.queue().map(AlertId::as_str).collect()
    }

    #[test]
    fn new_alerts_prepend_to_queue() {
        let mut p = AlertPartitions::new();
        assert_eq!(
            p.upsert_active(alert("1", AlertStatus::New)),
            Placement::Inserted(Partition::Active)
        );
        p.upsert_active(alert("2", AlertStatus::New));
        p.upsert_active(alert("3", AlertStatus::InProgress));

        assert_eq!(queue_ids(&p), vec!["3", "2", "1"]);
        assert!(p.is_consistent());
    }

    #[test]
    fn duplicate_new_alert_replaces_in_place() {
        let mut p = AlertPartitions::new();
        p.upsert_active(alert("101", AlertStatus::New));
        p.upsert_active(alert("102", AlertStatus::New));

        let mut changed = alert("101", AlertStatus::New);
        changed.message = "second report".into();
        assert_eq!(
            p.upsert_active(changed),
            Placement::Replaced(Partition::Active)
        );

        assert_eq!(queue_ids(&p), vec!["102", "101"]);
        assert_eq!(p.get(&"101".into()).unwrap().message, "second report");
        assert!(p.is_consistent());
    }

    #[test]
    fn upsert_of_settled_id_moves_back_to_active() {
        let mut p = AlertPartitions::new();
        p.apply_update(alert("7", AlertStatus::Resolved));
        p.upsert_active(alert("8", AlertStatus::New));

        let placement = p.upsert_active(alert("7", AlertStatus::New));

        assert_eq!(
            placement,
            Placement::Moved {
                from: Partition::Settled,
                to: Partition::Active
            }
        );
        assert_eq!(queue_ids(&p), vec!["7", "8"]);
        assert!(p.settled_in_order().is_empty());
        assert!(p.is_consistent());
    }

    #[test]
    fn update_to_terminal_status_settles() {
        let mut p = AlertPartitions::new();
        p.upsert_active(alert("1", AlertStatus::New));
        p.upsert_active(alert("2", AlertStatus::New));

        let placement = p.apply_update(alert("1", AlertStatus::Acknowledged));

        assert_eq!(
            placement,
            Placement::Moved {
                from: Partition::Active,
                to: Partition::Settled
            }
        );
        assert_eq!(queue_ids(&p), vec!["2"]);
        assert_eq!(p.partition_of(&"1".into()), Some(Partition::Settled));
        assert!(p.is_consistent());
    }

    #[test]
    fn update_within_active_keeps_queue_position() {
        let mut p = AlertPartitions::new();
        p.upsert_active(alert("1", AlertStatus::New));
        p.upsert_active(alert("2", AlertStatus::New));

        p.apply_update(alert("1", AlertStatus::InProgress));

        assert_eq!(queue_ids(&p), vec!["2", "1"]);
        assert_eq!(
            p.get(&"1".into()).unwrap().status,
            AlertStatus::InProgress
        );
    }

    #[test]
    fn update_of_unseen_id_lands_in_destination() {
        let mut p = AlertPartitions::new();
        assert_eq!(
            p.apply_update(alert("9", AlertStatus::FalseAlarm)),
            Placement::Inserted(Partition::Settled)
        );
        assert_eq!(
            p.apply_update(alert("10", AlertStatus::New)),
            Placement::Inserted(Partition::Active)
        );
        assert_eq!(queue_ids(&p), vec!["10"]);
        assert!(p.is_consistent());
    }

    #[test]
    fn reopened_settled_alert_prepends() {
        let mut p = AlertPartitions::new();
        p.upsert_active(alert("1", AlertStatus::New));
        p.apply_update(alert("1", AlertStatus::Resolved));
        p.upsert_active(alert("2", AlertStatus::New));

        p.apply_update(alert("1", AlertStatus::InProgress));

        assert_eq!(queue_ids(&p), vec!["1", "2"]);
        assert!(p.is_consistent());
    }

    #[test]
    fn snapshot_drops_unlisted_active_alerts_and_keeps_settled() {
        let mut p = AlertPartitions::new();
        p.upsert_active(alert("old", AlertStatus::New));
        p.apply_update(alert("done", AlertStatus::Resolved));

        p.replace_snapshot(vec![
            alert("a", AlertStatus::New),
            alert("b", AlertStatus::InProgress),
        ]);

        assert_eq!(queue_ids(&p), vec!["b", "a"]);
        // "old" was active but is not in the snapshot: gone from both partitions.
        assert!(p.get(&"old".into()).is_none());
        assert_eq!(p.partition_of(&"old".into()), None);
        assert!(p.get(&"done".into()).is_some());
        assert!(p.is_consistent());
    }

    #[test]
    fn snapshot_is_idempotent() {
        let snapshot = vec![
            alert("a", AlertStatus::New),
            alert("b", AlertStatus::InProgress),
            alert("c", AlertStatus::New),
        ];

        let mut once = AlertPartitions::new();
        once.replace_snapshot(snapshot.clone());

        let mut twice = AlertPartitions::new();
        twice.replace_snapshot(snapshot.clone());
        twice.replace_snapshot(snapshot);

        assert_eq!(queue_ids(&once), queue_ids(&twice));
        assert_eq!(once.active_in_order(), twice.active_in_order());
        assert_eq!(once.settled_in_order(), twice.settled_in_order());
    }

    #[test]
    fn invariant_holds_across_mixed_sequence() {
        let statuses = [
            AlertStatus::New,
            AlertStatus::InProgress,
            AlertStatus::Acknowledged,
            AlertStatus::Resolved,
            AlertStatus::FalseAlarm,
        ];
        let mut p = AlertPartitions::new();

        for step in 0..200_usize {
            let id = (step * 7 % 13).to_string();
            let status = statuses[step * 3 % statuses.len()];
            match step % 4 {
                0 | 1 => {
                    p.upsert_active(alert(&id, status));
                }
                2 => {
                    p.apply_update(alert(&id, status));
                }
                _ => {
                    if step % 20 == 3 {
                        p.replace_snapshot(vec![alert(&id, AlertStatus::New)]);
                    } else {
                        p.apply_update(alert(&id, status));
                    }
                }
            }
            assert!(p.is_consistent(), "invariant broken at step {step}");
        }
    }
}
