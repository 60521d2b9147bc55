// ── Alert statistics ──
//
// Counts derived from a store snapshot on demand. Nothing is cached;
// every call recomputes from the current partitions.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{AlertStatus, Priority};
use crate::store::StoreSnapshot;

/// Active alerts per priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityCounts {
    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::High => self.high += 1,
            Priority::Medium => self.medium += 1,
            Priority::Low => self.low += 1,
        }
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertStatistics {
    pub active: usize,
    pub settled: usize,
    /// Active alerts only.
    pub by_priority: PriorityCounts,
    /// Active alerts only, keyed by alert type name.
    pub by_type: BTreeMap<String, usize>,
    /// Both partitions.
    pub by_status: BTreeMap<AlertStatus, usize>,
}

impl AlertStatistics {
    /// Compute counters from a snapshot.
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> Self {
        let mut stats = Self {
            active: snapshot.active_count(),
            settled: snapshot.settled_count(),
            ..Self::default()
        };

        for alert in &snapshot.active {
            stats.by_priority.bump(alert.priority);
            *stats
                .by_type
                .entry(alert.alert_type.to_string())
                .or_default() += 1;
        }

        for alert in snapshot.active.iter().chain(&snapshot.settled) {
            *stats.by_status.entry(alert.status).or_default() += 1;
        }

        stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Alert, AlertId, AlertType};
    use crate::store::AlertStore;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    fn alert(id: &str, kind: AlertType, priority: Priority, status: AlertStatus) -> Alert {
        Alert {
            id: AlertId::from(id),
            alert_type: kind,
            priority,
            status,
            timestamp: DateTime::from_timestamp(1_760_000_000, 0).unwrap(),
            location: String::new(),
            camera_id: None,
            message: String::new(),
            image_url: None,
            video_url: None,
            notes: None,
            assigned_to: None,
        }
    }

    #[test]
    fn empty_store() {
        let stats = AlertStatistics::from_snapshot(&StoreSnapshot::default());
        assert_eq!(stats, AlertStatistics::default());
    }

    #[test]
    fn counts_active_by_priority_and_type() {
        let store = AlertStore::new();
        store.upsert_active(alert("1", AlertType::Intrusion, Priority::High, AlertStatus::New));
        store.upsert_active(alert("2", AlertType::Intrusion, Priority::Low, AlertStatus::InProgress));
        store.upsert_active(alert("3", AlertType::Tailgating, Priority::High, AlertStatus::New));
        store.apply_update(alert("4", AlertType::Loitering, Priority::High, AlertStatus::Resolved));

        let stats = AlertStatistics::from_snapshot(&store.snapshot());

        assert_eq!(stats.active, 3);
        assert_eq!(stats.settled, 1);
        assert_eq!(
            stats.by_priority,
            PriorityCounts {
                high: 2,
                medium: 0,
                low: 1
            }
        );
        assert_eq!(stats.by_priority.get(Priority::High), 2);
        assert_eq!(stats.by_type.get("intrusion"), Some(&2));
        assert_eq!(stats.by_type.get("tailgating"), Some(&1));
        // Settled alerts do not count toward types.
        assert_eq!(stats.by_type.get("loitering"), None);
        assert_eq!(stats.by_status.get(&AlertStatus::Resolved), Some(&1));
        assert_eq!(stats.by_status.get(&AlertStatus::New), Some(&2));
    }

    #[test]
    fn settling_moves_counts() {
        let store = AlertStore::new();
        store.upsert_active(alert("101", AlertType::Intrusion, Priority::High, AlertStatus::New));
        assert_eq!(
            AlertStatistics::from_snapshot(&store.snapshot()).by_priority.high,
            1
        );

        store.apply_update(alert(
            "101",
            AlertType::Intrusion,
            Priority::High,
            AlertStatus::Acknowledged,
        ));

        let stats = AlertStatistics::from_snapshot(&store.snapshot());
        assert_eq!(stats.by_priority.high, 0);
        assert_eq!(stats.settled, 1);
    }
}
