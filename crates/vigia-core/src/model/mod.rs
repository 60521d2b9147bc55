// ── Domain model ──
//
// Canonical alert types consumed by the store, the dispatcher and the CLI.
// Raw wire payloads from `vigia_api` are converted into these in `convert`.

pub mod alert;
pub mod history;

pub use alert::{Alert, AlertId, AlertStatus, AlertType, Partition, Priority};
pub use history::HistoryPage;
