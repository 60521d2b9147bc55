// ── Alert store ──
//
// Two-partition alert cache with push-based change notification.

mod alert_store;
mod partitions;

pub use alert_store::{AlertStore, StoreSnapshot};
pub use partitions::Placement;
