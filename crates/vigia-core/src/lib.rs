// vigia-core: Alert synchronization core between vigia-api and consumers (CLI/dashboards).

pub mod command;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod hub;
pub mod model;
pub mod stats;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{ActionDispatcher, ActionOutcome, AlertAction};
pub use config::{SyncConfig, TlsVerification};
pub use coordinator::{SyncCoordinator, SyncState};
pub use error::CoreError;
pub use hub::{HubEvent, ListenerError, Subscription, SubscriptionHub, Topic};
pub use stats::{AlertStatistics, PriorityCounts};
pub use store::{AlertStore, Placement, StoreSnapshot};
pub use stream::AlertStream;

pub use model::{Alert, AlertId, AlertStatus, AlertType, HistoryPage, Partition, Priority};

// Connection types consumers observe without depending on vigia-api directly.
pub use vigia_api::{ConnectionState, ReconnectConfig};
