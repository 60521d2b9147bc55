// ── Subscription hub ──
//
// Typed fan-out from the sync core to UI listeners. The hub owns the
// listener registry; callers hold only a `Subscription` whose one
// capability is removing itself.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use strum::{Display, EnumIter, EnumString};
use tracing::{trace, warn};

use crate::model::{Alert, HistoryPage};

// ── Topics & events ──────────────────────────────────────────────────

/// Event topics listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Topic {
    /// A new alert entered the active partition.
    New,
    /// An existing alert changed (status, assignee, notes...).
    Update,
    /// The active partition was replaced by a full snapshot.
    Load,
    /// A page of alert history was fetched.
    History,
}

/// Payload delivered to listeners. Each variant belongs to one [`Topic`].
#[derive(Debug, Clone)]
pub enum HubEvent {
    New(Arc<Alert>),
    Update(Arc<Alert>),
    /// Active alerts after the snapshot, in display order.
    Load(Arc<Vec<Arc<Alert>>>),
    History(Arc<HistoryPage>),
}

impl HubEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::New(_) => Topic::New,
            Self::Update(_) => Topic::Update,
            Self::Load(_) => Topic::Load,
            Self::History(_) => Topic::History,
        }
    }
}

/// Error a listener may return. Logged by the hub, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Callback = Arc<dyn Fn(&HubEvent) -> Result<(), ListenerError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Topic(Topic),
    /// The `*` wildcard.
    All,
}

impl Scope {
    fn matches(self, topic: Topic) -> bool {
        match self {
            Self::Topic(t) => t == topic,
            Self::All => true,
        }
    }
}

struct Listener {
    id: u64,
    scope: Scope,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    /// Registration order is delivery order.
    listeners: Vec<Listener>,
}

// ── SubscriptionHub ──────────────────────────────────────────────────

/// Pub/sub fan-out with failure isolation.
///
/// Cheaply cloneable; clones share one registry. The registry lock is
/// never held while a callback runs, so listeners may subscribe or
/// dispose from inside a callback.
#[derive(Clone, Default)]
pub struct SubscriptionHub {
    registry: Arc<Mutex<Registry>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for one topic.
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(&HubEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(Scope::Topic(topic), Arc::new(callback))
    }

    /// Register `callback` for every topic. The event carries its topic.
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&HubEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(Scope::All, Arc::new(callback))
    }

    /// Deliver `event` to its topic's listeners and to wildcard listeners.
    ///
    /// A failing listener is logged and skipped; it stays registered and
    /// the remaining listeners still run. Returns how many listeners failed.
    pub fn publish(&self, event: &HubEvent) -> usize {
        let topic = event.topic();
        let targets: Vec<(u64, Callback)> = self
            .lock()
            .listeners
            .iter()
            .filter(|l| l.scope.matches(topic))
            .map(|l| (l.id, Arc::clone(&l.callback)))
            .collect();

        trace!(%topic, listeners = targets.len(), "publishing hub event");

        let mut failed = 0;
        for (id, callback) in targets {
            if let Err(e) = callback(event) {
                failed += 1;
                warn!(%topic, listener = id, error = %e, "listener failed");
            }
        }
        failed
    }

    /// Remove every listener. Outstanding `Subscription`s become no-ops.
    pub fn clear(&self) {
        self.lock().listeners.clear();
    }

    /// Number of registered listeners across all topics.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn register(&self, scope: Scope, callback: Callback) -> Subscription {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push(Listener {
            id,
            scope,
            callback,
        });
        trace!(listener = id, ?scope, "listener registered");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SubscriptionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Disposer for one registered listener.
///
/// Holds only a weak link to the hub. Dropping it does NOT unsubscribe;
/// call [`dispose`](Self::dispose).
#[must_use = "dropping a Subscription leaves the listener registered; call dispose() to remove it"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove the listener. Returns `false` if it was already gone
    /// (hub cleared or dropped).
    pub fn dispose(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.listeners.len();
        registry.listeners.retain(|l| l.id != self.id);
        registry.listeners.len() != before
    }
}
