// ── Reactive store streams ──
//
// Subscription types for consuming alert store changes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::StoreSnapshot;

/// A subscription to the alert store.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct AlertStream {
    current: Arc<StoreSnapshot>,
    receiver: watch::Receiver<Arc<StoreSnapshot>>,
}

impl AlertStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<StoreSnapshot>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &Arc<StoreSnapshot> {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<StoreSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<StoreSnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> AlertWatchStream {
        AlertWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current snapshot first, then a new one after each mutation.
pub struct AlertWatchStream {
    inner: WatchStream<Arc<StoreSnapshot>>,
}

impl Stream for AlertWatchStream {
    type Item = Arc<StoreSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
