// ── Reactive registry stream ──
//
// Subscription type for consuming registry changes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::RegistrySnapshot;

/// A subscription to the registry.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via the `changed()` method or by converting to a `Stream`.
pub struct RegistryStream {
    current: Arc<RegistrySnapshot>,
    receiver: watch::Receiver<Arc<RegistrySnapshot>>,
}

impl RegistryStream {
    pub(crate) fn new(mut receiver: watch::Receiver<Arc<RegistrySnapshot>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &Arc<RegistrySnapshot> {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<RegistrySnapshot> {
        self.receiver.borrow().clone()
    }

    /// Whether a write was published since the last observed snapshot.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Mark the latest snapshot as observed and make it `current()`.
    pub fn mark_seen(&mut self) {
        self.current = self.receiver.borrow_and_update().clone();
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the registry has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<RegistrySnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The first item is the snapshot current at conversion time.
    pub fn into_stream(self) -> RegistryWatchStream {
        RegistryWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct RegistryWatchStream {
    inner: WatchStream<Arc<RegistrySnapshot>>,
}

impl Stream for RegistryWatchStream {
    type Item = Arc<RegistrySnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
