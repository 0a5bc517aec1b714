// ── Reactive model streams ──
//
// Subscription type for consuming one model's snapshots.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::ModelState;

/// A subscription to one model.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a
/// `Stream`.
pub struct ModelStream {
    current: Arc<ModelState>,
    receiver: watch::Receiver<Arc<ModelState>>,
}

impl ModelStream {
    pub(crate) fn new(mut receiver: watch::Receiver<Arc<ModelState>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// Snapshot as of creation or the last `changed()`.
    pub fn current(&self) -> &Arc<ModelState> {
        &self.current
    }

    /// Latest published snapshot.
    pub fn latest(&self) -> Arc<ModelState> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the engine has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<ModelState>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    /// The first item is the current snapshot.
    pub fn into_stream(self) -> ModelWatchStream {
        ModelWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct ModelWatchStream {
    inner: WatchStream<Arc<ModelState>>,
}

impl Stream for ModelWatchStream {
    type Item = Arc<ModelState>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
