// ── Reactive gate stream ──
//
// Subscription type for consuming gate-table changes from the
// `AlertGateStore`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::GateTable;

/// A subscription to the gate table.
///
/// Gives the snapshot taken at subscription time plus change notification
/// through `changed()` or as a `Stream`.
pub struct GateWatch {
    current: Arc<GateTable>,
    receiver: watch::Receiver<Arc<GateTable>>,
}

impl GateWatch {
    pub(crate) fn new(receiver: watch::Receiver<Arc<GateTable>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &Arc<GateTable> {
        &self.current
    }

    /// The latest snapshot, which may be newer than `current()`.
    pub fn latest(&self) -> Arc<GateTable> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next write, returning the new table.
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<GateTable>> {
        self.receiver.changed().await.ok()?;
        let table = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&table);
        Some(table)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> GateWatchStream {
        GateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each new gate table.
pub struct GateWatchStream {
    inner: WatchStream<Arc<GateTable>>,
}

impl Stream for GateWatchStream {
    type Item = Arc<GateTable>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
