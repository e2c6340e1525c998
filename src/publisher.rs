// =============================================================================
// Publisher — latest-snapshot slot plus broadcast fan-out
// =============================================================================
//
// The slot and the broadcast sender are updated under one write lock, and a
// new subscriber reads the slot and takes its receiver under the read lock.
// So a subscriber either sees snapshot N in the slot and gets N+1.. on the
// channel, or sees N-1 and gets N.. on the channel. It never misses one and
// never gets one twice.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use crate::snapshot::Snapshot;

/// Snapshots buffered per subscriber before it starts lagging.
pub const CHANNEL_CAPACITY: usize = 16;

pub struct Publisher {
    latest: RwLock<Option<Arc<Snapshot>>>,
    tx: broadcast::Sender<Arc<Snapshot>>,
    published: AtomicU64,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl Publisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            latest: RwLock::new(None),
            tx,
            published: AtomicU64::new(0),
        }
    }

    /// Replace the latest snapshot and broadcast it.
    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        let mut slot = self.latest.write();
        *slot = Some(Arc::clone(&snapshot));
        // No receivers is fine: pull clients still see the slot.
        let receivers = self.tx.send(snapshot).unwrap_or(0);
        let seq = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(seq, receivers, "snapshot published");
    }

    /// Current snapshot plus a receiver for every later one.
    pub fn subscribe(&self) -> (Option<Arc<Snapshot>>, broadcast::Receiver<Arc<Snapshot>>) {
        let slot = self.latest.read();
        (slot.clone(), self.tx.subscribe())
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().clone()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Wait for the next snapshot. A lagging receiver skips straight to the
/// newest one buffered. `None` once the publisher is gone.
pub async fn recv_latest(rx: &mut broadcast::Receiver<Arc<Snapshot>>) -> Option<Arc<Snapshot>> {
    loop {
        match rx.recv().await {
            Ok(mut snapshot) => {
                loop {
                    match rx.try_recv() {
                        Ok(newer) => snapshot = newer,
                        Err(TryRecvError::Lagged(skipped)) => {
                            debug!(skipped, "subscriber lagged while draining");
                        }
                        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                    }
                }
                return Some(snapshot);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "subscriber lagged, skipping to newest snapshot");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
