use crate::feed::FeedProfile;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// A newly detected feed item on its way to the notification sink.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The owning feed's display metadata, followed live until delivery
    pub owner: watch::Receiver<Arc<FeedProfile>>,
    pub feed_url: Arc<str>,
    pub id: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
}

impl Entry {
    /// The owning feed's current profile.
    pub fn profile(&self) -> Arc<FeedProfile> {
        self.owner.borrow().clone()
    }
}

/// The consumer side has been dropped; nothing will ever be delivered again.
#[derive(Debug, Error)]
#[error("Dispatch queue closed")]
pub struct QueueClosed(pub Entry);

/// Producer handle. Cheap to clone, one per concurrent feed check.
#[derive(Debug, Clone)]
pub struct EntrySender {
    tx: mpsc::UnboundedSender<Entry>,
}

/// Single consumer handle, owned by the delivery worker.
#[derive(Debug)]
pub struct EntryReceiver {
    rx: mpsc::UnboundedReceiver<Entry>,
}

/// Create an unbounded FIFO dispatch queue.
///
/// Sends never block. Entries sent through the same sender are received in
/// send order; sends from different clones interleave in arrival order.
pub fn queue() -> (EntrySender, EntryReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EntrySender { tx }, EntryReceiver { rx })
}

impl EntrySender {
    /// Enqueue an entry. Fails only once the receiver is gone, handing the
    /// entry back.
    pub fn send(&self, entry: Entry) -> Result<(), QueueClosed> {
        self.tx.send(entry).map_err(|e| QueueClosed(e.0))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EntryReceiver {
    /// Wait for the next entry. Returns `None` once every sender is dropped
    /// and the queue is empty.
    pub async fn recv(&mut self) -> Option<Entry> {
        self.rx.recv().await
    }

    /// Take the next entry if one is already queued.
    pub fn try_recv(&mut self) -> Option<Entry> {
        self.rx.try_recv().ok()
    }

    /// Number of entries waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
