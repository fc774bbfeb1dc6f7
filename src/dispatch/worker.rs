use crate::dispatch::queue::{Entry, EntryReceiver};
use crate::dispatch::sink::{DeliveryError, Notification, NotificationSink};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Running totals kept by a [`DeliveryWorker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Drains the dispatch queue into a [`NotificationSink`], one entry at a time.
///
/// Deliveries are strictly sequential, so a slow or rate-limiting sink
/// throttles the whole pipeline while entries wait in the queue. A failed
/// delivery is logged and dropped.
pub struct DeliveryWorker<S: ?Sized> {
    receiver: EntryReceiver,
    sink: Arc<S>,
    stats: DeliveryStats,
    shutdown_grace: Duration,
}

/// How long a delivery in flight may keep running after shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

impl<S: NotificationSink + ?Sized> DeliveryWorker<S> {
    pub fn new(receiver: EntryReceiver, sink: Arc<S>) -> Self {
        Self {
            receiver,
            sink,
            stats: DeliveryStats::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    /// Deliver entries until the queue closes or `shutdown` fires.
    ///
    /// A delivery in flight at shutdown gets the grace period to finish and
    /// is then abandoned and counted as failed. Entries still queued at
    /// shutdown are dropped.
    pub async fn run(mut self, shutdown: CancellationToken) -> DeliveryStats {
        tracing::info!("Delivery worker started");

        loop {
            let entry = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                entry = self.receiver.recv() => match entry {
                    Some(entry) => entry,
                    None => break,
                },
            };

            let grace = self.shutdown_grace;
            let abandoned = tokio::select! {
                _ = self.deliver(entry) => false,
                _ = async {
                    shutdown.cancelled().await;
                    tokio::time::sleep(grace).await;
                } => true,
            };
            if abandoned {
                self.stats.failed += 1;
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Abandoned delivery still in flight at shutdown"
                );
                break;
            }
        }

        let pending = self.receiver.len();
        if pending > 0 {
            tracing::warn!(pending, "Delivery worker stopped with undelivered entries");
        }
        tracing::info!(
            delivered = self.stats.delivered,
            failed = self.stats.failed,
            "Delivery worker stopped"
        );
        self.stats
    }

    /// Deliver everything currently queued, then return.
    pub async fn drain(&mut self) -> DeliveryStats {
        while let Some(entry) = self.receiver.try_recv() {
            self.deliver(entry).await;
        }
        self.stats
    }

    async fn deliver(&mut self, entry: Entry) {
        tracing::info!(
            feed = %entry.feed_url,
            link = %entry.link,
            published = %entry.published_at,
            "Sending entry"
        );

        // Read at delivery time: a rename since the entry was queued applies
        let profile = entry.profile();
        let notification = Notification {
            content: &entry.link,
            display_name: profile.author_name.as_deref(),
            avatar_url: profile.avatar_url.as_deref(),
        };

        match self.sink.deliver(&notification).await {
            Ok(()) => {
                self.stats.delivered += 1;
                tracing::info!(link = %entry.link, "Sent successfully");
            }
            Err(e) => {
                self.stats.failed += 1;
                log_failure(&entry, &e);
            }
        }
    }
}

fn log_failure(entry: &Entry, error: &DeliveryError) {
    match error.status_code() {
        Some(code) => tracing::warn!(
            link = %entry.link,
            status = code,
            error = %error,
            "Sending entry failed"
        ),
        None => tracing::warn!(link = %entry.link, error = %error, "Sending entry failed"),
    }
}
