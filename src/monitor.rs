//! Poll cycles and task ownership.
//!
//! [`PollController`] owns every [`FeedState`] and runs check cycles;
//! [`Monitor`] wires the controller, the dispatch queue and the delivery
//! worker together and joins them on shutdown.

use crate::dispatch::{queue, DeliveryStats, DeliveryWorker, EntrySender, NotificationSink};
use crate::feed::{CheckReport, FeedSnapshot, FeedSource, FeedState};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;

/// Totals for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub checked: usize,
    pub failed: usize,
    pub enqueued: usize,
    pub elapsed: Duration,
}

/// Checks every feed, waits for all checks, sleeps, repeats.
///
/// A cycle only starts after the previous one has fully finished, so each
/// feed has at most one check in flight.
pub struct PollController {
    feeds: Vec<FeedState>,
    source: Arc<dyn FeedSource>,
    queue: EntrySender,
    since: DateTime<Utc>,
    interval: Duration,
    max_concurrent: usize,
}

impl PollController {
    pub fn new(
        urls: impl IntoIterator<Item = String>,
        source: Arc<dyn FeedSource>,
        queue: EntrySender,
        since: DateTime<Utc>,
        interval: Duration,
    ) -> Self {
        Self {
            feeds: urls.into_iter().map(FeedState::new).collect(),
            source,
            queue,
            since,
            interval,
            max_concurrent: 0,
        }
    }

    /// Limit how many feeds are fetched at once. 0 = no limit.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn feeds(&self) -> &[FeedState] {
        &self.feeds
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Snapshot receivers for every feed, in feed list order.
    pub fn watchers(&self) -> Vec<watch::Receiver<FeedSnapshot>> {
        self.feeds.iter().map(FeedState::subscribe).collect()
    }

    /// Check every feed once, concurrently, and wait for all of them.
    ///
    /// One feed failing has no effect on the others: each check records its
    /// own failure and returns normally.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        let started = Instant::now();
        let limit = match self.max_concurrent {
            0 => self.feeds.len().max(1),
            n => n,
        };
        let permits = Semaphore::new(limit);

        let source = self.source.as_ref();
        let queue = &self.queue;
        let since = self.since;

        let reports: Vec<CheckReport> = join_all(self.feeds.iter_mut().map(|feed| {
            let permits = &permits;
            async move {
                // The semaphore is never closed, so acquire cannot fail
                let _permit = permits.acquire().await.ok();
                feed.check(source, since, queue).await
            }
        }))
        .await;

        CycleSummary {
            checked: reports.len(),
            failed: reports.iter().filter(|r| r.status.is_error()).count(),
            enqueued: reports.iter().map(|r| r.enqueued).sum(),
            elapsed: started.elapsed(),
        }
    }

    /// Run cycles until `shutdown` fires.
    ///
    /// A cycle in progress at shutdown is dropped at its next suspension
    /// point; identities are only committed after a fetch completes, so no
    /// feed is left half-updated.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            feeds = self.feeds.len(),
            since = %self.since,
            interval_secs = self.interval.as_secs(),
            "Poll controller started"
        );

        loop {
            tracing::info!("Checking feeds...");
            let summary = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                summary = self.run_cycle() => summary,
            };
            tracing::info!(
                elapsed_ms = summary.elapsed.as_millis() as u64,
                checked = summary.checked,
                failed = summary.failed,
                enqueued = summary.enqueued,
                "Poll cycle finished"
            );

            if self.queue.is_closed() {
                tracing::warn!("Dispatch queue closed, stopping poll controller");
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Poll controller stopped");
    }
}

/// The polling pipeline as a set of owned tasks.
///
/// [`run`](Monitor::run) spawns the delivery worker, runs the poll
/// controller, and joins both once `shutdown` fires.
pub struct Monitor {
    controller: PollController,
    worker: DeliveryWorker<dyn NotificationSink>,
}

impl Monitor {
    pub fn new(
        urls: impl IntoIterator<Item = String>,
        source: Arc<dyn FeedSource>,
        sink: Arc<dyn NotificationSink>,
        since: DateTime<Utc>,
        interval: Duration,
    ) -> Self {
        let (tx, rx) = queue();
        Self {
            controller: PollController::new(urls, source, tx, since, interval),
            worker: DeliveryWorker::new(rx, sink),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.controller = self.controller.with_max_concurrent(max_concurrent);
        self
    }

    pub fn watchers(&self) -> Vec<watch::Receiver<FeedSnapshot>> {
        self.controller.watchers()
    }

    pub fn controller_mut(&mut self) -> &mut PollController {
        &mut self.controller
    }

    pub fn worker_mut(&mut self) -> &mut DeliveryWorker<dyn NotificationSink> {
        &mut self.worker
    }

    /// Run until `shutdown` fires, then wait for both tasks to stop.
    ///
    /// A panic in either task is logged and triggers shutdown of the other.
    pub async fn run(self, shutdown: CancellationToken) -> DeliveryStats {
        let worker = tokio::spawn(self.worker.run(shutdown.clone()));
        let poller = tokio::spawn(self.controller.run(shutdown.clone()));

        if let Err(e) = poller.await {
            tracing::error!(error = %e, "Poll controller task failed");
        }
        // The poller only returns on its own when the queue is gone or it
        // panicked; either way the worker has nothing more to wait for.
        shutdown.cancel();

        match worker.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "Delivery worker task failed");
                DeliveryStats::default()
            }
        }
    }
}
