use crate::dispatch::{Entry, EntrySender};
use crate::feed::source::{FeedDocument, FeedSource, FetchOutcome, FetchRequest};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

// ============================================================================
// Status and Metadata
// ============================================================================

/// Observable state of a feed. Cycles `Pending → Checking → <outcome> →
/// Checking → …` for as long as the process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// Not checked yet
    Pending,
    Checking,
    /// Server answered 304
    Unchanged,
    Ok,
    ParseError(String),
    HttpError(u16),
    Unreachable(String),
}

impl FeedStatus {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            FeedStatus::ParseError(_) | FeedStatus::HttpError(_) | FeedStatus::Unreachable(_)
        )
    }
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedStatus::Pending => f.write_str("pending"),
            FeedStatus::Checking => f.write_str("checking"),
            FeedStatus::Unchanged => f.write_str("unchanged"),
            FeedStatus::Ok => f.write_str("ok"),
            FeedStatus::ParseError(detail) => write!(f, "parse error: {}", detail),
            FeedStatus::HttpError(code) => match reqwest::StatusCode::from_u16(*code)
                .ok()
                .and_then(|s| s.canonical_reason())
            {
                Some(reason) => write!(f, "HTTP {} {}", code, reason),
                None => write!(f, "HTTP {}", code),
            },
            FeedStatus::Unreachable(detail) => write!(f, "unreachable: {}", detail),
        }
    }
}

/// Display metadata of a feed, shared read-only with the entries it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedProfile {
    /// Document title, or the feed URL when the document has none
    pub display_title: String,
    /// Name to post under; the document title when present
    pub author_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl FeedProfile {
    /// Profile of a feed whose document has not been seen yet.
    pub fn fallback(url: &str) -> Self {
        Self {
            display_title: url.to_string(),
            author_name: None,
            avatar_url: None,
        }
    }

    fn from_document(url: &str, doc: &FeedDocument) -> Self {
        Self {
            display_title: doc.title.clone().unwrap_or_else(|| url.to_string()),
            author_name: doc.title.clone(),
            avatar_url: doc.image_url.clone(),
        }
    }
}

/// Point-in-time view of a feed for the status table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub title: String,
    pub url: Arc<str>,
    pub status: FeedStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub validator: Option<String>,
    pub last_modified: Option<String>,
    pub seen: usize,
}

// ============================================================================
// Check Report
// ============================================================================

/// Why an item of a fetched document was not turned into an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSkip {
    /// No identity, cannot be deduplicated
    MissingId,
    /// No link or no publication time, nothing to deliver
    Incomplete,
}

/// Summary of one [`FeedState::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub status: FeedStatus,
    /// Identities recorded for the first time
    pub new_ids: usize,
    /// Entries handed to the dispatch queue
    pub enqueued: usize,
    pub skipped_missing_id: usize,
    pub skipped_incomplete: usize,
    /// The dispatch queue was closed mid-check; remaining items were left unseen
    pub queue_closed: bool,
}

impl CheckReport {
    fn with_status(status: FeedStatus) -> Self {
        Self {
            status,
            new_ids: 0,
            enqueued: 0,
            skipped_missing_id: 0,
            skipped_incomplete: 0,
            queue_closed: false,
        }
    }

    fn skip(&mut self, reason: ItemSkip) {
        match reason {
            ItemSkip::MissingId => self.skipped_missing_id += 1,
            ItemSkip::Incomplete => self.skipped_incomplete += 1,
        }
    }
}

// ============================================================================
// Feed State
// ============================================================================

/// Everything known about one monitored feed.
///
/// Mutated only by its own [`check`](FeedState::check), which takes `&mut
/// self`; the poll controller never runs two checks of the same feed at once.
/// Observers follow it through [`subscribe`](FeedState::subscribe).
pub struct FeedState {
    url: Arc<str>,
    validator: Option<String>,
    last_modified: Option<String>,
    last_checked: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    profile_tx: watch::Sender<Arc<FeedProfile>>,
    status: FeedStatus,
    seen: HashSet<String>,
    snapshot_tx: watch::Sender<FeedSnapshot>,
}

impl FeedState {
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        let url: Arc<str> = url.into();
        let (profile_tx, _) = watch::channel(Arc::new(FeedProfile::fallback(&url)));
        let (snapshot_tx, _) = watch::channel(FeedSnapshot {
            title: url.to_string(),
            url: Arc::clone(&url),
            status: FeedStatus::Pending,
            last_checked: None,
            updated: None,
            validator: None,
            last_modified: None,
            seen: 0,
        });

        Self {
            url,
            validator: None,
            last_modified: None,
            last_checked: None,
            updated: None,
            profile_tx,
            status: FeedStatus::Pending,
            seen: HashSet::new(),
            snapshot_tx,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn profile(&self) -> Arc<FeedProfile> {
        self.profile_tx.borrow().clone()
    }

    pub fn validator(&self) -> Option<&str> {
        self.validator.as_deref()
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_checked
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Follow this feed's snapshot as it changes.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            title: self.profile_tx.borrow().display_title.clone(),
            url: Arc::clone(&self.url),
            status: self.status.clone(),
            last_checked: self.last_checked,
            updated: self.updated,
            validator: self.validator.clone(),
            last_modified: self.last_modified.clone(),
            seen: self.seen.len(),
        }
    }

    fn set_status(&mut self, status: FeedStatus) {
        self.status = status;
        // send_replace never fails, even with no receivers
        self.snapshot_tx.send_replace(self.snapshot());
    }

    /// Fetch the feed and queue every entry that is new and published at or
    /// after `since`.
    ///
    /// Failures are recorded in the status and never escape: a parse error,
    /// an HTTP error or an unreachable host leaves hints, profile and seen
    /// set untouched, and the next cycle retries.
    ///
    /// Entries older than `since` are recorded as seen without being queued.
    /// Items whose identity was already seen are ignored even if their
    /// content changed.
    pub async fn check(
        &mut self,
        source: &dyn FeedSource,
        since: DateTime<Utc>,
        queue: &EntrySender,
    ) -> CheckReport {
        self.last_checked = Some(Utc::now());
        self.set_status(FeedStatus::Checking);

        let outcome = source
            .fetch(FetchRequest {
                url: &self.url,
                validator: self.validator.as_deref(),
                last_modified: self.last_modified.as_deref(),
            })
            .await;

        let document = match outcome {
            FetchOutcome::Fetched(doc) => doc,
            FetchOutcome::Redirected(doc) => {
                tracing::debug!(feed = %self.url, "Feed served through a redirect");
                doc
            }
            FetchOutcome::NotModified => {
                self.set_status(FeedStatus::Unchanged);
                return CheckReport::with_status(FeedStatus::Unchanged);
            }
            FetchOutcome::ParseError(detail) => {
                tracing::warn!(feed = %self.url, error = %detail, "Feed could not be parsed");
                return self.fail(FeedStatus::ParseError(detail));
            }
            FetchOutcome::HttpError(code) => {
                tracing::warn!(feed = %self.url, status = code, "Feed returned HTTP error");
                return self.fail(FeedStatus::HttpError(code));
            }
            FetchOutcome::Unreachable(detail) => {
                tracing::warn!(feed = %self.url, error = %detail, "Feed unreachable");
                return self.fail(FeedStatus::Unreachable(detail));
            }
        };

        self.validator = document.validator.clone();
        self.last_modified = document.last_modified.clone();
        self.updated = document.updated_at;
        self.profile_tx
            .send_replace(Arc::new(FeedProfile::from_document(&self.url, &document)));

        let mut report = CheckReport::with_status(FeedStatus::Ok);
        for raw in document.entries {
            let Some(id) = raw.id else {
                report.skip(ItemSkip::MissingId);
                continue;
            };
            if self.seen.contains(&id) {
                continue;
            }
            let (Some(link), Some(published_at)) = (raw.link, raw.published_at) else {
                report.skip(ItemSkip::Incomplete);
                continue;
            };

            if published_at >= since {
                let entry = Entry {
                    owner: self.profile_tx.subscribe(),
                    feed_url: Arc::clone(&self.url),
                    id: id.clone(),
                    link,
                    published_at,
                };
                // The identity is only committed once the entry is in the queue
                if queue.send(entry).is_err() {
                    tracing::warn!(feed = %self.url, "Dispatch queue closed, abandoning check");
                    report.queue_closed = true;
                    break;
                }
                report.enqueued += 1;
            }
            self.seen.insert(id);
            report.new_ids += 1;
        }

        if report.skipped_missing_id > 0 || report.skipped_incomplete > 0 {
            tracing::debug!(
                feed = %self.url,
                missing_id = report.skipped_missing_id,
                incomplete = report.skipped_incomplete,
                "Items skipped"
            );
        }
        if report.enqueued > 0 {
            tracing::info!(feed = %self.url, new = report.enqueued, "New entries queued");
        }

        self.set_status(FeedStatus::Ok);
        report
    }

    fn fail(&mut self, status: FeedStatus) -> CheckReport {
        self.set_status(status.clone());
        CheckReport::with_status(status)
    }
}

impl fmt::Debug for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedState")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("seen", &self.seen.len())
            .finish()
    }
}
