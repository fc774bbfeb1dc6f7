//! Shared fakes for the integration tests: a scripted feed source and a
//! sink that records what it was asked to deliver.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use feedhook::dispatch::{DeliveryError, Notification, NotificationSink};
use feedhook::feed::{FeedDocument, FeedSource, FetchOutcome, FetchRequest, RawEntry};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
}

pub fn item(id: &str, published_at: DateTime<Utc>) -> RawEntry {
    RawEntry {
        id: Some(id.to_string()),
        link: Some(format!("https://example.com/posts/{id}")),
        published_at: Some(published_at),
    }
}

pub fn document(title: &str, entries: Vec<RawEntry>) -> FeedDocument {
    FeedDocument {
        title: Some(title.to_string()),
        validator: Some(format!("\"{title}-v1\"")),
        entries,
        ..Default::default()
    }
}

/// What the source was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub url: String,
    pub validator: Option<String>,
    pub last_modified: Option<String>,
}

/// Per-URL queues of outcomes. When a URL's queue has one outcome left it
/// is repeated for every further fetch.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<HashMap<String, VecDeque<FetchOutcome>>>,
    requests: Mutex<Vec<SeenRequest>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, outcome: FetchOutcome) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch(&self, request: FetchRequest<'_>) -> FetchOutcome {
        self.requests.lock().unwrap().push(SeenRequest {
            url: request.url.to_string(),
            validator: request.validator.map(str::to_string),
            last_modified: request.last_modified.map(str::to_string),
        });

        let mut script = self.script.lock().unwrap();
        match script.get_mut(request.url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| FetchOutcome::Unreachable("no script".into())),
            None => FetchOutcome::Unreachable("no script".into()),
        }
    }
}

/// A delivered notification, owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub content: String,
    pub display_name: Option<String>,
}

/// Records every delivery; fails any delivery whose content is listed in
/// `fail_on`.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Delivered>>,
    fail_on: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(links: &[&str]) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail_on: links.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn links(&self) -> Vec<String> {
        self.delivered().into_iter().map(|d| d.content).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification<'_>) -> Result<(), DeliveryError> {
        self.delivered.lock().unwrap().push(Delivered {
            content: notification.content.to_string(),
            display_name: notification.display_name.map(str::to_string),
        });
        if self.fail_on.iter().any(|l| l == notification.content) {
            return Err(DeliveryError::Status(500));
        }
        Ok(())
    }
}
