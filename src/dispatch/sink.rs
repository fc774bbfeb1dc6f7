use async_trait::async_trait;
use thiserror::Error;

/// What the sink is asked to post for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification<'a> {
    /// Message body, the entry's link
    pub content: &'a str,
    /// Name to post under, usually the feed title
    pub display_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
}

/// Final outcome of a failed delivery, after the sink's own retries.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The endpoint answered with a non-success status
    #[error("HTTP error: status {0}")]
    Status(u16),
    /// Still rate limited after the sink's retry budget
    #[error("Rate limited after {0} attempts")]
    RateLimited(u32),
    /// Connection, TLS or timeout failure
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
}

impl DeliveryError {
    /// Status code for logging, when there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DeliveryError::Status(code) => Some(*code),
            DeliveryError::RateLimited(_) => Some(429),
            DeliveryError::Network(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// Receives one notification at a time.
///
/// Retry and backoff are the sink's business; the delivery worker treats one
/// call as one attempt and only observes the final result.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification<'_>) -> Result<(), DeliveryError>;
}
