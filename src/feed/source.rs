use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Conditional-request hints passed to a [`FeedSource`].
///
/// `validator` is the ETag and `last_modified` the Last-Modified value
/// returned by the previous successful fetch of the same URL.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub validator: Option<&'a str>,
    pub last_modified: Option<&'a str>,
}

/// One item of a parsed feed document.
///
/// Every field is optional: items that lack an identity, a link or a
/// publication time are skipped by the feed state, not by the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub id: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A successfully fetched and parsed feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    /// ETag of the response
    pub validator: Option<String>,
    /// Last-Modified of the response
    pub last_modified: Option<String>,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Items in document order
    pub entries: Vec<RawEntry>,
}

/// Result of a single fetch+parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server answered 200 with a parsable document.
    Fetched(FeedDocument),
    /// The request was redirected and the final response parsed. Treated as success.
    Redirected(FeedDocument),
    /// HTTP 304: the hints are still current.
    NotModified,
    /// Any other HTTP status.
    HttpError(u16),
    /// No HTTP status at all (DNS, connection, TLS, timeout).
    Unreachable(String),
    /// The body was not a feed document.
    ParseError(String),
}

/// Fetches and parses a feed.
///
/// Implementations never fail with an error type: every failure mode is one
/// of the [`FetchOutcome`] variants so the caller can record it as status.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, request: FetchRequest<'_>) -> FetchOutcome;
}
