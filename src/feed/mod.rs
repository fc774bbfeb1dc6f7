//! Feed polling and new-entry detection.
//!
//! - [`source`] - the [`FeedSource`] contract: fetch a URL with conditional
//!   hints, get back a [`FetchOutcome`]
//! - [`fetcher`] - [`HttpFeedSource`], the `reqwest` implementation
//! - [`parser`] - `feed-rs` document → [`FeedDocument`]
//! - [`state`] - [`FeedState`], one per URL: hints, status, seen identities
//! - [`list`] - the newline-delimited feed list file
//!
//! # Example
//!
//! ```ignore
//! use feedhook::dispatch::queue;
//! use feedhook::feed::{FeedState, HttpFeedSource};
//!
//! let source = HttpFeedSource::new(Duration::from_secs(30))?;
//! let (tx, rx) = queue();
//! let mut feed = FeedState::new("https://example.com/rss");
//! let report = feed.check(&source, since, &tx).await;
//! ```

mod fetcher;
mod list;
mod parser;
mod source;
mod state;

pub use fetcher::HttpFeedSource;
pub use list::{load_feed_list, parse_feed_list, FeedListError};
pub use parser::parse_feed;
pub use source::{FeedDocument, FeedSource, FetchOutcome, FetchRequest, RawEntry};
pub use state::{CheckReport, FeedProfile, FeedSnapshot, FeedState, FeedStatus, ItemSkip};
