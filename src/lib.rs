//! Polls RSS/Atom feeds and posts every new item, once, to a Discord webhook.
//!
//! The pipeline:
//!
//! ```text
//! PollController ── FeedState::check ──▶ EntrySender ══ queue ══▶ EntryReceiver
//!                                                                     │
//!                                   NotificationSink ◀── DeliveryWorker
//! ```
//!
//! - [`feed`] - fetching, parsing and per-feed dedup state
//! - [`dispatch`] - the queue, the delivery worker and the Discord sink
//! - [`monitor`] - poll cycles and task lifecycle
//! - [`ui`] - optional live status table
//! - [`config`], [`logging`], [`util`] - ambient plumbing

pub mod config;
pub mod dispatch;
pub mod feed;
pub mod logging;
pub mod monitor;
pub mod ui;
pub mod util;
