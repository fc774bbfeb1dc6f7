//! Hand-off from feed checks to the notification sink.
//!
//! - [`queue`] - unbounded FIFO carrying [`Entry`] values from any number of
//!   producers to a single consumer
//! - [`DeliveryWorker`] - the consumer; delivers one entry at a time
//! - [`NotificationSink`] - where entries end up; [`DiscordSink`] posts them
//!   to a Discord webhook

mod discord;
mod queue;
mod sink;
mod worker;

pub use discord::DiscordSink;
pub use queue::{queue, Entry, EntryReceiver, EntrySender, QueueClosed};
pub use sink::{DeliveryError, Notification, NotificationSink};
pub use worker::{DeliveryStats, DeliveryWorker, DEFAULT_SHUTDOWN_GRACE};
