//! Utility functions for common operations.
//!
//! - **URL validation**: feed list entries and the webhook endpoint
//! - **Text processing**: length limits and terminal-safe display strings

mod text;
mod url_validator;

pub use text::{strip_control_chars, truncate_chars};
pub use url_validator::{validate_feed_url, validate_webhook_url, UrlValidationError};
