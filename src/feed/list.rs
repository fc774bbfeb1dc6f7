use crate::util::validate_feed_url;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Maximum feed list size (1 MB).
const MAX_LIST_SIZE: u64 = 1_048_576;

/// Errors that can occur while loading the feed list.
#[derive(Debug, Error)]
pub enum FeedListError {
    #[error("Failed to read feed list: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed list too large: {0} bytes (max {max} bytes)", max = MAX_LIST_SIZE)]
    TooLarge(u64),

    #[error("Feed list contains no valid feed URLs")]
    Empty,
}

/// Read a newline-delimited list of feed URLs.
///
/// Lines are trimmed. Blank lines and `#` comments are ignored; invalid or
/// duplicate URLs are skipped with a warning naming the 1-based line number.
///
/// # Errors
///
/// [`FeedListError::Empty`] if no valid URL remains, plus I/O and size
/// failures.
pub async fn load_feed_list(path: &Path) -> Result<Vec<String>, FeedListError> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > MAX_LIST_SIZE {
        return Err(FeedListError::TooLarge(meta.len()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let urls = parse_feed_list(&content);
    if urls.is_empty() {
        return Err(FeedListError::Empty);
    }

    tracing::info!(path = %path.display(), feeds = urls.len(), "Loaded feed list");
    Ok(urls)
}

/// Parse feed list content. See [`load_feed_list`] for the rules.
pub fn parse_feed_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match validate_feed_url(trimmed) {
            Ok(url) => {
                let url = url.to_string();
                if seen.insert(url.clone()) {
                    urls.push(url);
                } else {
                    tracing::warn!(line = line_no, url = %trimmed, "Duplicate feed URL, skipping");
                }
            }
            Err(e) => {
                tracing::warn!(line = line_no, url = %trimmed, error = %e, "Invalid feed URL, skipping");
            }
        }
    }

    urls
}
