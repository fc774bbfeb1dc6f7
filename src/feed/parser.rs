use feed_rs::model::Feed;
use feed_rs::parser;

use super::source::{FeedDocument, RawEntry};

/// Parse feed bytes into a [`FeedDocument`].
///
/// HTTP hints are left empty; the fetcher fills them in from the response
/// headers.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    Ok(FeedDocument::from(feed))
}

impl From<Feed> for FeedDocument {
    fn from(feed: Feed) -> Self {
        let entries = feed
            .entries
            .into_iter()
            .map(|entry| {
                let id = {
                    let trimmed = entry.id.trim();
                    (!trimmed.is_empty()).then(|| trimmed.to_string())
                };
                RawEntry {
                    id,
                    link: entry.links.into_iter().next().map(|l| l.href),
                    published_at: entry.published,
                }
            })
            .collect();

        // Prefer the logo (RSS <image>, Atom <logo>) over the favicon-sized icon
        let image_url = feed
            .logo
            .map(|image| image.uri)
            .or_else(|| feed.icon.map(|image| image.uri))
            .filter(|uri| !uri.is_empty());

        let title = feed
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty());

        FeedDocument {
            validator: None,
            last_modified: None,
            title,
            image_url,
            updated_at: feed.updated,
            entries,
        }
    }
}
