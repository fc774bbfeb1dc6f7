use crate::feed::parser::parse_feed;
use crate::feed::source::{FeedSource, FetchOutcome, FetchRequest};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 3;
const USER_AGENT: &str = concat!("feedhook/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while reading a response body.
#[derive(Debug, Error)]
enum BodyError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Response too large (exceeds {0} bytes)")]
    TooLarge(usize),
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    Incomplete { expected: u64, received: usize },
}

/// Create a redirect policy with loop detection and limited hops.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// [`FeedSource`] backed by `reqwest` and `feed-rs`.
///
/// Sends `If-None-Match`/`If-Modified-Since` from the hints and maps the
/// response onto [`FetchOutcome`]:
///
/// - 304 → `NotModified`
/// - 2xx at the requested URL → `Fetched`
/// - 2xx after following a redirect → `Redirected`
/// - any other status → `HttpError`
/// - no response within the timeout, or a transport failure → `Unreachable`
/// - a body that is not RSS/Atom/JSON Feed, or exceeds 10MB → `ParseError`
#[derive(Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFeedSource {
    /// Build a source with its own client.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect_policy())
            .build()?;
        Ok(Self::with_client(client, timeout))
    }

    /// Build a source around an existing client (tests, shared pools).
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, request: FetchRequest<'_>) -> FetchOutcome {
        // Covers the body read as well as the headers
        let mut builder = self.client.get(request.url).timeout(self.timeout);
        if let Some(etag) = request.validator {
            builder = builder.header(IF_NONE_MATCH, etag);
        }
        if let Some(modified) = request.last_modified {
            builder = builder.header(IF_MODIFIED_SINCE, modified);
        }

        let response = match tokio::time::timeout(self.timeout, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return FetchOutcome::Unreachable(e.to_string()),
            Err(_) => {
                return FetchOutcome::Unreachable(format!(
                    "Request timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return FetchOutcome::NotModified;
        }
        if !status.is_success() {
            return FetchOutcome::HttpError(status.as_u16());
        }

        let redirected = url::Url::parse(request.url)
            .map(|requested| requested != *response.url())
            .unwrap_or(false);
        let validator = header_string(&response, ETAG);
        let last_modified = header_string(&response, LAST_MODIFIED);

        let bytes = match read_limited_bytes(response, MAX_FEED_SIZE).await {
            Ok(bytes) => bytes,
            Err(e @ BodyError::TooLarge(_)) => return FetchOutcome::ParseError(e.to_string()),
            Err(e) => return FetchOutcome::Unreachable(e.to_string()),
        };

        let mut document = match parse_feed(&bytes) {
            Ok(document) => document,
            Err(e) => return FetchOutcome::ParseError(e.to_string()),
        };
        document.validator = validator;
        document.last_modified = last_modified;

        if redirected {
            FetchOutcome::Redirected(document)
        } else {
            FetchOutcome::Fetched(document)
        }
    }
}

fn header_string(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Stream the body into memory, failing as soon as it passes `limit`.
async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, BodyError> {
    let declared = response.content_length();
    let capacity = match declared {
        Some(len) if len > limit as u64 => return Err(BodyError::TooLarge(limit)),
        Some(len) => len as usize,
        None => 0,
    };

    let mut body = Vec::with_capacity(capacity);
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }

    match declared {
        Some(expected) if (body.len() as u64) < expected => Err(BodyError::Incomplete {
            expected,
            received: body.len(),
        }),
        _ => Ok(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Test</title>
    <item>
        <guid>1</guid>
        <link>https://example.com/1</link>
        <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
    </item>
</channel></rss>"#;

    fn source() -> HttpFeedSource {
        HttpFeedSource::new(Duration::from_secs(5)).unwrap()
    }

    fn request(url: &str) -> FetchRequest<'_> {
        FetchRequest {
            url,
            validator: None,
            last_modified: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_success_captures_hints() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml")
                    .insert_header("ETag", "\"v1\"")
                    .insert_header("Last-Modified", "Mon, 01 Jan 2024 10:00:00 GMT"),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        match source().fetch(request(&url)).await {
            FetchOutcome::Fetched(doc) => {
                assert_eq!(doc.validator.as_deref(), Some("\"v1\""));
                assert_eq!(
                    doc.last_modified.as_deref(),
                    Some("Mon, 01 Jan 2024 10:00:00 GMT")
                );
                assert_eq!(doc.title.as_deref(), Some("Test"));
                assert_eq!(doc.entries.len(), 1);
            }
            other => panic!("Expected Fetched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_conditional_headers_sent_and_304_mapped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("If-None-Match", "\"v1\""))
            .and(header("If-Modified-Since", "Mon, 01 Jan 2024 10:00:00 GMT"))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let outcome = source()
            .fetch(FetchRequest {
                url: &url,
                validator: Some("\"v1\""),
                last_modified: Some("Mon, 01 Jan 2024 10:00:00 GMT"),
            })
            .await;
        assert_eq!(outcome, FetchOutcome::NotModified);
    }

    #[tokio::test]
    async fn test_404_is_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        assert_eq!(
            source().fetch(request(&url)).await,
            FetchOutcome::HttpError(404)
        );
    }

    #[tokio::test]
    async fn test_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        assert_eq!(
            source().fetch(request(&url)).await,
            FetchOutcome::HttpError(500)
        );
    }

    #[tokio::test]
    async fn test_redirect_followed_and_flagged() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profile/rss"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/real/rss", mock_server.uri())),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/real/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let url = format!("{}/profile/rss", mock_server.uri());
        match source().fetch(request(&url)).await {
            FetchOutcome::Redirected(doc) => assert_eq!(doc.entries.len(), 1),
            other => panic!("Expected Redirected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        assert!(matches!(
            source().fetch(request(&url)).await,
            FetchOutcome::ParseError(_)
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let source = HttpFeedSource::new(Duration::from_millis(200)).unwrap();
        assert!(matches!(
            source.fetch(request(&url)).await,
            FetchOutcome::Unreachable(_)
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Port 9 (discard) on localhost is almost never listening
        let outcome = source().fetch(request("http://127.0.0.1:9/feed")).await;
        assert!(matches!(outcome, FetchOutcome::Unreachable(_)));
    }
}
