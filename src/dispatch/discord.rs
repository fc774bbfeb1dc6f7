//! Discord webhook sink.
//!
//! Rate limits follow Discord's guidance: no hardcoded budget, wait for the
//! duration the 429 response asks for and try again.

use crate::dispatch::sink::{DeliveryError, Notification, NotificationSink};
use crate::util::truncate_chars;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

/// Attempts per delivery before giving up on a rate-limited webhook.
const MAX_ATTEMPTS: u32 = 5;
/// Wait used when a 429 carries no usable retry hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
/// Default upper bound on a single rate-limit wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);
/// Discord rejects webhook usernames longer than this.
const MAX_USERNAME_CHARS: usize = 80;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}

/// Posts each notification as a plain-content webhook message.
pub struct DiscordSink {
    webhook_url: SecretString,
    client: reqwest::Client,
    max_retry_wait: Duration,
}

impl std::fmt::Debug for DiscordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSink")
            .field("webhook_url", &"[REDACTED]")
            .finish()
    }
}

impl DiscordSink {
    pub fn new(webhook_url: SecretString, client: reqwest::Client) -> Self {
        Self {
            webhook_url,
            client,
            max_retry_wait: MAX_RETRY_AFTER,
        }
    }

    /// Build a sink with its own client whose requests give up after `timeout`.
    pub fn with_timeout(webhook_url: SecretString, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("feedhook/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self::new(webhook_url, client))
    }

    /// Cap a single rate-limit wait, whatever the response asks for.
    pub fn with_max_retry_wait(mut self, max: Duration) -> Self {
        self.max_retry_wait = max;
        self
    }
}

/// Parse the wait a 429 response asks for, capped at `max`.
///
/// Discord sets `Retry-After` in (possibly fractional) seconds and mirrors
/// it in `X-RateLimit-Reset-After`.
fn retry_after(headers: &HeaderMap, max: Duration) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok()?.trim().parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        // Clamp before converting: from_secs_f64 panics past u64::MAX seconds
        .map(|secs| Duration::from_secs_f64(secs.min(max.as_secs_f64())))
}

#[async_trait]
impl NotificationSink for DiscordSink {
    async fn deliver(&self, notification: &Notification<'_>) -> Result<(), DeliveryError> {
        let username = notification
            .display_name
            .map(|name| truncate_chars(name, MAX_USERNAME_CHARS));
        let payload = WebhookPayload {
            content: notification.content,
            username: username.as_deref(),
            avatar_url: notification.avatar_url,
        };

        let mut attempts = 0;
        loop {
            attempts += 1;

            let response = self
                .client
                .post(self.webhook_url.expose_secret())
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempts >= MAX_ATTEMPTS {
                    return Err(DeliveryError::RateLimited(attempts));
                }
                let wait = retry_after(response.headers(), self.max_retry_wait)
                    .unwrap_or(DEFAULT_RETRY_AFTER.min(self.max_retry_wait));
                tracing::debug!(
                    wait_ms = wait.as_millis() as u64,
                    attempt = attempts,
                    max_attempts = MAX_ATTEMPTS,
                    "Webhook rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = %status, body = %body, "Webhook rejected message");
            return Err(DeliveryError::Status(status.as_u16()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink(server: &MockServer) -> DiscordSink {
        DiscordSink::new(
            SecretString::from(format!("{}/api/webhooks/1/token", server.uri())),
            reqwest::Client::new(),
        )
    }

    fn notification() -> Notification<'static> {
        Notification {
            content: "https://example.com/post/1",
            display_name: Some("Example Feed"),
            avatar_url: Some("https://example.com/avatar.png"),
        }
    }

    #[tokio::test]
    async fn test_deliver_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/1/token"))
            .and(body_json(serde_json::json!({
                "content": "https://example.com/post/1",
                "username": "Example Feed",
                "avatar_url": "https://example.com/avatar.png"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        sink(&server).deliver(&notification()).await.unwrap();
    }

    #[tokio::test]
    async fn test_absent_metadata_is_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({ "content": "https://example.com/x" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let n = Notification {
            content: "https://example.com/x",
            display_name: None,
            avatar_url: None,
        };
        sink(&server).deliver(&n).await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0.05"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        sink(&server).deliver(&notification()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .expect(u64::from(MAX_ATTEMPTS))
            .mount(&server)
            .await;

        let err = sink(&server).deliver(&notification()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::RateLimited(MAX_ATTEMPTS)));
        assert_eq!(err.status_code(), Some(429));
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let err = sink(&server).deliver(&notification()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Status(400)));
    }

    #[tokio::test]
    async fn test_long_username_truncated() {
        let server = MockServer::start().await;
        let long_name = "n".repeat(120);
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "content": "https://example.com/x",
                "username": "n".repeat(MAX_USERNAME_CHARS)
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let n = Notification {
            content: "https://example.com/x",
            display_name: Some(&long_name),
            avatar_url: None,
        };
        sink(&server).deliver(&n).await.unwrap();
    }

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, reqwest::header::HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_retry_after_parsing() {
        let max = MAX_RETRY_AFTER;
        assert_eq!(
            retry_after(&headers("retry-after", "1.5"), max),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            retry_after(&headers("x-ratelimit-reset-after", "2"), max),
            Some(Duration::from_secs(2))
        );
        assert_eq!(retry_after(&headers("retry-after", "1e30"), max), Some(max));
        assert_eq!(retry_after(&headers("retry-after", "inf"), max), None);
        assert_eq!(retry_after(&headers("retry-after", "-3"), max), None);
        assert_eq!(retry_after(&headers("retry-after", "soon"), max), None);
        assert_eq!(retry_after(&HeaderMap::new(), max), None);
    }

    #[tokio::test]
    async fn test_huge_retry_after_waits_bounded_time() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1e30"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = sink(&server).with_max_retry_wait(Duration::from_millis(20));
        let delivered = tokio::time::timeout(Duration::from_secs(5), sink.deliver(&notification()))
            .await
            .expect("wait should be capped");
        assert!(delivered.is_ok());
    }

    #[tokio::test]
    async fn test_hung_webhook_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let sink = DiscordSink::with_timeout(
            SecretString::from(format!("{}/api/webhooks/1/token", server.uri())),
            Duration::from_millis(200),
        )
        .unwrap();
        let err = sink.deliver(&notification()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Network(ref e) if e.is_timeout()));
    }

    #[test]
    fn test_debug_redacts_webhook() {
        let sink = DiscordSink::new(
            SecretString::from("https://discord.com/api/webhooks/1/secret-token"),
            reqwest::Client::new(),
        );
        let debug = format!("{:?}", sink);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
