use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The webhook URL is plain HTTP to a remote host.
    #[error("Insecure webhook URL: HTTPS required (except localhost for testing)")]
    InsecureWebhook,
}

/// Validates a feed URL from the feed list.
///
/// Only `http` and `https` with a host are accepted. Private and loopback
/// hosts are allowed: self-hosted feeds are a normal use case.
///
/// # Examples
///
/// ```
/// use feedhook::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// assert!(validate_feed_url("not a url").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}

/// Validates the webhook endpoint.
///
/// The webhook URL embeds its credential, so it must be HTTPS. Plain HTTP is
/// accepted only for `localhost`/`127.0.0.1` (local testing).
pub fn validate_webhook_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = validate_feed_url(url_str)?;

    if url.scheme() == "http" {
        let is_local = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
        if !is_local {
            return Err(UrlValidationError::InsecureWebhook);
        }
        tracing::warn!("Using non-HTTPS webhook URL (localhost only)");
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_feed_urls() {
        assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
        assert!(validate_feed_url("http://news.example.org").is_ok());
        assert!(validate_feed_url("http://192.168.1.10:8080/rss").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_feed_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_unparsable() {
        assert!(matches!(
            validate_feed_url("example.com/feed"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_webhook_requires_https() {
        assert!(validate_webhook_url("https://discord.com/api/webhooks/1/abc").is_ok());
        assert!(matches!(
            validate_webhook_url("http://discord.com/api/webhooks/1/abc"),
            Err(UrlValidationError::InsecureWebhook)
        ));
    }

    #[test]
    fn test_webhook_http_localhost_allowed() {
        assert!(validate_webhook_url("http://127.0.0.1:8080/hook").is_ok());
        assert!(validate_webhook_url("http://localhost/hook").is_ok());
    }
}
