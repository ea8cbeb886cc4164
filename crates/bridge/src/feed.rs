//! RSS feed fetching and entry extraction.

use std::time::Duration;

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    reqwest::{
        StatusCode,
        header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue},
    },
    tracing::{debug, warn},
};

use crate::{Result, error::Context};

/// Sent on every feed request; the feed host challenges non-browser clients.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// One post from a channel feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Permalink of the post; the dedup key.
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    /// Raw HTML body.
    pub content: String,
}

/// Supplies the current entries of a source channel.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, channel: &str) -> Result<Vec<FeedEntry>>;
}

/// Fetches feeds over HTTP from a `{channel}` URL template.
pub struct HttpFeedSource {
    http: reqwest::Client,
    url_template: String,
    challenge_retry_delay: Duration,
}

impl HttpFeedSource {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url_template: url_template.into(),
            challenge_retry_delay: Duration::from_secs(2),
        })
    }

    #[must_use]
    pub fn with_challenge_retry_delay(mut self, delay: Duration) -> Self {
        self.challenge_retry_delay = delay;
        self
    }

    pub fn feed_url(&self, channel: &str) -> String {
        self.url_template.replace("{channel}", channel)
    }

    async fn get_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self.http.get(url).send().await?;
        if is_challenge(response.status()) {
            return Ok(None);
        }
        let bytes = response.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }
}

/// Status codes an anti-bot front answers with before letting a client in.
fn is_challenge(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS
    )
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, channel: &str) -> Result<Vec<FeedEntry>> {
        let url = self.feed_url(channel);
        let body = match self.get_bytes(&url).await? {
            Some(body) => body,
            None => {
                debug!(channel, "feed host challenged the request, retrying once");
                tokio::time::sleep(self.challenge_retry_delay).await;
                self.get_bytes(&url)
                    .await?
                    .with_context(|| format!("feed request for {channel} was challenged twice"))?
            },
        };
        parse_feed(&body)
    }
}

/// Parse an RSS or Atom document into entries, skipping entries without a
/// permalink.
pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(body)?;
    let entries = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                warn!(id = %entry.id, "feed entry has no link, skipping");
                return None;
            };
            let content = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            Some(FeedEntry {
                link,
                published: entry.published.or(entry.updated),
                content,
            })
        })
        .collect();
    Ok(entries)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Furcon</title>
    <link>https://t.me/s/furcon</link>
    <description>Furcon news</description>
    <item>
      <title>Second</title>
      <link>https://t.me/furcon/2</link>
      <description>&lt;p&gt;Second post&lt;/p&gt;</description>
      <pubDate>Wed, 01 May 2024 12:30:00 GMT</pubDate>
    </item>
    <item>
      <title>First</title>
      <link>https://t.me/furcon/1</link>
      <description>First post</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_items() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://t.me/furcon/2");
        assert_eq!(entries[0].content, "<p>Second post</p>");
        assert_eq!(
            entries[0].published,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap())
        );
        assert_eq!(entries[1].published, None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_feed(b"<html>not a feed</html>").is_err());
    }

    #[tokio::test]
    async fn fetches_with_browser_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/telegram/channel/furcon")
            .match_header("user-agent", mockito::Matcher::Regex("Mozilla".into()))
            .with_status(200)
            .with_header("content-type", "application/rss+xml")
            .with_body(RSS)
            .create_async()
            .await;

        let source = HttpFeedSource::new(
            format!("{}/telegram/channel/{{channel}}", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let entries = source.fetch("furcon").await.unwrap();
        assert_eq!(entries.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retries_once_after_challenge() {
        let mut server = mockito::Server::new_async().await;
        let challenge = server
            .mock("GET", "/feed/furcon")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let source = HttpFeedSource::new(
            format!("{}/feed/{{channel}}", server.url()),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_challenge_retry_delay(Duration::ZERO);
        let err = source.fetch("furcon").await.unwrap_err();
        assert!(err.to_string().contains("challenged twice"));
        challenge.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/feed/furcon")
            .with_status(500)
            .create_async()
            .await;
        let source =
            HttpFeedSource::new(format!("{}/feed/{{channel}}", server.url()), Duration::from_secs(5))
                .unwrap();
        assert!(source.fetch("furcon").await.is_err());
    }
}
