//! Long-lived Telegram session used to re-fetch the media of a post.
//!
//! The session authenticates once with the bot token and stays up for the
//! process lifetime. Media is located through the public post preview page
//! and streamed to a caller-provided file.

use std::{path::Path, time::Duration};

use {
    async_trait::async_trait,
    regex::Regex,
    secrecy::{ExposeSecret, Secret},
    teloxide::{Bot, prelude::Requester},
    tokio::{io::AsyncWriteExt, sync::Mutex},
    tracing::{debug, info, warn},
};

use crate::{Error, Result};

/// Fetches the media attached to one Telegram message.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Download the media of `channel`/`message_id` into `dest`.
    ///
    /// `Ok(false)` means the message exists but carries no downloadable media.
    async fn download_media(&self, channel: &str, message_id: i64, dest: &Path) -> Result<bool>;
}

enum SessionState {
    Idle,
    Connected,
    Closed,
}

/// Telegram session authenticated with a bot token.
pub struct TelegramSession {
    bot_token: Option<Secret<String>>,
    preview_base: String,
    http: reqwest::Client,
    media_pattern: Regex,
    state: Mutex<SessionState>,
}

impl TelegramSession {
    pub fn new(
        bot_token: Option<Secret<String>>,
        preview_base: impl Into<String>,
        download_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(download_timeout)
            .build()?;
        let media_pattern = Regex::new(
            r#"class="tgme_widget_message_(?:photo_wrap|video_thumb)[^"]*"[^>]*?background-image:url\('([^']+)'\)"#,
        )
        .map_err(|e| Error::external("invalid media pattern", e))?;
        Ok(Self {
            bot_token,
            preview_base: preview_base.into().trim_end_matches('/').to_string(),
            http,
            media_pattern,
            state: Mutex::new(SessionState::Idle),
        })
    }

    /// Authenticate the session unless it already is.
    ///
    /// Fails when no auth method is configured or after [`close`](Self::close).
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match *state {
            SessionState::Connected => return Ok(()),
            SessionState::Closed => return Err(Error::SessionClosed),
            SessionState::Idle => {},
        }

        let Some(token) = &self.bot_token else {
            return Err(Error::message(
                "no telegram auth method configured (set telegram_bot_token)",
            ));
        };
        let bot = Bot::new(token.expose_secret());
        let me = bot.get_me().await?;
        info!(username = ?me.username, "telegram session authenticated");
        *state = SessionState::Connected;
        Ok(())
    }

    /// Disconnect. Later downloads fail with [`Error::SessionClosed`].
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, SessionState::Connected) {
            info!("telegram session closed");
        }
        *state = SessionState::Closed;
    }

    fn preview_url(&self, channel: &str, message_id: i64) -> String {
        format!(
            "{}/{channel}/{message_id}?embed=1&mode=tme",
            self.preview_base
        )
    }

    /// First photo or video thumbnail URL found in a post preview page.
    pub fn media_url_in(&self, html: &str) -> Option<String> {
        self.media_pattern
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[async_trait]
impl MediaSource for TelegramSession {
    async fn download_media(&self, channel: &str, message_id: i64, dest: &Path) -> Result<bool> {
        self.connect().await?;

        let page = self
            .http
            .get(self.preview_url(channel, message_id))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let Some(media_url) = self.media_url_in(&page) else {
            debug!(channel, message_id, "post has no downloadable media");
            return Ok(false);
        };

        let written = download_to_file(&self.http, &media_url, dest).await?;
        if written == 0 {
            warn!(channel, message_id, "media download was empty");
            return Ok(false);
        }
        debug!(channel, message_id, bytes = written, "media downloaded");
        Ok(true)
    }
}

/// Stream `url` into `dest`, returning the number of bytes written.
pub async fn download_to_file(http: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    let mut response = http.get(url).send().await?.error_for_status()?;
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    fn session(token: Option<&str>, preview_base: &str) -> TelegramSession {
        TelegramSession::new(
            token.map(|t| Secret::new(t.to_string())),
            preview_base,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn connect_without_token_fails() {
        let s = session(None, "https://t.me");
        let err = s.connect().await.unwrap_err();
        assert!(err.to_string().contains("no telegram auth method"));
        assert!(matches!(*s.state.lock().await, SessionState::Idle));
    }

    #[tokio::test]
    async fn closed_session_refuses_downloads() {
        let s = session(Some("1:abc"), "https://t.me");
        s.close().await;
        let tmp = TempDir::new().unwrap();
        let err = s
            .download_media("furcon", 1, &tmp.path().join("m"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[test]
    fn finds_photo_in_preview_page() {
        let s = session(None, "https://t.me/");
        let html = r#"<a class="tgme_widget_message_photo_wrap 5123" href="https://t.me/furcon/12" style="width:800px;background-image:url('https://cdn4.telesco.pe/file/abc.jpg')"></a>"#;
        assert_eq!(
            s.media_url_in(html).as_deref(),
            Some("https://cdn4.telesco.pe/file/abc.jpg")
        );
        assert_eq!(
            s.preview_url("furcon", 12),
            "https://t.me/furcon/12?embed=1&mode=tme"
        );
    }

    #[test]
    fn finds_video_thumbnail() {
        let s = session(None, "https://t.me");
        let html = r#"<i class="tgme_widget_message_video_thumb" style="background-image:url('https://cdn4.telesco.pe/file/v.jpg')"></i>"#;
        assert_eq!(
            s.media_url_in(html).as_deref(),
            Some("https://cdn4.telesco.pe/file/v.jpg")
        );
    }

    #[test]
    fn text_only_post_has_no_media() {
        let s = session(None, "https://t.me");
        let html = r#"<div class="tgme_widget_message_text">hello</div>"#;
        assert!(s.media_url_in(html).is_none());
    }

    #[tokio::test]
    async fn streams_download_to_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/file/abc.jpg")
            .with_status(200)
            .with_body(vec![1u8, 2, 3, 4])
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("abc.jpg");
        let http = reqwest::Client::new();
        let n = download_to_file(&http, &format!("{}/file/abc.jpg", server.url()), &dest)
            .await
            .unwrap();

        assert_eq!(n, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1, 2, 3, 4]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn download_error_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.jpg")
            .with_status(404)
            .create_async()
            .await;
        let tmp = TempDir::new().unwrap();
        let http = reqwest::Client::new();
        let result =
            download_to_file(&http, &format!("{}/gone.jpg", server.url()), &tmp.path().join("x"))
                .await;
        assert!(result.is_err());
    }
}
