//! Turn placeholder media URLs into durable hosted URLs.

use std::{path::PathBuf, sync::Arc};

use tracing::{debug, warn};

#[cfg(feature = "metrics")]
use tgbridge_metrics::{counter, labels, media as media_metrics};

use crate::{
    Result,
    imgbb::ImageHost,
    placeholder::{PlaceholderRef, parse_placeholder},
    session::MediaSource,
};

/// Re-fetches placeholder media from Telegram and re-hosts it.
pub struct MediaResolver {
    source: Arc<dyn MediaSource>,
    host: Option<Arc<dyn ImageHost>>,
    temp_dir: Option<PathBuf>,
}

impl MediaResolver {
    /// `host` is `None` when no imgbb key is configured; every resolution
    /// then yields `None`.
    pub fn new(
        source: Arc<dyn MediaSource>,
        host: Option<Arc<dyn ImageHost>>,
        temp_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            source,
            host,
            temp_dir,
        }
    }

    /// Resolve `image_url` to a hosted URL.
    ///
    /// `source_channel` is the feed the entry came from and only tags logs.
    /// Any failure is logged and reported as `None`.
    pub async fn resolve(&self, image_url: &str, source_channel: &str) -> Option<String> {
        let Some(host) = &self.host else {
            debug!(source_channel, "no image host configured, dropping placeholder media");
            record_drop(source_channel, "no_host");
            return None;
        };
        let Some(target) = parse_placeholder(image_url) else {
            debug!(source_channel, url = image_url, "unrecoverable placeholder media");
            record_drop(source_channel, "unparseable");
            return None;
        };

        match self.fetch_and_upload(host.as_ref(), &target).await {
            Ok(Some(url)) => {
                debug!(
                    source_channel,
                    channel = %target.channel,
                    message_id = target.message_id,
                    url = %url,
                    "re-hosted placeholder media"
                );
                #[cfg(feature = "metrics")]
                counter!(media_metrics::RESOLVED_TOTAL, labels::CHANNEL => source_channel.to_string())
                    .increment(1);
                Some(url)
            },
            Ok(None) => {
                record_drop(source_channel, "no_media");
                None
            },
            Err(e) => {
                warn!(
                    source_channel,
                    channel = %target.channel,
                    message_id = target.message_id,
                    error = %e,
                    "failed to resolve placeholder media"
                );
                record_drop(source_channel, "error");
                None
            },
        }
    }

    async fn fetch_and_upload(
        &self,
        host: &dyn ImageHost,
        target: &PlaceholderRef,
    ) -> Result<Option<String>> {
        // Removed when `staged` drops, whichever branch returns.
        let mut builder = tempfile::Builder::new();
        builder.prefix("tgbridge-media-");
        let staged = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let downloaded = self
            .source
            .download_media(&target.channel, target.message_id, staged.path())
            .await?;
        if !downloaded {
            return Ok(None);
        }
        host.upload(staged.path()).await
    }
}

#[allow(unused_variables)]
fn record_drop(source_channel: &str, reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(
        media_metrics::DROPPED_TOTAL,
        labels::CHANNEL => source_channel.to_string(),
        labels::REASON => reason
    )
    .increment(1);
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        path::Path,
        sync::Mutex,
    };

    use {super::*, crate::Error, async_trait::async_trait, tempfile::TempDir};

    /// Writes fixed bytes and records what it was asked for.
    #[derive(Default)]
    struct FakeSource {
        fail: bool,
        empty: bool,
        calls: Mutex<Vec<(String, i64, PathBuf)>>,
    }

    #[async_trait]
    impl MediaSource for FakeSource {
        async fn download_media(&self, channel: &str, message_id: i64, dest: &Path) -> Result<bool> {
            self.calls
                .lock()
                .unwrap()
                .push((channel.to_string(), message_id, dest.to_path_buf()));
            if self.fail {
                return Err(Error::message("telegram unreachable"));
            }
            if self.empty {
                return Ok(false);
            }
            std::fs::write(dest, b"jpeg")?;
            Ok(true)
        }
    }

    #[derive(Default)]
    struct FakeHost {
        seen: Mutex<Vec<(PathBuf, Vec<u8>)>>,
    }

    #[async_trait]
    impl ImageHost for FakeHost {
        async fn upload(&self, path: &Path) -> Result<Option<String>> {
            let bytes = std::fs::read(path)?;
            self.seen.lock().unwrap().push((path.to_path_buf(), bytes));
            Ok(Some("https://i.ibb.co/x/full.jpg".into()))
        }
    }

    fn resolver(
        source: Arc<FakeSource>,
        host: Option<Arc<FakeHost>>,
        dir: &TempDir,
    ) -> MediaResolver {
        MediaResolver::new(
            source,
            host.map(|h| h as Arc<dyn ImageHost>),
            Some(dir.path().to_path_buf()),
        )
    }

    #[tokio::test]
    async fn resolves_and_cleans_up_temp_file() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::default());
        let host = Arc::new(FakeHost::default());
        let r = resolver(Arc::clone(&source), Some(Arc::clone(&host)), &dir);

        let url = r
            .resolve("undefined://telegram/channel/furcon_1234", "furcon")
            .await;
        assert_eq!(url.as_deref(), Some("https://i.ibb.co/x/full.jpg"));

        let calls = source.calls.lock().unwrap();
        assert_eq!(calls[0].0, "furcon");
        assert_eq!(calls[0].1, 1234);
        assert_eq!(host.seen.lock().unwrap()[0].1, b"jpeg");
        assert!(!calls[0].2.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn no_image_host_yields_none() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::default());
        let r = resolver(Arc::clone(&source), None, &dir);
        assert!(
            r.resolve("undefined://telegram/channel/furcon_1", "furcon")
                .await
                .is_none()
        );
        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn source_failure_yields_none_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(FakeSource {
            fail: true,
            ..Default::default()
        });
        let host = Arc::new(FakeHost::default());
        let r = resolver(source, Some(Arc::clone(&host)), &dir);
        assert!(
            r.resolve("undefined://telegram/channel/furcon_1", "furcon")
                .await
                .is_none()
        );
        assert!(host.seen.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_message_id_yields_none() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::default());
        let r = resolver(
            Arc::clone(&source),
            Some(Arc::new(FakeHost::default())),
            &dir,
        );
        assert!(
            r.resolve("undefined://telegram/channel/furcon", "furcon")
                .await
                .is_none()
        );
        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_without_media_yields_none() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(FakeSource {
            empty: true,
            ..Default::default()
        });
        let host = Arc::new(FakeHost::default());
        let r = resolver(source, Some(Arc::clone(&host)), &dir);
        assert!(
            r.resolve("undefined://channel/furcon_9", "furcon")
                .await
                .is_none()
        );
        assert!(host.seen.lock().unwrap().is_empty());
    }
}
