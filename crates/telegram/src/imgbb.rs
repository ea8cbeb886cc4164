//! imgbb image host client.

use std::{path::Path, time::Duration};

use {
    async_trait::async_trait,
    base64::Engine as _,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, warn},
};

use crate::Result;

/// Re-hosts a local image at a public URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload the file at `path`. `Ok(None)` means the host accepted the
    /// request but returned no usable URL.
    async fn upload(&self, path: &Path) -> Result<Option<String>>;
}

pub struct ImgbbClient {
    api_key: Secret<String>,
    endpoint: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: Option<String>,
    display_url: Option<String>,
    image: Option<UploadImage>,
}

#[derive(Debug, Deserialize)]
struct UploadImage {
    url: Option<String>,
}

impl UploadData {
    /// Full-size image URL, then the display URL, then the viewer page URL.
    fn best_url(self) -> Option<String> {
        self.image
            .and_then(|i| i.url)
            .or(self.display_url)
            .or(self.url)
            .filter(|u| !u.is_empty())
    }
}

impl ImgbbClient {
    pub fn new(
        api_key: Secret<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            endpoint: endpoint.into(),
            http,
        })
    }
}

#[async_trait]
impl ImageHost for ImgbbClient {
    async fn upload(&self, path: &Path) -> Result<Option<String>> {
        let bytes = tokio::fs::read(path).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let response = self
            .http
            .post(&self.endpoint)
            .form(&[
                ("key", self.api_key.expose_secret().as_str()),
                ("image", encoded.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: UploadResponse = response.json().await?;
        if !body.success {
            warn!("imgbb rejected the upload");
            return Ok(None);
        }
        let url = body.data.and_then(UploadData::best_url);
        debug!(url = ?url, bytes = bytes.len(), "uploaded image to imgbb");
        Ok(url)
    }
}
