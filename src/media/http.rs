use super::{MediaInfo, MediaLoadError, MediaLoader};
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Prefetches story media over HTTP so the bar only starts once bytes are local
pub struct HttpMediaLoader {
    client: reqwest::Client,
}

impl HttpMediaLoader {
    pub fn new(timeout: Option<Duration>) -> Result<Self, MediaLoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build()
            .map_err(|e| MediaLoadError::Network(e.to_string()))?;

        tracing::info!("HTTP media loader initialized");

        Ok(Self { client })
    }
}

#[async_trait]
impl MediaLoader for HttpMediaLoader {
    async fn load(&self, url: &str, mime_type: &str) -> Result<MediaInfo, MediaLoadError> {
        tracing::debug!("Loading story media {} ({})", url, mime_type);

        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MediaLoadError::Timeout
            } else {
                MediaLoadError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MediaLoadError::Http(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                MediaLoadError::Timeout
            } else {
                MediaLoadError::Network(e.to_string())
            }
        })?;

        if body.is_empty() {
            return Err(MediaLoadError::Empty);
        }

        Ok(MediaInfo {
            content_type,
            bytes: body.len(),
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
