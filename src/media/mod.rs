// src/media/mod.rs
// Media loading for the active story; completion gates the progress bar

mod http;

pub use http::HttpMediaLoader;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub content_type: Option<String>,
    pub bytes: usize,
}

#[derive(Debug, Error)]
pub enum MediaLoadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {0}")]
    Http(u16),

    #[error("Empty media body")]
    Empty,
}

/// Loads story media. Callers abort the returned future when the story changes.
#[async_trait]
pub trait MediaLoader: Send + Sync {
    async fn load(&self, url: &str, mime_type: &str) -> Result<MediaInfo, MediaLoadError>;

    fn name(&self) -> &str;
}

/// Reports ready at once, for hosts that render media themselves and report
/// readiness through the viewer handle.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateMediaLoader;

#[async_trait]
impl MediaLoader for ImmediateMediaLoader {
    async fn load(&self, _url: &str, mime_type: &str) -> Result<MediaInfo, MediaLoadError> {
        Ok(MediaInfo {
            content_type: Some(mime_type.to_string()),
            bytes: 0,
        })
    }

    fn name(&self) -> &str {
        "immediate"
    }
}
