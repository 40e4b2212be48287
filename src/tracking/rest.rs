// src/tracking/rest.rs
// REST view recorder - adds the viewer to the story's remote viewer set

use super::{ViewRecordError, ViewRecorder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordViewBody<'a> {
    viewer_id: &'a str,
}

pub struct RestViewRecorder {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl RestViewRecorder {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ViewRecordError> {
        let client = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build()
            .map_err(|e| ViewRecordError::Network(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!("REST view recorder initialized: {}", base_url);

        Ok(Self {
            base_url,
            api_token,
            client,
        })
    }

    /// `{base}/stories/{owner}/{created_at_ms}/viewers`
    fn viewers_url(&self, story_owner_id: &str, story_created_at: DateTime<Utc>) -> String {
        format!(
            "{}/stories/{}/{}/viewers",
            self.base_url,
            story_owner_id,
            story_created_at.timestamp_millis()
        )
    }
}

#[async_trait]
impl ViewRecorder for RestViewRecorder {
    async fn record_view(
        &self,
        story_owner_id: &str,
        story_created_at: DateTime<Utc>,
        viewer_id: &str,
    ) -> Result<(), ViewRecordError> {
        let mut request = self
            .client
            .post(self.viewers_url(story_owner_id, story_created_at))
            .json(&RecordViewBody { viewer_id });

        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    Ok(())
                } else if status.as_u16() == 401 || status.as_u16() == 403 {
                    Err(ViewRecordError::Authentication)
                } else if status.as_u16() == 429 {
                    Err(ViewRecordError::RateLimited)
                } else {
                    let body = resp.text().await.unwrap_or_default();
                    Err(ViewRecordError::Http {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
            Err(e) => {
                if e.is_timeout() {
                    Err(ViewRecordError::Timeout)
                } else {
                    Err(ViewRecordError::Network(e.to_string()))
                }
            }
        }
    }

    fn name(&self) -> &str {
        "rest"
    }
}
