// src/tracking/mod.rs
// View tracking - records the viewing user against each story they open

mod memory;
mod metrics;
mod rest;

pub use memory::InMemoryViewRecorder;
pub use metrics::TrackingMetrics;
pub use rest::RestViewRecorder;

use crate::story::Story;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ViewRecordError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Authentication failed")]
    Authentication,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Backend rejected view: {0}")]
    Rejected(String),
}

/// Persistence backend for story views. Must be idempotent for the same
/// (owner, story, viewer) triple: a repeated call never double-counts.
#[async_trait]
pub trait ViewRecorder: Send + Sync {
    async fn record_view(
        &self,
        story_owner_id: &str,
        story_created_at: DateTime<Utc>,
        viewer_id: &str,
    ) -> Result<(), ViewRecordError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Issued,
    OwnStory,
    AlreadyViewed,
    Duplicate,
}

/// Fire-and-forget view recording with local dedupe
pub struct ViewTracker {
    viewer_id: String,
    recorder: Arc<dyn ViewRecorder>,
    issued: HashSet<(String, i64)>,
    pending: Vec<JoinHandle<()>>,
    metrics: Arc<Mutex<TrackingMetrics>>,
}

impl ViewTracker {
    pub fn new(viewer_id: impl Into<String>, recorder: Arc<dyn ViewRecorder>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            recorder,
            issued: HashSet::new(),
            pending: Vec::new(),
            metrics: Arc::new(Mutex::new(TrackingMetrics::new())),
        }
    }

    /// Called when `story` becomes active. Adds the viewer locally and spawns the remote
    /// call; never waits for it.
    pub fn observe(&mut self, story: &mut Story) -> TrackOutcome {
        self.pending.retain(|handle| !handle.is_finished());

        if story.owner_user_id == self.viewer_id {
            return TrackOutcome::OwnStory;
        }

        let key = (
            story.owner_user_id.clone(),
            story.created_at.timestamp_millis(),
        );

        if self.issued.contains(&key) {
            self.record_suppressed();
            return TrackOutcome::Duplicate;
        }

        if story.has_viewer(&self.viewer_id) {
            return TrackOutcome::AlreadyViewed;
        }

        story.add_viewer(&self.viewer_id);
        self.issued.insert(key);

        let recorder = self.recorder.clone();
        let metrics = self.metrics.clone();
        let owner = story.owner_user_id.clone();
        let created_at = story.created_at;
        let viewer = self.viewer_id.clone();

        let handle = tokio::spawn(async move {
            let result = recorder.record_view(&owner, created_at, &viewer).await;
            let Ok(mut metrics) = metrics.lock() else {
                return;
            };
            match result {
                Ok(()) => {
                    tracing::debug!(
                        "View recorded via {}: story {}/{} viewer {}",
                        recorder.name(),
                        owner,
                        created_at.timestamp_millis(),
                        viewer
                    );
                    metrics.record_success();
                }
                Err(e) => {
                    tracing::warn!(
                        "View record failed via {} for story {}/{}: {}",
                        recorder.name(),
                        owner,
                        created_at.timestamp_millis(),
                        e
                    );
                    metrics.record_failure();
                }
            }
        });
        self.pending.push(handle);

        TrackOutcome::Issued
    }

    /// Waits for in-flight calls. Used when the session winds down.
    pub async fn drain(&mut self) {
        for handle in self.pending.drain(..) {
            let _ = handle.await;
        }
    }

    pub fn metrics(&self) -> TrackingMetrics {
        self.metrics
            .lock()
            .map(|metrics| metrics.clone())
            .unwrap_or_default()
    }

    fn record_suppressed(&self) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_suppressed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn story(owner: &str, minute: u32) -> Story {
        Story::new(
            owner,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
            "https://cdn.example.com/s.jpg",
            "image/jpeg",
        )
    }

    #[tokio::test]
    async fn records_once_per_story() {
        let recorder = Arc::new(InMemoryViewRecorder::new());
        let mut tracker = ViewTracker::new("bob", recorder.clone());
        let mut story = story("alice", 0);

        assert_eq!(tracker.observe(&mut story), TrackOutcome::Issued);
        assert_eq!(tracker.observe(&mut story), TrackOutcome::Duplicate);
        tracker.drain().await;

        assert_eq!(story.viewer_ids.iter().filter(|v| *v == "bob").count(), 1);
        assert_eq!(recorder.call_count(), 1);
        assert!(recorder.viewers_of("alice", story.created_at).contains("bob"));

        let metrics = tracker.metrics();
        assert_eq!(metrics.recorded(), 1);
        assert_eq!(metrics.suppressed(), 1);
        assert_eq!(metrics.success_rate(), 1.0);
    }

    #[tokio::test]
    async fn fresh_copy_of_same_story_is_deduped_locally() {
        let recorder = Arc::new(InMemoryViewRecorder::new());
        let mut tracker = ViewTracker::new("bob", recorder.clone());

        let mut first = story("alice", 3);
        let mut second = story("alice", 3);
        tracker.observe(&mut first);
        assert_eq!(tracker.observe(&mut second), TrackOutcome::Duplicate);
        tracker.drain().await;

        assert_eq!(recorder.call_count(), 1);
    }

    #[tokio::test]
    async fn owner_and_known_viewers_are_skipped() {
        let recorder = Arc::new(InMemoryViewRecorder::new());
        let mut tracker = ViewTracker::new("alice", recorder.clone());

        let mut own = story("alice", 1);
        assert_eq!(tracker.observe(&mut own), TrackOutcome::OwnStory);
        assert!(own.viewer_ids.is_empty());

        let mut seen = story("carol", 2);
        seen.add_viewer("alice");
        assert_eq!(tracker.observe(&mut seen), TrackOutcome::AlreadyViewed);

        tracker.drain().await;
        assert_eq!(recorder.call_count(), 0);
    }

    #[tokio::test]
    async fn failures_are_absorbed() {
        let recorder = Arc::new(InMemoryViewRecorder::failing());
        let mut tracker = ViewTracker::new("bob", recorder.clone());
        let mut story = story("alice", 4);

        assert_eq!(tracker.observe(&mut story), TrackOutcome::Issued);
        tracker.drain().await;

        // Optimistic local add stays; no retry is attempted
        assert!(story.has_viewer("bob"));
        assert_eq!(recorder.call_count(), 1);
        assert_eq!(tracker.metrics().failed(), 1);
        assert_eq!(tracker.metrics().success_rate(), 0.0);
    }
}
