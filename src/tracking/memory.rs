use super::{ViewRecordError, ViewRecorder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Set-union view store kept in process. Used when no backend is configured.
#[derive(Default)]
pub struct InMemoryViewRecorder {
    views: Mutex<HashMap<(String, i64), BTreeSet<String>>>,
    calls: AtomicUsize,
    fail: bool,
}

impl InMemoryViewRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every call; for exercising the failure path.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn viewers_of(
        &self,
        story_owner_id: &str,
        story_created_at: DateTime<Utc>,
    ) -> BTreeSet<String> {
        let key = (story_owner_id.to_string(), story_created_at.timestamp_millis());
        self.views
            .lock()
            .ok()
            .and_then(|views| views.get(&key).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ViewRecorder for InMemoryViewRecorder {
    async fn record_view(
        &self,
        story_owner_id: &str,
        story_created_at: DateTime<Utc>,
        viewer_id: &str,
    ) -> Result<(), ViewRecordError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(ViewRecordError::Rejected("in-memory store offline".to_string()));
        }

        let mut views = self
            .views
            .lock()
            .map_err(|e| ViewRecordError::Rejected(e.to_string()))?;
        views
            .entry((story_owner_id.to_string(), story_created_at.timestamp_millis()))
            .or_default()
            .insert(viewer_id.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_calls_do_not_double_count() {
        let recorder = InMemoryViewRecorder::new();
        let at = Utc::now();

        recorder.record_view("alice", at, "bob").await.unwrap();
        recorder.record_view("alice", at, "bob").await.unwrap();

        assert_eq!(recorder.viewers_of("alice", at).len(), 1);
        assert_eq!(recorder.call_count(), 2);
    }
}
