// src/story/feed.rs
// Feed -> eligible story groups for a viewing session

use super::{Story, UserStoryGroup};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// Stories disappear from the feed after this many hours
pub const STORY_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to read feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid feed document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown story user: {0}")]
    UnknownUser(String),
}

/// Ordered groups plus the group the viewer opened
#[derive(Debug, Clone)]
pub struct FeedSelection {
    pub groups: Vec<UserStoryGroup>,
    pub start_group_index: usize,
}

impl FeedSelection {
    pub fn new(groups: Vec<UserStoryGroup>) -> Self {
        Self {
            groups,
            start_group_index: 0,
        }
    }

    /// Opens the session at the given user's stories, e.g. after tapping their avatar.
    pub fn start_at_user(mut self, user_id: &str) -> Result<Self, FeedError> {
        let index = self
            .groups
            .iter()
            .position(|group| group.user_id == user_id)
            .ok_or_else(|| FeedError::UnknownUser(user_id.to_string()))?;
        self.start_group_index = index;
        Ok(self)
    }
}

/// Supplies the story groups a session is opened with
#[async_trait]
pub trait FeedProvider: Send + Sync {
    async fn load_selection(&self) -> Result<FeedSelection, FeedError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedDocument {
    groups: Vec<UserStoryGroup>,
    #[serde(default)]
    following: Option<Vec<String>>,
}

/// Reads a feed document (`{"groups": [...], "following": [...]}`) from disk
pub struct JsonFeedProvider {
    path: PathBuf,
    viewer_id: String,
}

impl JsonFeedProvider {
    pub fn new(path: impl Into<PathBuf>, viewer_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            viewer_id: viewer_id.into(),
        }
    }
}

#[async_trait]
impl FeedProvider for JsonFeedProvider {
    async fn load_selection(&self) -> Result<FeedSelection, FeedError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let document: FeedDocument = serde_json::from_str(&raw)?;
        let following = document
            .following
            .map(|ids| ids.into_iter().collect::<HashSet<_>>());

        let groups = eligible_groups(
            document.groups,
            &self.viewer_id,
            following.as_ref(),
            Utc::now(),
        );

        tracing::info!(
            "Feed loaded from {}: {} eligible groups",
            self.path.display(),
            groups.len()
        );

        Ok(FeedSelection::new(groups))
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

/// Builds the session list: drops expired stories and unfollowed users, sorts stories
/// oldest-first, drops empty groups and orders groups by their newest story.
pub fn eligible_groups(
    groups: Vec<UserStoryGroup>,
    viewer_id: &str,
    following: Option<&HashSet<String>>,
    now: DateTime<Utc>,
) -> Vec<UserStoryGroup> {
    let cutoff = now - Duration::hours(STORY_LIFETIME_HOURS);

    let mut eligible: Vec<UserStoryGroup> = groups
        .into_iter()
        .filter(|group| {
            group.user_id == viewer_id
                || following.map_or(true, |ids| ids.contains(&group.user_id))
        })
        .filter_map(|mut group| {
            group.stories.retain(|story| story.created_at > cutoff);
            for story in &mut group.stories {
                story.strip_owner_view();
            }
            group.stories.sort_by_key(|story: &Story| story.created_at);
            if group.is_empty() {
                tracing::debug!("Skipping story group without live stories: {}", group.user_id);
                None
            } else {
                Some(group)
            }
        })
        .collect();

    eligible.sort_by(|a, b| b.newest_story_at().cmp(&a.newest_story_at()));
    eligible
}
