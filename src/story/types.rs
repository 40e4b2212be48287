// src/story/types.rs
// Story content types shared by the feed, the sequencer and view tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One story posted by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub owner_user_id: String,
    /// Creation time; together with the owner this identifies the story remotely
    pub created_at: DateTime<Utc>,
    pub media_url: String,
    /// e.g. "image/jpeg", "video/mp4"
    pub mime_type: String,
    /// Users who have viewed this story (never contains the owner)
    #[serde(default)]
    pub viewer_ids: BTreeSet<String>,
}

impl Story {
    pub fn new(
        owner_user_id: impl Into<String>,
        created_at: DateTime<Utc>,
        media_url: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            created_at,
            media_url: media_url.into(),
            mime_type: mime_type.into(),
            viewer_ids: BTreeSet::new(),
        }
    }

    /// Adds a viewer. Returns false for the owner or an already-present viewer.
    pub fn add_viewer(&mut self, viewer_id: &str) -> bool {
        if viewer_id == self.owner_user_id {
            return false;
        }
        self.viewer_ids.insert(viewer_id.to_string())
    }

    pub fn has_viewer(&self, viewer_id: &str) -> bool {
        self.viewer_ids.contains(viewer_id)
    }

    pub fn view_count(&self) -> usize {
        self.viewer_ids.len()
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    /// Restores the owner invariant on data that came from outside.
    pub(crate) fn strip_owner_view(&mut self) {
        self.viewer_ids.remove(&self.owner_user_id);
    }
}

/// All stories of one user, shown consecutively
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStoryGroup {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// Oldest first
    pub stories: Vec<Story>,
}

impl UserStoryGroup {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        profile_image_url: Option<String>,
        stories: Vec<Story>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            profile_image_url,
            stories,
        }
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.stories.len().checked_sub(1)
    }

    pub fn newest_story_at(&self) -> Option<DateTime<Utc>> {
        self.stories.iter().map(|story| story.created_at).max()
    }
}
