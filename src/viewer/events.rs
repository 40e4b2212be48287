use crate::session::{Position, ProgressState, SegmentProgress, StoryKey};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DismissReason {
    /// Last story of the last group finished
    Exhausted,
    DragDismissed,
    /// Host closed the viewer (back navigation, screen teardown)
    Closed,
}

/// State-change notifications for whatever renders the story surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewerEvent {
    #[serde(rename_all = "camelCase")]
    StoryChanged {
        session_id: String,
        key: StoryKey,
        user_id: String,
        username: String,
        profile_image_url: Option<String>,
        media_url: String,
        mime_type: String,
        view_count: usize,
        segments: Vec<SegmentProgress>,
    },
    #[serde(rename_all = "camelCase")]
    Progress { key: StoryKey, fraction: f32 },
    #[serde(rename_all = "camelCase")]
    Loading { key: StoryKey, visible: bool },
    Paused,
    Resumed,
    #[serde(rename_all = "camelCase")]
    Drag { offset: f32, scale: f32 },
    SnapBack,
    #[serde(rename_all = "camelCase")]
    Dismissed { reason: DismissReason },
}

/// Read-only view of the active story
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSnapshot {
    pub session_id: String,
    pub position: Option<Position>,
    pub key: Option<StoryKey>,
    pub user_id: Option<String>,
    pub media_url: Option<String>,
    pub viewer_ids: Vec<String>,
    pub progress: ProgressState,
    pub loading: bool,
    pub segments: Vec<SegmentProgress>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub reason: DismissReason,
    pub stories_shown: usize,
    pub views_recorded: u64,
    pub views_failed: u64,
}
