use crate::story::{Story, UserStoryGroup};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub mod progress;
pub mod segment;

pub use progress::{ProgressDriver, ProgressState, StoryKey, TickOutcome};
pub use segment::{SegmentProgress, SegmentStatus};

/// Location of the active story inside the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub group_index: usize,
    pub story_index: usize,
}

impl Position {
    pub fn new(group_index: usize, story_index: usize) -> Self {
        Self {
            group_index,
            story_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active(Position),
    Exhausted,
}

/// Result of a sequencer command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: Position, to: Position },
    Unchanged,
    /// Advanced past the last story of the last group. Produced once per session.
    Exhausted,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidSessionError {
    #[error("No story groups to view")]
    NoGroups,

    #[error("Start group {index} out of range ({len} groups)")]
    StartIndexOutOfRange { index: usize, len: usize },

    #[error("Story group for user {0} has no stories")]
    EmptyGroup(String),
}

/// Owns the viewing session and is the only mutator of its cursors
pub struct StorySequencer {
    session_id: String,
    groups: Vec<UserStoryGroup>,
    state: SessionState,
}

impl StorySequencer {
    pub fn initialize(
        groups: Vec<UserStoryGroup>,
        start_group_index: usize,
    ) -> Result<Self, InvalidSessionError> {
        if groups.is_empty() {
            return Err(InvalidSessionError::NoGroups);
        }

        if start_group_index >= groups.len() {
            return Err(InvalidSessionError::StartIndexOutOfRange {
                index: start_group_index,
                len: groups.len(),
            });
        }

        if let Some(empty) = groups.iter().find(|group| group.is_empty()) {
            return Err(InvalidSessionError::EmptyGroup(empty.user_id.clone()));
        }

        let session_id = Uuid::new_v4().to_string();
        tracing::info!(
            "Started story session {}: {} groups, starting at group {}",
            session_id,
            groups.len(),
            start_group_index
        );

        Ok(Self {
            session_id,
            groups,
            state: SessionState::Active(Position::new(start_group_index, 0)),
        })
    }

    pub fn advance(&mut self) -> Transition {
        let SessionState::Active(from) = self.state else {
            return Transition::Unchanged;
        };

        let group = &self.groups[from.group_index];
        let to = if from.story_index + 1 < group.len() {
            Position::new(from.group_index, from.story_index + 1)
        } else if from.group_index + 1 < self.groups.len() {
            Position::new(from.group_index + 1, 0)
        } else {
            self.state = SessionState::Exhausted;
            tracing::info!("Story session {} exhausted", self.session_id);
            return Transition::Exhausted;
        };

        self.state = SessionState::Active(to);
        tracing::debug!(
            "advance ({},{}) -> ({},{})",
            from.group_index,
            from.story_index,
            to.group_index,
            to.story_index
        );
        Transition::Moved { from, to }
    }

    pub fn retreat(&mut self) -> Transition {
        let SessionState::Active(from) = self.state else {
            return Transition::Unchanged;
        };

        let to = if from.story_index > 0 {
            Position::new(from.group_index, from.story_index - 1)
        } else if from.group_index > 0 {
            // Lands on the end of the previous user's stories, not its start
            let previous = from.group_index - 1;
            let last = self.groups[previous].last_index().unwrap_or(0);
            Position::new(previous, last)
        } else {
            return Transition::Unchanged;
        };

        self.state = SessionState::Active(to);
        tracing::debug!(
            "retreat ({},{}) -> ({},{})",
            from.group_index,
            from.story_index,
            to.group_index,
            to.story_index
        );
        Transition::Moved { from, to }
    }

    pub fn current_story(&self) -> Option<(&UserStoryGroup, &Story)> {
        let position = self.position()?;
        let group = &self.groups[position.group_index];
        Some((group, &group.stories[position.story_index]))
    }

    pub(crate) fn current_story_mut(&mut self) -> Option<&mut Story> {
        let position = self.position()?;
        Some(&mut self.groups[position.group_index].stories[position.story_index])
    }

    pub fn position(&self) -> Option<Position> {
        match self.state {
            SessionState::Active(position) => Some(position),
            SessionState::Exhausted => None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == SessionState::Exhausted
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn groups(&self) -> &[UserStoryGroup] {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn group(user: &str, count: usize) -> UserStoryGroup {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let stories = (0..count)
            .map(|i| {
                Story::new(
                    user,
                    base + Duration::minutes(i as i64),
                    format!("https://cdn.example.com/{}/{}.jpg", user, i),
                    "image/jpeg",
                )
            })
            .collect();
        UserStoryGroup::new(user, user, None, stories)
    }

    fn sequencer(sizes: &[usize], start: usize) -> StorySequencer {
        let groups = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| group(&format!("user{}", i), n))
            .collect();
        StorySequencer::initialize(groups, start).unwrap()
    }

    #[test]
    fn rejects_invalid_sessions() {
        assert_eq!(
            StorySequencer::initialize(Vec::new(), 0).err(),
            Some(InvalidSessionError::NoGroups)
        );
        assert_eq!(
            StorySequencer::initialize(vec![group("a", 1)], 1).err(),
            Some(InvalidSessionError::StartIndexOutOfRange { index: 1, len: 1 })
        );
        assert_eq!(
            StorySequencer::initialize(vec![group("a", 1), group("b", 0)], 0).err(),
            Some(InvalidSessionError::EmptyGroup("b".to_string()))
        );
    }

    #[test]
    fn starts_at_first_story_of_start_group() {
        let seq = sequencer(&[2, 3], 1);
        assert_eq!(seq.position(), Some(Position::new(1, 0)));
        let (group, story) = seq.current_story().unwrap();
        assert_eq!(group.user_id, "user1");
        assert_eq!(story.media_url, "https://cdn.example.com/user1/0.jpg");
    }

    #[test]
    fn advance_walks_group_then_moves_on() {
        let mut seq = sequencer(&[4, 1], 0);
        for expected in 1..4 {
            assert!(matches!(seq.advance(), Transition::Moved { .. }));
            assert_eq!(seq.position(), Some(Position::new(0, expected)));
        }
        assert_eq!(
            seq.advance(),
            Transition::Moved {
                from: Position::new(0, 3),
                to: Position::new(1, 0)
            }
        );
    }

    #[test]
    fn retreat_into_previous_group_lands_on_its_last_story() {
        let mut seq = sequencer(&[3, 2], 1);
        assert_eq!(
            seq.retreat(),
            Transition::Moved {
                from: Position::new(1, 0),
                to: Position::new(0, 2)
            }
        );
    }

    #[test]
    fn retreat_at_session_start_is_noop() {
        let mut seq = sequencer(&[2, 2], 0);
        assert_eq!(seq.retreat(), Transition::Unchanged);
        assert_eq!(seq.position(), Some(Position::new(0, 0)));
    }

    #[test]
    fn exhaustion_is_terminal_and_signalled_once() {
        let mut seq = sequencer(&[1], 0);
        assert_eq!(seq.advance(), Transition::Exhausted);
        assert!(seq.is_exhausted());
        assert!(seq.current_story().is_none());
        assert_eq!(seq.advance(), Transition::Unchanged);
        assert_eq!(seq.retreat(), Transition::Unchanged);
        assert!(seq.is_exhausted());
    }

    #[test]
    fn two_users_three_stories_scenario() {
        let mut seq = sequencer(&[2, 1], 0);
        seq.advance();
        assert_eq!(seq.position(), Some(Position::new(0, 1)));
        seq.advance();
        assert_eq!(seq.position(), Some(Position::new(1, 0)));
        assert_eq!(seq.advance(), Transition::Exhausted);
    }
}
