use serde::Serialize;

/// One bar of the progress row at the top of the story surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentProgress {
    pub story_index: usize,
    pub status: SegmentStatus,
    pub fraction: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentStatus {
    Seen,
    Active,
    Upcoming,
}

/// Bars for the active group. Stories before the active one render full even if they
/// were skipped part-way.
pub fn group_segments(
    story_count: usize,
    active_index: usize,
    fraction: f32,
) -> Vec<SegmentProgress> {
    (0..story_count)
        .map(|story_index| {
            let (status, fraction) = if story_index < active_index {
                (SegmentStatus::Seen, 1.0)
            } else if story_index == active_index {
                (SegmentStatus::Active, fraction.clamp(0.0, 1.0))
            } else {
                (SegmentStatus::Upcoming, 0.0)
            };
            SegmentProgress {
                story_index,
                status,
                fraction,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_story_renders_as_seen() {
        let bars = group_segments(3, 2, 0.4);
        assert_eq!(bars[0].status, SegmentStatus::Seen);
        assert_eq!(bars[1].fraction, 1.0);
        assert_eq!(bars[2].status, SegmentStatus::Active);
        assert_eq!(bars[2].fraction, 0.4);
    }

    #[test]
    fn later_stories_are_empty() {
        let bars = group_segments(3, 0, 0.0);
        assert_eq!(bars[1].status, SegmentStatus::Upcoming);
        assert_eq!(bars[2].fraction, 0.0);
    }
}
