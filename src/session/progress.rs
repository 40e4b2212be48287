use super::Position;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifies one activation of a story. The epoch changes on every `start`, so a loop
/// left over from an earlier visit to the same position never matches again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryKey {
    pub group_index: usize,
    pub story_index: usize,
    pub epoch: u64,
}

impl StoryKey {
    pub fn position(&self) -> Position {
        Position::new(self.group_index, self.story_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    /// Elapsed share of the story, 0.0..=1.0
    pub fraction: f32,
    pub is_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Ignored,
    Progressed(f32),
    /// Reached 1.0; returned once per key
    Completed,
}

/// Drives the per-story progress bar in whole ticks
pub struct ProgressDriver {
    current: Option<StoryKey>,
    next_epoch: u64,
    ticks_elapsed: u32,
    total_ticks: u32,
    is_running: bool,
    media_ready: bool,
    completed: bool,
}

impl ProgressDriver {
    pub fn new(story_duration: Duration, tick_interval: Duration) -> Self {
        let interval_ms = tick_interval.as_millis().max(1);
        let total_ticks = story_duration.as_millis().div_ceil(interval_ms).max(1);

        Self {
            current: None,
            next_epoch: 0,
            ticks_elapsed: 0,
            total_ticks: u32::try_from(total_ticks).unwrap_or(u32::MAX),
            is_running: false,
            media_ready: false,
            completed: false,
        }
    }

    pub fn start(&mut self, position: Position) -> StoryKey {
        let key = StoryKey {
            group_index: position.group_index,
            story_index: position.story_index,
            epoch: self.next_epoch,
        };
        self.next_epoch += 1;
        self.current = Some(key);
        self.ticks_elapsed = 0;
        self.is_running = true;
        self.media_ready = false;
        self.completed = false;
        key
    }

    pub fn stop(&mut self) {
        self.current = None;
        self.is_running = false;
    }

    pub fn pause(&mut self) {
        self.is_running = false;
    }

    pub fn resume(&mut self) {
        if self.current.is_some() {
            self.is_running = true;
        }
    }

    /// Returns false when the key belongs to a story that is no longer active.
    pub fn on_external_ready(&mut self, key: StoryKey) -> bool {
        if self.current != Some(key) {
            return false;
        }
        self.media_ready = true;
        true
    }

    pub fn on_external_not_ready(&mut self, key: StoryKey) -> bool {
        if self.current != Some(key) {
            return false;
        }
        self.media_ready = false;
        true
    }

    pub fn tick(&mut self, key: StoryKey) -> TickOutcome {
        if self.current != Some(key) || self.completed || !self.is_running || !self.media_ready {
            return TickOutcome::Ignored;
        }

        self.ticks_elapsed = (self.ticks_elapsed + 1).min(self.total_ticks);
        if self.ticks_elapsed == self.total_ticks {
            self.completed = true;
            self.is_running = false;
            return TickOutcome::Completed;
        }

        TickOutcome::Progressed(self.fraction())
    }

    pub fn fraction(&self) -> f32 {
        self.ticks_elapsed as f32 / self.total_ticks as f32
    }

    pub fn state(&self) -> ProgressState {
        ProgressState {
            fraction: self.fraction(),
            is_running: self.is_running,
        }
    }

    pub fn current_key(&self) -> Option<StoryKey> {
        self.current
    }

    pub fn is_media_ready(&self) -> bool {
        self.media_ready
    }

    pub fn total_ticks(&self) -> u32 {
        self.total_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> ProgressDriver {
        ProgressDriver::new(Duration::from_millis(2000), Duration::from_millis(100))
    }

    fn ready_driver(position: Position) -> (ProgressDriver, StoryKey) {
        let mut driver = driver();
        let key = driver.start(position);
        driver.on_external_ready(key);
        (driver, key)
    }

    #[test]
    fn default_timing_is_twenty_ticks() {
        assert_eq!(driver().total_ticks(), 20);
    }

    #[test]
    fn waits_for_media_before_progressing() {
        let mut driver = driver();
        let key = driver.start(Position::new(0, 0));
        assert_eq!(driver.tick(key), TickOutcome::Ignored);
        assert_eq!(driver.fraction(), 0.0);

        driver.on_external_ready(key);
        assert_eq!(driver.tick(key), TickOutcome::Progressed(0.05));

        driver.on_external_not_ready(key);
        assert_eq!(driver.tick(key), TickOutcome::Ignored);
        assert_eq!(driver.fraction(), 0.05);
    }

    #[test]
    fn completes_exactly_once() {
        let (mut driver, key) = ready_driver(Position::new(0, 0));
        let mut completions = 0;
        for _ in 0..25 {
            if driver.tick(key) == TickOutcome::Completed {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(driver.fraction(), 1.0);
    }

    #[test]
    fn stale_key_has_no_effect() {
        let mut driver = driver();
        let old = driver.start(Position::new(0, 0));
        driver.on_external_ready(old);
        driver.tick(old);

        let new = driver.start(Position::new(0, 1));
        driver.on_external_ready(new);
        assert_eq!(driver.tick(old), TickOutcome::Ignored);
        assert!(!driver.on_external_ready(old));
        assert_eq!(driver.fraction(), 0.0);
    }

    #[test]
    fn revisiting_a_position_gets_a_fresh_key() {
        let mut driver = driver();
        let first = driver.start(Position::new(0, 1));
        driver.start(Position::new(0, 0));
        let second = driver.start(Position::new(0, 1));
        assert_ne!(first, second);
        driver.on_external_ready(second);
        assert_eq!(driver.tick(first), TickOutcome::Ignored);
    }

    #[test]
    fn pause_retains_fraction() {
        let (mut driver, key) = ready_driver(Position::new(1, 0));
        for _ in 0..7 {
            driver.tick(key);
        }
        let before = driver.fraction();

        driver.pause();
        assert!(!driver.state().is_running);
        assert_eq!(driver.tick(key), TickOutcome::Ignored);
        driver.resume();

        assert_eq!(driver.fraction(), before);
        assert!(driver.state().is_running);
    }

    #[test]
    fn start_resets_progress() {
        let (mut driver, key) = ready_driver(Position::new(0, 0));
        driver.tick(key);
        driver.tick(key);
        driver.start(Position::new(0, 1));
        assert_eq!(driver.fraction(), 0.0);
        assert!(!driver.is_media_ready());
    }

    #[test]
    fn uneven_duration_rounds_up() {
        let driver = ProgressDriver::new(Duration::from_millis(250), Duration::from_millis(100));
        assert_eq!(driver.total_ticks(), 3);
    }
}
