use serde::{Deserialize, Serialize};

pub const DEFAULT_LONG_PRESS_MS: u64 = 400;
pub const DEFAULT_TOUCH_SLOP: f32 = 8.0;
pub const DEFAULT_DISMISS_THRESHOLD: f32 = 200.0;
pub const DEFAULT_DISMISS_VELOCITY: f32 = 1500.0;
const DRAG_SCALE_FACTOR: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surface {
    pub width: f32,
    pub height: f32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            width: 1080.0,
            height: 1920.0,
        }
    }
}

/// Raw pointer input over the story surface, timestamps in ms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PointerEvent {
    #[serde(rename_all = "camelCase")]
    Down { x: f32, y: f32, at_ms: u64 },
    #[serde(rename_all = "camelCase")]
    Move { x: f32, y: f32, at_ms: u64 },
    #[serde(rename_all = "camelCase")]
    Up { x: f32, y: f32, at_ms: u64 },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureCommand {
    Retreat,
    Advance,
    Pause,
    Resume,
    Drag { offset: f32, scale: f32 },
    SnapBack,
    Dismiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GestureConfig {
    pub long_press_ms: u64,
    pub touch_slop: f32,
    /// Downward drag distance that dismisses on release
    pub dismiss_threshold: f32,
    /// Downward release speed in px/s that dismisses regardless of distance
    pub dismiss_velocity: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            touch_slop: DEFAULT_TOUCH_SLOP,
            dismiss_threshold: DEFAULT_DISMISS_THRESHOLD,
            dismiss_velocity: DEFAULT_DISMISS_VELOCITY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Pressed {
        press_id: u64,
        origin_x: f32,
        origin_y: f32,
        down_at: u64,
    },
    Holding,
    Dragging {
        origin_y: f32,
        last_y: f32,
        last_at: u64,
        velocity: f32,
    },
    /// Moved off a tap without becoming a drag; swallows the rest of the stream
    Ignored,
}

/// Turns pointer streams into sequencer/driver commands. Only one gesture is recognized
/// per stream, so a drag never also counts as a tap.
pub struct GestureInterpreter {
    config: GestureConfig,
    surface: Surface,
    phase: Phase,
    next_press_id: u64,
    dismissed: bool,
}

impl GestureInterpreter {
    pub fn new(config: GestureConfig, surface: Surface) -> Self {
        Self {
            config,
            surface,
            phase: Phase::Idle,
            next_press_id: 0,
            dismissed: false,
        }
    }

    pub fn resize(&mut self, surface: Surface) {
        self.surface = surface;
    }

    /// Id of the press waiting for the long-press timeout, if any
    pub fn armed_press(&self) -> Option<u64> {
        match self.phase {
            Phase::Pressed { press_id, .. } => Some(press_id),
            _ => None,
        }
    }

    pub fn on_pointer(&mut self, event: PointerEvent) -> Vec<GestureCommand> {
        if self.dismissed {
            return Vec::new();
        }

        match event {
            PointerEvent::Down { x, y, at_ms } => {
                // A press that never saw its release (second finger, lost Up) is closed out first
                let unwound = match self.phase {
                    Phase::Holding => vec![GestureCommand::Resume],
                    Phase::Dragging { .. } => vec![GestureCommand::SnapBack],
                    _ => Vec::new(),
                };
                let press_id = self.next_press_id;
                self.next_press_id += 1;
                self.phase = Phase::Pressed {
                    press_id,
                    origin_x: x,
                    origin_y: y,
                    down_at: at_ms,
                };
                unwound
            }
            PointerEvent::Move { x, y, at_ms } => self.on_move(x, y, at_ms),
            PointerEvent::Up { y, at_ms, .. } => self.on_up(y, at_ms),
            PointerEvent::Cancel => {
                let phase = std::mem::replace(&mut self.phase, Phase::Idle);
                match phase {
                    Phase::Holding => vec![GestureCommand::Resume],
                    Phase::Dragging { .. } => vec![GestureCommand::SnapBack],
                    _ => Vec::new(),
                }
            }
        }
    }

    /// Long-press timer fired for `press_id`.
    pub fn hold_elapsed(&mut self, press_id: u64) -> Option<GestureCommand> {
        match self.phase {
            Phase::Pressed { press_id: armed, .. } if armed == press_id && !self.dismissed => {
                tracing::debug!("gesture: press {} became a hold", press_id);
                self.phase = Phase::Holding;
                Some(GestureCommand::Pause)
            }
            _ => None,
        }
    }

    fn on_move(&mut self, x: f32, y: f32, at_ms: u64) -> Vec<GestureCommand> {
        match self.phase {
            Phase::Pressed {
                origin_x, origin_y, ..
            } => {
                let dx = x - origin_x;
                let dy = y - origin_y;
                if dx.abs() <= self.config.touch_slop && dy.abs() <= self.config.touch_slop {
                    return Vec::new();
                }

                if dy > self.config.touch_slop && dy.abs() >= dx.abs() {
                    tracing::debug!("gesture: drag started");
                    self.phase = Phase::Dragging {
                        origin_y,
                        last_y: y,
                        last_at: at_ms,
                        velocity: 0.0,
                    };
                    vec![self.drag_command(dy)]
                } else {
                    self.phase = Phase::Ignored;
                    Vec::new()
                }
            }
            Phase::Dragging {
                origin_y,
                last_y,
                last_at,
                velocity,
                ..
            } => {
                let offset = (y - origin_y).max(0.0);
                let elapsed_ms = at_ms.saturating_sub(last_at);
                let velocity = if elapsed_ms == 0 {
                    velocity
                } else {
                    (y - last_y) / elapsed_ms as f32 * 1000.0
                };
                self.phase = Phase::Dragging {
                    origin_y,
                    last_y: y,
                    last_at: at_ms,
                    velocity,
                };
                vec![self.drag_command(offset)]
            }
            _ => Vec::new(),
        }
    }

    fn on_up(&mut self, y: f32, at_ms: u64) -> Vec<GestureCommand> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        match phase {
            Phase::Pressed {
                origin_x, down_at, ..
            } => {
                if at_ms.saturating_sub(down_at) >= self.config.long_press_ms {
                    // Held past the timeout before the timer was delivered; not a tap
                    return Vec::new();
                }
                if self.is_left_zone(origin_x) {
                    vec![GestureCommand::Retreat]
                } else {
                    vec![GestureCommand::Advance]
                }
            }
            Phase::Holding => vec![GestureCommand::Resume],
            Phase::Dragging {
                origin_y,
                last_y,
                last_at,
                velocity,
                ..
            } => {
                let offset = (y - origin_y).max(0.0);
                let elapsed_ms = at_ms.saturating_sub(last_at);
                let velocity = if elapsed_ms == 0 {
                    velocity
                } else {
                    (y - last_y) / elapsed_ms as f32 * 1000.0
                };

                if offset >= self.config.dismiss_threshold
                    || velocity >= self.config.dismiss_velocity
                {
                    tracing::info!(
                        "gesture: drag dismiss (offset={:.0}, velocity={:.0})",
                        offset,
                        velocity
                    );
                    self.dismissed = true;
                    vec![GestureCommand::Dismiss]
                } else {
                    vec![GestureCommand::SnapBack]
                }
            }
            Phase::Idle | Phase::Ignored => Vec::new(),
        }
    }

    /// Left half is `x < width / 2`; the midline belongs to the right half.
    fn is_left_zone(&self, x: f32) -> bool {
        x < self.surface.width / 2.0
    }

    fn drag_command(&self, offset: f32) -> GestureCommand {
        let height = self.surface.height.max(1.0);
        let scale = 1.0 - (offset / height).min(1.0) * DRAG_SCALE_FACTOR;
        GestureCommand::Drag { offset, scale }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> GestureInterpreter {
        GestureInterpreter::new(
            GestureConfig::default(),
            Surface {
                width: 1000.0,
                height: 2000.0,
            },
        )
    }

    fn tap(gestures: &mut GestureInterpreter, x: f32) -> Vec<GestureCommand> {
        gestures.on_pointer(PointerEvent::Down {
            x,
            y: 500.0,
            at_ms: 0,
        });
        gestures.on_pointer(PointerEvent::Up {
            x,
            y: 500.0,
            at_ms: 80,
        })
    }

    #[test]
    fn tap_zones() {
        let mut gestures = interpreter();
        assert_eq!(tap(&mut gestures, 100.0), vec![GestureCommand::Retreat]);
        assert_eq!(tap(&mut gestures, 900.0), vec![GestureCommand::Advance]);
    }

    #[test]
    fn midline_tap_advances() {
        let mut gestures = interpreter();
        assert_eq!(tap(&mut gestures, 500.0), vec![GestureCommand::Advance]);
        assert_eq!(tap(&mut gestures, 499.9), vec![GestureCommand::Retreat]);
    }

    #[test]
    fn hold_pauses_and_release_resumes() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 700.0,
            y: 500.0,
            at_ms: 0,
        });
        let press = gestures.armed_press().unwrap();

        assert_eq!(gestures.hold_elapsed(press), Some(GestureCommand::Pause));
        assert_eq!(gestures.hold_elapsed(press), None);
        assert_eq!(
            gestures.on_pointer(PointerEvent::Up {
                x: 700.0,
                y: 500.0,
                at_ms: 900,
            }),
            vec![GestureCommand::Resume]
        );
    }

    #[test]
    fn stale_hold_timer_is_ignored() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 700.0,
            y: 500.0,
            at_ms: 0,
        });
        let first = gestures.armed_press().unwrap();
        gestures.on_pointer(PointerEvent::Up {
            x: 700.0,
            y: 500.0,
            at_ms: 50,
        });
        gestures.on_pointer(PointerEvent::Down {
            x: 700.0,
            y: 500.0,
            at_ms: 100,
        });

        assert_eq!(gestures.hold_elapsed(first), None);
    }

    #[test]
    fn short_drag_snaps_back_without_tap() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 700.0,
            y: 500.0,
            at_ms: 0,
        });
        let drag = gestures.on_pointer(PointerEvent::Move {
            x: 700.0,
            y: 560.0,
            at_ms: 100,
        });
        assert!(matches!(
            drag.as_slice(),
            [GestureCommand::Drag { offset, .. }] if *offset == 60.0
        ));

        gestures.on_pointer(PointerEvent::Move {
            x: 700.0,
            y: 600.0,
            at_ms: 400,
        });
        let release = gestures.on_pointer(PointerEvent::Up {
            x: 700.0,
            y: 600.0,
            at_ms: 600,
        });
        assert_eq!(release, vec![GestureCommand::SnapBack]);
    }

    #[test]
    fn long_drag_dismisses_once() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 300.0,
            y: 200.0,
            at_ms: 0,
        });
        gestures.on_pointer(PointerEvent::Move {
            x: 300.0,
            y: 350.0,
            at_ms: 200,
        });
        gestures.on_pointer(PointerEvent::Move {
            x: 300.0,
            y: 450.0,
            at_ms: 400,
        });
        let release = gestures.on_pointer(PointerEvent::Up {
            x: 300.0,
            y: 450.0,
            at_ms: 500,
        });
        assert_eq!(release, vec![GestureCommand::Dismiss]);

        assert!(tap(&mut gestures, 900.0).is_empty());
    }

    #[test]
    fn fast_fling_dismisses_below_threshold() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 300.0,
            y: 200.0,
            at_ms: 0,
        });
        gestures.on_pointer(PointerEvent::Move {
            x: 300.0,
            y: 240.0,
            at_ms: 10,
        });
        let release = gestures.on_pointer(PointerEvent::Up {
            x: 300.0,
            y: 300.0,
            at_ms: 30,
        });
        assert_eq!(release, vec![GestureCommand::Dismiss]);
    }

    #[test]
    fn drag_scale_shrinks_with_offset() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 300.0,
            y: 0.0,
            at_ms: 0,
        });
        let commands = gestures.on_pointer(PointerEvent::Move {
            x: 300.0,
            y: 1000.0,
            at_ms: 100,
        });
        assert_eq!(
            commands,
            vec![GestureCommand::Drag {
                offset: 1000.0,
                scale: 0.875
            }]
        );
    }

    #[test]
    fn horizontal_swipe_is_not_a_tap() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 300.0,
            y: 500.0,
            at_ms: 0,
        });
        gestures.on_pointer(PointerEvent::Move {
            x: 500.0,
            y: 505.0,
            at_ms: 50,
        });
        assert!(gestures
            .on_pointer(PointerEvent::Up {
                x: 500.0,
                y: 505.0,
                at_ms: 90,
            })
            .is_empty());
    }

    #[test]
    fn cancel_resumes_a_hold() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 300.0,
            y: 500.0,
            at_ms: 0,
        });
        let press = gestures.armed_press().unwrap();
        gestures.hold_elapsed(press);
        assert_eq!(
            gestures.on_pointer(PointerEvent::Cancel),
            vec![GestureCommand::Resume]
        );
    }

    #[test]
    fn cancel_snaps_back_a_drag() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 300.0,
            y: 200.0,
            at_ms: 0,
        });
        gestures.on_pointer(PointerEvent::Move {
            x: 300.0,
            y: 260.0,
            at_ms: 100,
        });
        assert_eq!(
            gestures.on_pointer(PointerEvent::Cancel),
            vec![GestureCommand::SnapBack]
        );
        assert_eq!(tap(&mut gestures, 900.0), vec![GestureCommand::Advance]);
    }

    #[test]
    fn second_press_during_hold_resumes_first() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 700.0,
            y: 500.0,
            at_ms: 0,
        });
        let press = gestures.armed_press().unwrap();
        assert_eq!(gestures.hold_elapsed(press), Some(GestureCommand::Pause));

        assert_eq!(
            gestures.on_pointer(PointerEvent::Down {
                x: 200.0,
                y: 500.0,
                at_ms: 600,
            }),
            vec![GestureCommand::Resume]
        );
        // The new press turns into a swipe and emits nothing more
        gestures.on_pointer(PointerEvent::Move {
            x: 400.0,
            y: 505.0,
            at_ms: 650,
        });
        assert!(gestures
            .on_pointer(PointerEvent::Up {
                x: 400.0,
                y: 505.0,
                at_ms: 700,
            })
            .is_empty());
    }

    #[test]
    fn second_press_during_drag_snaps_back_first() {
        let mut gestures = interpreter();
        gestures.on_pointer(PointerEvent::Down {
            x: 300.0,
            y: 200.0,
            at_ms: 0,
        });
        gestures.on_pointer(PointerEvent::Move {
            x: 300.0,
            y: 300.0,
            at_ms: 100,
        });

        assert_eq!(
            gestures.on_pointer(PointerEvent::Down {
                x: 800.0,
                y: 900.0,
                at_ms: 300,
            }),
            vec![GestureCommand::SnapBack]
        );
        assert_eq!(
            gestures.on_pointer(PointerEvent::Up {
                x: 800.0,
                y: 900.0,
                at_ms: 350,
            }),
            vec![GestureCommand::Advance]
        );
    }

    #[test]
    fn parses_host_pointer_json() {
        let event: PointerEvent =
            serde_json::from_str(r#"{"kind":"down","x":10.0,"y":20.0,"atMs":5}"#).unwrap();
        assert_eq!(
            event,
            PointerEvent::Down {
                x: 10.0,
                y: 20.0,
                at_ms: 5
            }
        );
    }
}
