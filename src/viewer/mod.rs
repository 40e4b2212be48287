use crate::config::PlaybackConfig;
use crate::gesture::{GestureCommand, GestureConfig, GestureInterpreter, PointerEvent, Surface};
use crate::media::MediaLoader;
use crate::session::{
    segment::group_segments, InvalidSessionError, ProgressDriver, StoryKey, StorySequencer,
    TickOutcome, Transition,
};
use crate::story::FeedSelection;
use crate::tracking::{TrackOutcome, ViewRecorder, ViewTracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;

mod events;

pub use events::{DismissReason, SessionSummary, ViewerEvent, ViewerSnapshot};

const EVENT_CAPACITY: usize = 256;

/// Collaborators and tuning for one viewing session
pub struct ViewerDeps {
    pub viewer_id: String,
    pub recorder: Arc<dyn ViewRecorder>,
    pub media: Arc<dyn MediaLoader>,
    pub playback: PlaybackConfig,
    pub gestures: GestureConfig,
    pub surface: Surface,
}

enum Command {
    Pointer(PointerEvent),
    HoldElapsed(u64),
    Resize(Surface),
    Advance,
    Retreat,
    Pause,
    Resume,
    MediaReady(StoryKey),
    MediaUnready(StoryKey),
    MediaFailed(StoryKey),
    Tick(StoryKey),
    Snapshot(oneshot::Sender<ViewerSnapshot>),
    Close,
}

type DismissCallback = Box<dyn FnOnce(DismissReason) + Send>;

/// Single owner of a viewing session. Gestures, timer ticks and media completions all
/// arrive as messages on one queue, so transitions never interleave.
pub struct StoryViewer {
    sequencer: StorySequencer,
    driver: ProgressDriver,
    gestures: GestureInterpreter,
    tracker: ViewTracker,
    media: Arc<dyn MediaLoader>,
    playback: PlaybackConfig,
    long_press: Duration,
    events: broadcast::Sender<ViewerEvent>,
    // Set by `spawn`. Background tasks only hold weak senders, so dropping the handle
    // ends the session.
    commands_tx: Option<mpsc::WeakUnboundedSender<Command>>,
    tick_task: Option<JoinHandle<()>>,
    media_task: Option<JoinHandle<()>>,
    hold_task: Option<JoinHandle<()>>,
    on_dismiss: Option<DismissCallback>,
    stories_shown: usize,
}

impl StoryViewer {
    pub fn new(selection: FeedSelection, deps: ViewerDeps) -> Result<Self, InvalidSessionError> {
        let sequencer = StorySequencer::initialize(selection.groups, selection.start_group_index)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            sequencer,
            driver: ProgressDriver::new(
                deps.playback.story_duration(),
                deps.playback.tick_interval(),
            ),
            gestures: GestureInterpreter::new(deps.gestures, deps.surface),
            tracker: ViewTracker::new(deps.viewer_id, deps.recorder),
            media: deps.media,
            playback: deps.playback,
            long_press: Duration::from_millis(deps.gestures.long_press_ms),
            events,
            commands_tx: None,
            tick_task: None,
            media_task: None,
            hold_task: None,
            on_dismiss: None,
            stories_shown: 0,
        })
    }

    /// Invoked once when the session ends, whatever the reason.
    pub fn on_dismiss(mut self, callback: impl FnOnce(DismissReason) + Send + 'static) -> Self {
        self.on_dismiss = Some(Box::new(callback));
        self
    }

    /// Subscribe before `spawn` to see the first `StoryChanged`.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.events.subscribe()
    }

    pub fn spawn(mut self) -> StoryViewerHandle {
        let (commands, receiver) = mpsc::unbounded_channel();
        self.commands_tx = Some(commands.downgrade());
        let events = self.events.clone();
        let session_id = self.sequencer.session_id().to_string();
        let task = tokio::spawn(self.run(receiver));

        StoryViewerHandle {
            session_id,
            commands,
            events,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> SessionSummary {
        self.activate_current();

        let reason = loop {
            let Some(command) = commands.recv().await else {
                break DismissReason::Closed;
            };
            if let Some(reason) = self.handle(command) {
                break reason;
            }
        };

        self.finish(reason).await
    }

    fn handle(&mut self, command: Command) -> Option<DismissReason> {
        match command {
            Command::Pointer(event) => {
                let commands = self.gestures.on_pointer(event);
                match event {
                    PointerEvent::Down { .. } => self.arm_hold(),
                    PointerEvent::Up { .. } | PointerEvent::Cancel => abort(&mut self.hold_task),
                    PointerEvent::Move { .. } => {
                        if self.gestures.armed_press().is_none() {
                            abort(&mut self.hold_task);
                        }
                    }
                }
                for gesture in commands {
                    if let Some(reason) = self.apply_gesture(gesture) {
                        return Some(reason);
                    }
                }
                None
            }
            Command::HoldElapsed(press_id) => {
                let gesture = self.gestures.hold_elapsed(press_id)?;
                self.apply_gesture(gesture)
            }
            Command::Resize(surface) => {
                self.gestures.resize(surface);
                None
            }
            Command::Advance => {
                let transition = self.sequencer.advance();
                self.apply_transition(transition)
            }
            Command::Retreat => {
                let transition = self.sequencer.retreat();
                self.apply_transition(transition)
            }
            Command::Pause => {
                self.pause();
                None
            }
            Command::Resume => {
                self.resume();
                None
            }
            Command::MediaReady(key) => {
                if self.driver.on_external_ready(key) {
                    self.emit(ViewerEvent::Loading {
                        key,
                        visible: false,
                    });
                }
                None
            }
            Command::MediaUnready(key) => {
                if self.driver.on_external_not_ready(key) {
                    self.emit(ViewerEvent::Loading { key, visible: true });
                }
                None
            }
            Command::MediaFailed(key) => {
                // Bar stays stalled until a gesture moves on
                if self.driver.current_key() == Some(key) {
                    tracing::warn!(
                        "Media for story ({},{}) failed to load; progress stalled",
                        key.group_index,
                        key.story_index
                    );
                }
                None
            }
            Command::Tick(key) => match self.driver.tick(key) {
                TickOutcome::Ignored => None,
                TickOutcome::Progressed(fraction) => {
                    self.emit(ViewerEvent::Progress { key, fraction });
                    None
                }
                TickOutcome::Completed => {
                    self.emit(ViewerEvent::Progress { key, fraction: 1.0 });
                    abort(&mut self.tick_task);
                    let transition = self.sequencer.advance();
                    self.apply_transition(transition)
                }
            },
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
                None
            }
            Command::Close => Some(DismissReason::Closed),
        }
    }

    fn apply_gesture(&mut self, gesture: GestureCommand) -> Option<DismissReason> {
        tracing::debug!("gesture: {:?}", gesture);
        match gesture {
            GestureCommand::Retreat => {
                let transition = self.sequencer.retreat();
                self.apply_transition(transition)
            }
            GestureCommand::Advance => {
                let transition = self.sequencer.advance();
                self.apply_transition(transition)
            }
            GestureCommand::Pause => {
                self.pause();
                None
            }
            GestureCommand::Resume => {
                self.resume();
                None
            }
            GestureCommand::Drag { offset, scale } => {
                self.emit(ViewerEvent::Drag { offset, scale });
                None
            }
            GestureCommand::SnapBack => {
                self.emit(ViewerEvent::SnapBack);
                None
            }
            GestureCommand::Dismiss => Some(DismissReason::DragDismissed),
        }
    }

    fn apply_transition(&mut self, transition: Transition) -> Option<DismissReason> {
        match transition {
            Transition::Moved { .. } => {
                self.activate_current();
                None
            }
            Transition::Unchanged => None,
            Transition::Exhausted => Some(DismissReason::Exhausted),
        }
    }

    /// Restarts the driver, media load and view tracking for the story under the cursor.
    fn activate_current(&mut self) {
        let Some(position) = self.sequencer.position() else {
            return;
        };

        abort(&mut self.tick_task);
        abort(&mut self.media_task);

        let key = self.driver.start(position);
        self.stories_shown += 1;

        if let Some(story) = self.sequencer.current_story_mut() {
            if self.tracker.observe(story) == TrackOutcome::Issued {
                tracing::debug!(
                    "Recording view of story ({},{})",
                    position.group_index,
                    position.story_index
                );
            }
        }

        let Some((group, story)) = self.sequencer.current_story() else {
            return;
        };
        let event = ViewerEvent::StoryChanged {
            session_id: self.sequencer.session_id().to_string(),
            key,
            user_id: group.user_id.clone(),
            username: group.username.clone(),
            profile_image_url: group.profile_image_url.clone(),
            media_url: story.media_url.clone(),
            mime_type: story.mime_type.clone(),
            view_count: story.view_count(),
            segments: group_segments(group.len(), position.story_index, 0.0),
        };
        let url = story.media_url.clone();
        let mime_type = story.mime_type.clone();

        tracing::info!(
            "Showing story ({},{}) of {}",
            position.group_index,
            position.story_index,
            group.user_id
        );

        self.emit(event);
        self.emit(ViewerEvent::Loading { key, visible: true });

        let Some(commands) = self.commands_tx.clone() else {
            return;
        };

        let loader = self.media.clone();
        let tx = commands.clone();
        self.media_task = Some(tokio::spawn(async move {
            match loader.load(&url, &mime_type).await {
                Ok(info) => {
                    tracing::debug!("Media ready via {}: {} bytes", loader.name(), info.bytes);
                    send_weak(&tx, Command::MediaReady(key));
                }
                Err(e) => {
                    tracing::warn!("Media load via {} failed for {}: {}", loader.name(), url, e);
                    send_weak(&tx, Command::MediaFailed(key));
                }
            }
        }));

        let tx = commands;
        let startup_delay = self.playback.startup_delay();
        let interval = self.playback.tick_interval();
        self.tick_task = Some(tokio::spawn(async move {
            sleep(startup_delay).await;
            loop {
                if !send_weak(&tx, Command::Tick(key)) {
                    break;
                }
                sleep(interval).await;
            }
        }));
    }

    fn arm_hold(&mut self) {
        abort(&mut self.hold_task);
        let (Some(press_id), Some(tx)) = (self.gestures.armed_press(), self.commands_tx.clone())
        else {
            return;
        };
        let delay = self.long_press;
        self.hold_task = Some(tokio::spawn(async move {
            sleep(delay).await;
            send_weak(&tx, Command::HoldElapsed(press_id));
        }));
    }

    fn pause(&mut self) {
        self.driver.pause();
        self.emit(ViewerEvent::Paused);
    }

    fn resume(&mut self) {
        self.driver.resume();
        self.emit(ViewerEvent::Resumed);
    }

    fn snapshot(&self) -> ViewerSnapshot {
        let progress = self.driver.state();
        let current = self.sequencer.current_story();
        let position = self.sequencer.position();

        ViewerSnapshot {
            session_id: self.sequencer.session_id().to_string(),
            position,
            key: self.driver.current_key(),
            user_id: current.map(|(group, _)| group.user_id.clone()),
            media_url: current.map(|(_, story)| story.media_url.clone()),
            viewer_ids: current
                .map(|(_, story)| story.viewer_ids.iter().cloned().collect())
                .unwrap_or_default(),
            progress,
            loading: position.is_some() && !self.driver.is_media_ready(),
            segments: match (current, position) {
                (Some((group, _)), Some(position)) => {
                    group_segments(group.len(), position.story_index, progress.fraction)
                }
                _ => Vec::new(),
            },
        }
    }

    async fn finish(mut self, reason: DismissReason) -> SessionSummary {
        abort(&mut self.tick_task);
        abort(&mut self.media_task);
        abort(&mut self.hold_task);
        self.driver.stop();

        tracing::info!(
            "Story session {} ended: {:?} after {} stories",
            self.sequencer.session_id(),
            reason,
            self.stories_shown
        );

        self.emit(ViewerEvent::Dismissed { reason });
        if let Some(callback) = self.on_dismiss.take() {
            callback(reason);
        }

        // View records already in flight are allowed to land
        self.tracker.drain().await;
        let metrics = self.tracker.metrics();

        SessionSummary {
            session_id: self.sequencer.session_id().to_string(),
            reason,
            stories_shown: self.stories_shown,
            views_recorded: metrics.recorded(),
            views_failed: metrics.failed(),
        }
    }

    fn emit(&self, event: ViewerEvent) {
        let _ = self.events.send(event);
    }
}

fn send_weak(tx: &mpsc::WeakUnboundedSender<Command>, command: Command) -> bool {
    tx.upgrade()
        .map_or(false, |tx| tx.send(command).is_ok())
}

fn abort(task: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = task.take() {
        handle.abort();
    }
}

/// Host-side handle to a running session. Calls return false once the session has ended,
/// and dropping the handle closes the session.
pub struct StoryViewerHandle {
    session_id: String,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ViewerEvent>,
    task: JoinHandle<SessionSummary>,
}

impl StoryViewerHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.events.subscribe()
    }

    pub fn pointer(&self, event: PointerEvent) -> bool {
        self.send(Command::Pointer(event))
    }

    pub fn resize(&self, surface: Surface) -> bool {
        self.send(Command::Resize(surface))
    }

    pub fn advance(&self) -> bool {
        self.send(Command::Advance)
    }

    pub fn retreat(&self) -> bool {
        self.send(Command::Retreat)
    }

    pub fn pause(&self) -> bool {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(Command::Resume)
    }

    /// Host-rendered media finished loading (or buffering) for `key`.
    pub fn media_ready(&self, key: StoryKey) -> bool {
        self.send(Command::MediaReady(key))
    }

    /// Host media went back to loading, e.g. a video rebuffer.
    pub fn media_unready(&self, key: StoryKey) -> bool {
        self.send(Command::MediaUnready(key))
    }

    pub fn close(&self) -> bool {
        self.send(Command::Close)
    }

    pub async fn snapshot(&self) -> Option<ViewerSnapshot> {
        let (tx, rx) = oneshot::channel();
        if !self.send(Command::Snapshot(tx)) {
            return None;
        }
        rx.await.ok()
    }

    pub async fn join(self) -> Result<SessionSummary, JoinError> {
        self.task.await
    }

    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}
