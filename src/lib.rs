pub mod config;
pub mod gesture;
pub mod media;
pub mod session;
pub mod story;
pub mod tracking;
pub mod viewer;

use clap::Parser;
use config::AppConfig;
use gesture::{PointerEvent, Surface};
use media::{HttpMediaLoader, ImmediateMediaLoader, MediaLoader};
use serde::Deserialize;
use session::StoryKey;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use story::{FeedProvider, JsonFeedProvider};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracking::{InMemoryViewRecorder, RestViewRecorder, ViewRecorder};
use viewer::{StoryViewer, StoryViewerHandle, ViewerDeps, ViewerEvent};

pub use session::{InvalidSessionError, Position, StorySequencer, Transition};
pub use story::{FeedSelection, Story, UserStoryGroup};
pub use viewer::{DismissReason, SessionSummary, ViewerSnapshot};

#[derive(Debug, Parser)]
#[command(name = "story-viewer")]
#[command(about = "Headless story viewer: JSON-lines commands on stdin, events on stdout")]
#[command(version)]
pub struct Cli {
    /// Feed document ({"groups": [...], "following": [...]})
    pub feed: Option<PathBuf>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Open the session at this user's stories
    #[arg(long)]
    pub start_user: Option<String>,
}

/// One line of host input
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostCommand {
    Pointer { event: PointerEvent },
    Resize { surface: Surface },
    Advance,
    Retreat,
    Pause,
    Resume,
    MediaReady { key: StoryKey },
    MediaUnready { key: StoryKey },
    Close,
}

impl HostCommand {
    /// Forwards to the session. Returns false once the session has ended.
    pub fn dispatch(self, handle: &StoryViewerHandle) -> bool {
        match self {
            HostCommand::Pointer { event } => handle.pointer(event),
            HostCommand::Resize { surface } => handle.resize(surface),
            HostCommand::Advance => handle.advance(),
            HostCommand::Retreat => handle.retreat(),
            HostCommand::Pause => handle.pause(),
            HostCommand::Resume => handle.resume(),
            HostCommand::MediaReady { key } => handle.media_ready(key),
            HostCommand::MediaUnready { key } => handle.media_unready(key),
            HostCommand::Close => handle.close(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the event stream
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn build_recorder(config: &AppConfig) -> Arc<dyn ViewRecorder> {
    if let Some(base_url) = config.backend.base_url.as_deref() {
        let token = config::decode_api_token(config);
        if let Some(token) = token.as_deref() {
            tracing::info!("Using backend token {}", config::mask_token(token));
        }

        match RestViewRecorder::new(
            base_url,
            token,
            Some(Duration::from_secs(config.backend.timeout_secs)),
        ) {
            Ok(recorder) => return Arc::new(recorder),
            Err(e) => tracing::warn!("REST view recorder unavailable, keeping views local: {}", e),
        }
    }

    Arc::new(InMemoryViewRecorder::new())
}

fn build_media_loader(config: &AppConfig) -> Arc<dyn MediaLoader> {
    if config.media.prefetch {
        match HttpMediaLoader::new(Some(Duration::from_secs(config.media.timeout_secs))) {
            Ok(loader) => return Arc::new(loader),
            Err(e) => tracing::warn!("HTTP media loader unavailable: {}", e),
        }
    }

    Arc::new(ImmediateMediaLoader)
}

async fn print_events(mut events: broadcast::Receiver<ViewerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!("Failed to encode event: {}", e),
                }
                if matches!(event, ViewerEvent::Dismissed { .. }) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event output lagged, {} events dropped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Reads host lines on a plain thread. A blocked read never holds up runtime shutdown once the
/// session is over.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Feeds host lines into the session until it ends or input closes, then waits for the summary.
async fn drive_session(
    viewer: StoryViewer,
    mut input: mpsc::UnboundedReceiver<std::io::Result<String>>,
) -> Result<SessionSummary, String> {
    let events = viewer.subscribe();
    let handle = viewer.spawn();
    tracing::info!("Session {} started", handle.session_id());
    let mut printer = tokio::spawn(print_events(events));

    let printer_done = loop {
        tokio::select! {
            _ = &mut printer => break true,
            line = input.recv() => match line {
                Some(Ok(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        match serde_json::from_str::<HostCommand>(line) {
                            Ok(command) => {
                                command.dispatch(&handle);
                            }
                            Err(e) => tracing::warn!("Ignoring host command {}: {}", line, e),
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!("Failed to read host input: {}", e);
                    handle.close();
                    break false;
                }
                None => {
                    handle.close();
                    break false;
                }
            },
        }
    };

    let summary = handle
        .join()
        .await
        .map_err(|e| format!("Story session task failed: {}", e))?;
    if !printer_done {
        let _ = printer.await;
    }

    Ok(summary)
}

async fn run_host(cli: Cli) -> Result<(), String> {
    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let mut app_config = config::load_or_create(&config_path)?;
    config::apply_env_overrides(&mut app_config);

    let feed_path = cli
        .feed
        .or_else(|| app_config.feed_path.clone())
        .ok_or_else(|| {
            "No feed document given (pass FEED_JSON or set STORY_FEED_PATH)".to_string()
        })?;

    let provider = JsonFeedProvider::new(feed_path, app_config.viewer_id.clone());
    let mut selection = provider
        .load_selection()
        .await
        .map_err(|e| format!("Failed to load feed via {}: {}", provider.name(), e))?;
    if let Some(user_id) = cli.start_user.as_deref() {
        selection = selection.start_at_user(user_id).map_err(|e| e.to_string())?;
    }

    let deps = ViewerDeps {
        viewer_id: app_config.viewer_id.clone(),
        recorder: build_recorder(&app_config),
        media: build_media_loader(&app_config),
        playback: app_config.playback,
        gestures: app_config.gestures,
        surface: app_config.surface,
    };

    let viewer = match StoryViewer::new(selection, deps) {
        Ok(viewer) => viewer,
        Err(e) => {
            // Nothing to show; the host closes the viewer straight away
            tracing::warn!("Story session not opened: {}", e);
            return Ok(());
        }
    };

    let summary = drive_session(viewer, spawn_stdin_reader()).await?;

    tracing::info!(
        "Session {} closed ({:?}): {} stories shown, {} views recorded, {} failed",
        summary.session_id,
        summary.reason,
        summary.stories_shown,
        summary.views_recorded,
        summary.views_failed
    );

    Ok(())
}

pub fn run() {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_host(cli)) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
