use crate::gesture::{GestureConfig, Surface};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "story-viewer.json";
const TOKEN_XOR_KEY: &[u8] = b"story-viewer-local-key-v1";

pub const DEFAULT_VIEWER_ID: &str = "local-viewer";
pub const DEFAULT_STORY_DURATION_MS: u64 = 2000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 400;
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MEDIA_TIMEOUT_SECS: u64 = 15;

pub const ENV_VIEWER_ID: &str = "STORY_VIEWER_ID";
pub const ENV_BACKEND_URL: &str = "STORY_BACKEND_URL";
pub const ENV_BACKEND_TOKEN: &str = "STORY_BACKEND_TOKEN";
pub const ENV_FEED_PATH: &str = "STORY_FEED_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub viewer_id: String,
    pub playback: PlaybackConfig,
    pub gestures: GestureConfig,
    pub surface: Surface,
    pub backend: BackendConfig,
    pub media: MediaConfig,
    pub feed_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            viewer_id: DEFAULT_VIEWER_ID.to_string(),
            playback: PlaybackConfig::default(),
            gestures: GestureConfig::default(),
            surface: Surface::default(),
            backend: BackendConfig::default(),
            media: MediaConfig::default(),
            feed_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackConfig {
    pub story_duration_ms: u64,
    pub tick_interval_ms: u64,
    /// Quiet period before the first tick so media can start loading
    pub startup_delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            story_duration_ms: DEFAULT_STORY_DURATION_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            startup_delay_ms: DEFAULT_STARTUP_DELAY_MS,
        }
    }
}

impl PlaybackConfig {
    pub fn story_duration(&self) -> Duration {
        Duration::from_millis(self.story_duration_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the story service; views stay in memory when unset
    pub base_url: Option<String>,
    pub api_token_obfuscated: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token_obfuscated: None,
            timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaConfig {
    /// Fetch media over HTTP before the bar starts; otherwise media counts as ready at once
    pub prefetch: bool,
    pub timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            prefetch: false,
            timeout_secs: DEFAULT_MEDIA_TIMEOUT_SECS,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE)
}

pub fn load_or_create(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        let config = AppConfig::default();
        save(path, &config)?;
        return Ok(config);
    }

    let raw = fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(mut config) => {
            normalize_config(&mut config);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!("Config at {} is invalid ({}); resetting", path.display(), e);
            let backup = path.with_extension("json.bak");
            let _ = fs::copy(path, backup);
            let config = AppConfig::default();
            save(path, &config)?;
            Ok(config)
        }
    }
}

pub fn save(path: &Path, config: &AppConfig) -> Result<(), String> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| format!("Failed to create config dir: {}", e))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to save config: {}", e))
}

/// Applies `STORY_*` variables on top of the file values.
pub fn apply_env_overrides(config: &mut AppConfig) {
    apply_overrides(config, |name| std::env::var(name).ok());
}

fn apply_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let value = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(viewer_id) = value(ENV_VIEWER_ID) {
        config.viewer_id = viewer_id;
    }
    if let Some(url) = value(ENV_BACKEND_URL) {
        config.backend.base_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(token) = value(ENV_BACKEND_TOKEN) {
        set_api_token(config, &token);
    }
    if let Some(path) = value(ENV_FEED_PATH) {
        config.feed_path = Some(PathBuf::from(path));
    }
}

pub fn set_api_token(config: &mut AppConfig, token: &str) {
    let trimmed = token.trim();
    config.backend.api_token_obfuscated = if trimmed.is_empty() {
        None
    } else {
        Some(obfuscate_token(trimmed))
    };
}

pub fn decode_api_token(config: &AppConfig) -> Option<String> {
    config
        .backend
        .api_token_obfuscated
        .as_deref()
        .and_then(deobfuscate_token)
}

pub fn mask_token(token: &str) -> String {
    if token.len() <= 10 {
        return "******".to_string();
    }

    let prefix = token.get(..6).unwrap_or_default();
    let suffix = token.get(token.len().saturating_sub(4)..).unwrap_or_default();
    format!("{}********{}", prefix, suffix)
}

fn normalize_config(config: &mut AppConfig) {
    let viewer_id = config.viewer_id.trim();
    config.viewer_id = if viewer_id.is_empty() {
        DEFAULT_VIEWER_ID.to_string()
    } else {
        viewer_id.to_string()
    };

    let playback = &mut config.playback;
    playback.tick_interval_ms = playback.tick_interval_ms.clamp(10, 1000);
    playback.story_duration_ms = playback
        .story_duration_ms
        .clamp(playback.tick_interval_ms, 60_000);
    playback.startup_delay_ms = playback.startup_delay_ms.min(5_000);

    let gestures = &mut config.gestures;
    gestures.long_press_ms = gestures.long_press_ms.clamp(100, 2_000);
    gestures.touch_slop = gestures.touch_slop.clamp(1.0, 64.0);
    gestures.dismiss_threshold = gestures.dismiss_threshold.max(gestures.touch_slop);
    gestures.dismiss_velocity = gestures.dismiss_velocity.max(1.0);

    if config.surface.width <= 0.0 || config.surface.height <= 0.0 {
        config.surface = Surface::default();
    }

    config.backend.base_url = config
        .backend
        .base_url
        .take()
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty());
    config.backend.timeout_secs = config.backend.timeout_secs.clamp(1, 120);
    config.media.timeout_secs = config.media.timeout_secs.clamp(1, 120);
}

fn obfuscate_token(token: &str) -> String {
    let mut bytes = token.as_bytes().to_vec();
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= TOKEN_XOR_KEY[idx % TOKEN_XOR_KEY.len()];
    }
    BASE64_STANDARD.encode(bytes)
}

fn deobfuscate_token(obfuscated: &str) -> Option<String> {
    let mut bytes = BASE64_STANDARD.decode(obfuscated).ok()?;
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= TOKEN_XOR_KEY[idx % TOKEN_XOR_KEY.len()];
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("story-viewer-{}", uuid::Uuid::new_v4()))
            .join(CONFIG_FILE)
    }

    #[test]
    fn creates_defaults_when_missing() {
        let path = temp_path();
        let config = load_or_create(&path).unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(config.playback.story_duration_ms, 2000);
        assert_eq!(config.gestures.long_press_ms, 400);
    }

    #[test]
    fn corrupt_file_is_backed_up_and_reset() {
        let path = temp_path();
        save(&path, &AppConfig::default()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let config = load_or_create(&path).unwrap();

        assert_eq!(config, AppConfig::default());
        let backup = fs::read_to_string(path.with_extension("json.bak")).unwrap();
        assert_eq!(backup, "{ not json");
    }

    #[test]
    fn partial_file_keeps_defaults_and_clamps() {
        let path = temp_path();
        save(&path, &AppConfig::default()).unwrap();
        fs::write(
            &path,
            r#"{"viewerId":"  bob ","playback":{"tickIntervalMs":0},"backend":{"baseUrl":"https://api.example.com/"}}"#,
        )
        .unwrap();

        let config = load_or_create(&path).unwrap();

        assert_eq!(config.viewer_id, "bob");
        assert_eq!(config.playback.tick_interval_ms, 10);
        assert_eq!(config.playback.story_duration_ms, 2000);
        assert_eq!(config.playback.startup_delay_ms, 400);
        assert_eq!(
            config.backend.base_url.as_deref(),
            Some("https://api.example.com")
        );
    }

    #[test]
    fn env_overrides_win() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_VIEWER_ID, "carol"),
            (ENV_BACKEND_URL, "https://stories.example.com"),
            (ENV_BACKEND_TOKEN, "tok_1234567890abcdef"),
            (ENV_FEED_PATH, " "),
        ]);
        let mut config = AppConfig::default();

        apply_overrides(&mut config, |name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.viewer_id, "carol");
        assert_eq!(
            config.backend.base_url.as_deref(),
            Some("https://stories.example.com")
        );
        assert_eq!(
            decode_api_token(&config).as_deref(),
            Some("tok_1234567890abcdef")
        );
        assert!(config.feed_path.is_none());
    }

    #[test]
    fn token_is_not_stored_in_plain_text() {
        let mut config = AppConfig::default();
        set_api_token(&mut config, "secret-token-value");

        let stored = config.backend.api_token_obfuscated.clone().unwrap();
        assert!(!stored.contains("secret"));
        assert_eq!(decode_api_token(&config).as_deref(), Some("secret-token-value"));

        set_api_token(&mut config, "   ");
        assert!(decode_api_token(&config).is_none());
    }

    #[test]
    fn masks_tokens() {
        assert_eq!(mask_token("short"), "******");
        assert_eq!(mask_token("tok_1234567890abcdef"), "tok_12********cdef");
    }
}
