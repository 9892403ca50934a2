//! Player settings
//!
//! Handles loading/saving the JSON settings file and the playback tuning
//! knobs of the core. The file is searched in a fixed priority order:
//! the system config directory, the parent directory, then the working
//! directory; a missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings file name
pub const CONFIG_FILE_NAME: &str = "lockstep-player.config.json";

/// Errors surfaced from settings load/save
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables of the playback core, stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Path of the media file to load
    #[serde(rename = "videoFilePath", default)]
    pub video_file_path: String,

    /// Fixed offset between the transport clock and the video, in
    /// milliseconds. Positive values delay the video.
    #[serde(rename = "syncOffsetMs", default)]
    pub sync_offset_ms: f64,

    /// Maximum number of decoded frames kept in the cache
    #[serde(rename = "cacheCapacity", default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Frames to keep decoded ahead of the playhead while playing
    #[serde(rename = "decodeAhead", default = "default_decode_ahead")]
    pub decode_ahead: u64,

    /// Reduced look-ahead while paused
    #[serde(rename = "pausedDecodeAhead", default = "default_paused_decode_ahead")]
    pub paused_decode_ahead: u64,

    /// Frames decoded synchronously at load time, before playback starts
    #[serde(rename = "preloadFrames", default = "default_preload_frames")]
    pub preload_frames: u64,
}

fn default_cache_capacity() -> usize {
    300
}

fn default_decode_ahead() -> u64 {
    150
}

fn default_paused_decode_ahead() -> u64 {
    20
}

fn default_preload_frames() -> u64 {
    150
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            video_file_path: String::new(),
            sync_offset_ms: 0.0,
            cache_capacity: default_cache_capacity(),
            decode_ahead: default_decode_ahead(),
            paused_decode_ahead: default_paused_decode_ahead(),
            preload_frames: default_preload_frames(),
        }
    }
}

impl PlayerSettings {
    /// Clamp the tuning knobs to sane, mutually consistent ranges.
    ///
    /// The look-ahead window must fit inside the cache, and the preload
    /// cannot exceed what the cache can hold.
    pub fn clamp_limits(&mut self) {
        self.cache_capacity = self.cache_capacity.clamp(16, 4096);
        self.decode_ahead = self.decode_ahead.clamp(1, self.cache_capacity as u64);
        self.paused_decode_ahead = self.paused_decode_ahead.clamp(1, self.decode_ahead);
        self.preload_frames = self.preload_frames.min(self.cache_capacity as u64);
    }

    /// Candidate settings file locations, in priority order.
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        #[cfg(target_os = "linux")]
        paths.push(PathBuf::from("/var/lib/lockstep-player").join(CONFIG_FILE_NAME));
        paths.push(PathBuf::from("..").join(CONFIG_FILE_NAME));
        paths.push(PathBuf::from(CONFIG_FILE_NAME));
        paths
    }

    /// Load settings from the first settings file found on the search
    /// path, falling back to defaults when none exists or parsing fails.
    pub fn load() -> Self {
        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(settings) => {
                    tracing::info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(e) => {
                    tracing::warn!("Could not load settings from {}: {e}", path.display());
                }
            }
        }
        tracing::debug!("No settings file found, using defaults");
        Self::default()
    }

    /// Load settings from a specific JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&contents)?;
        settings.clamp_limits();
        Ok(settings)
    }

    /// Save settings to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = PlayerSettings::default();
        assert_eq!(settings.cache_capacity, 300);
        assert_eq!(settings.decode_ahead, 150);
        assert_eq!(settings.paused_decode_ahead, 20);
        assert_eq!(settings.preload_frames, 150);
        assert_eq!(settings.sync_offset_ms, 0.0);
    }

    #[test]
    fn test_clamp_limits() {
        let mut settings = PlayerSettings {
            cache_capacity: 8,
            decode_ahead: 500,
            paused_decode_ahead: 400,
            preload_frames: 900,
            ..Default::default()
        };
        settings.clamp_limits();
        assert_eq!(settings.cache_capacity, 16);
        assert_eq!(settings.decode_ahead, 16);
        assert_eq!(settings.paused_decode_ahead, 16);
        assert_eq!(settings.preload_frames, 16);
    }

    #[test]
    fn test_json_round_trip() {
        let mut settings = PlayerSettings::default();
        settings.video_file_path = "show.mp4".to_string();
        settings.sync_offset_ms = 40.0;

        let path = std::env::temp_dir().join("lockstep-player-settings-test.json");
        settings.save_to_file(&path).unwrap();
        let loaded = PlayerSettings::load_from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.video_file_path, "show.mp4");
        assert_eq!(loaded.sync_offset_ms, 40.0);
        assert_eq!(loaded.cache_capacity, 300);
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let json = r#"{ "videoFilePath": "loop.mov" }"#;
        let settings: PlayerSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.video_file_path, "loop.mov");
        assert_eq!(settings.decode_ahead, 150);
        assert_eq!(settings.cache_capacity, 300);
    }

    #[test]
    fn test_missing_file_errors() {
        let missing = std::env::temp_dir().join("lockstep-player-definitely-missing.json");
        assert!(PlayerSettings::load_from_file(&missing).is_err());
    }
}
