//! Configuration management for Media Recorder Studio.
//!
//! Loaded from the platform-standard config directory:
//! - Linux: `~/.config/media-recorder-studio/config.json`
//! - macOS: `~/Library/Application Support/media-recorder-studio/config.json`
//! - Windows: `%APPDATA%\media-recorder-studio\config.json`

use crate::capture::RecordingMode;
use anyhow::Context;
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "media-recorder-studio";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_STORAGE_KEY: &str = "recordings";
pub const DEFAULT_LOG_FILTER: &str = "media_recorder_studio_lib=debug,tauri=info";

/// Which capture backend to drive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackendKind {
    /// Real microphone and camera
    #[default]
    Native,
    /// Synthetic devices
    Virtual,
}

/// Capture-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub backend: CaptureBackendKind,
    /// Input device name. None means the system default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microphone_id: Option<String>,
    /// Camera index or path. None means the first camera.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    pub camera_fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CaptureBackendKind::Native,
            microphone_id: None,
            camera_id: None,
            camera_fps: 30,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Where the recordings list is persisted. None uses the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
    /// Storage key holding the serialized recordings list
    pub storage_key: String,
    /// Mode selected when the studio opens
    pub default_mode: RecordingMode,
    /// Where downloads land. None uses the Downloads folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    /// Fallback tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
    pub capture: CaptureConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_mode: RecordingMode::Audio,
            download_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            capture: CaptureConfig::default(),
        }
    }
}

impl StudioConfig {
    /// Resolved storage directory
    pub fn storage_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        let dirs = project_dirs()?;
        Ok(dirs.data_dir().join("storage"))
    }

    /// Resolved download directory
    pub fn download_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.download_dir {
            return Ok(dir.clone());
        }
        let user_dirs = UserDirs::new().context("Could not determine user directories")?;
        Ok(user_dirs
            .download_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| user_dirs.home_dir().to_path_buf()))
    }
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME).context("Could not determine config directory")
}

/// Get the path to the config file.
pub fn config_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
}

/// Read and parse a config file.
pub fn load_from(path: &Path) -> anyhow::Result<StudioConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse config file {:?}", path))
}

/// Load configuration from disk.
/// Returns the defaults if the file doesn't exist or is invalid.
pub fn load_config() -> StudioConfig {
    let path = match config_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("{:#}, using default config", e);
            return StudioConfig::default();
        }
    };

    if !path.exists() {
        tracing::debug!("No config file at {:?}, using defaults", path);
        return StudioConfig::default();
    }

    match load_from(&path) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            tracing::warn!("{:#}. Using defaults.", e);
            StudioConfig::default()
        }
    }
}

/// Save configuration to `path`, creating parent directories.
pub fn save_to(config: &StudioConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).with_context(|| format!("Failed to write config file {:?}", path))?;
    tracing::debug!("Saved config to {:?}", path);
    Ok(())
}

/// Make `mode` the mode selected on the next launch.
///
/// Writes `path` only when the remembered mode actually changes.
pub fn remember_mode(config: &mut StudioConfig, mode: RecordingMode, path: &Path) -> anyhow::Result<()> {
    if config.default_mode == mode {
        return Ok(());
    }
    config.default_mode = mode;
    save_to(config, path)
}
