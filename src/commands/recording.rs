//! Recording-related Tauri commands

use crate::capture::RecordingMode;
use crate::config::{self, StudioConfig};
use crate::recorder::{CaptureController, StudioEvent};
use crate::store::Recording;
use crate::utils::ErrorResponse;
use crate::view::StudioView;
use std::path::PathBuf;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};
use tokio::sync::{broadcast, Mutex};

/// Event name used for controller events in the webview
pub const STUDIO_EVENT: &str = "studio://event";

/// Application state for recording
pub struct StudioState {
    pub controller: Arc<Mutex<CaptureController>>,
    pub download_dir: PathBuf,
    /// Settings as loaded at startup, updated when the mode changes
    pub config: Mutex<StudioConfig>,
}

impl StudioState {
    pub fn new(controller: CaptureController, download_dir: PathBuf, config: StudioConfig) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
            download_dir,
            config: Mutex::new(config),
        }
    }
}

/// Relay controller events to every webview until the channel closes
pub async fn forward_events(app: AppHandle, mut events: broadcast::Receiver<StudioEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = app.emit(STUDIO_EVENT, &event) {
                    tracing::warn!("Failed to emit studio event: {}", e);
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!("Event forwarder skipped {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Snapshot of the whole studio screen
#[tauri::command]
pub async fn get_studio_view(state: State<'_, StudioState>) -> Result<StudioView, ErrorResponse> {
    let controller = state.controller.lock().await;
    Ok(StudioView::from_controller(&controller))
}

/// Select audio or video mode
#[tauri::command]
pub async fn set_recording_mode(
    state: State<'_, StudioState>,
    mode: RecordingMode,
) -> Result<StudioView, ErrorResponse> {
    let mut controller = state.controller.lock().await;
    controller.set_mode(mode)?;

    // The choice is restored on the next launch; failing to save is not fatal
    let mut settings = state.config.lock().await;
    let saved = config::config_path()
        .and_then(|path| config::remember_mode(&mut settings, mode, &path));
    if let Err(e) = saved {
        tracing::warn!("Failed to remember recording mode: {:#}", e);
    }

    Ok(StudioView::from_controller(&controller))
}

/// Start recording
#[tauri::command]
pub async fn start_recording(state: State<'_, StudioState>) -> Result<StudioView, ErrorResponse> {
    let mut controller = state.controller.lock().await;
    controller.start().await?;
    Ok(StudioView::from_controller(&controller))
}

/// Pause recording
#[tauri::command]
pub async fn pause_recording(state: State<'_, StudioState>) -> Result<StudioView, ErrorResponse> {
    let mut controller = state.controller.lock().await;
    controller.pause().await?;
    Ok(StudioView::from_controller(&controller))
}

/// Resume recording
#[tauri::command]
pub async fn resume_recording(state: State<'_, StudioState>) -> Result<StudioView, ErrorResponse> {
    let mut controller = state.controller.lock().await;
    controller.resume().await?;
    Ok(StudioView::from_controller(&controller))
}

/// Stop recording and store the result
#[tauri::command]
pub async fn stop_recording(state: State<'_, StudioState>) -> Result<StudioView, ErrorResponse> {
    let mut controller = state.controller.lock().await;
    controller.stop().await?;
    Ok(StudioView::from_controller(&controller))
}

/// Latest live camera image as a data URL, while the video preview is visible
#[tauri::command]
pub async fn get_live_frame(state: State<'_, StudioState>) -> Result<Option<String>, ErrorResponse> {
    let controller = state.controller.lock().await;
    let Some(frame) = controller.live_frame() else {
        return Ok(None);
    };
    drop(controller);

    let url = tokio::task::spawn_blocking(move || frame.to_data_url())
        .await
        .map_err(|e| ErrorResponse {
            code: "CONVERSION_ERROR".to_string(),
            message: e.to_string(),
        })?;
    Ok(Some(url))
}

/// Seconds recorded in the current session
#[tauri::command]
pub async fn get_recording_duration(state: State<'_, StudioState>) -> Result<u64, ErrorResponse> {
    let controller = state.controller.lock().await;
    Ok(controller.elapsed_seconds())
}

/// All stored recordings, oldest first
#[tauri::command]
pub async fn list_recordings(state: State<'_, StudioState>) -> Result<Vec<Recording>, ErrorResponse> {
    let controller = state.controller.lock().await;
    Ok(controller.recordings().to_vec())
}

/// Save a recording into the download directory.
///
/// `index` is the 0-based list position; `None` downloads the preview.
#[tauri::command]
pub async fn download_recording(
    state: State<'_, StudioState>,
    index: Option<usize>,
) -> Result<String, ErrorResponse> {
    let controller = state.controller.lock().await;
    let path = match index {
        Some(i) => controller.download(i, &state.download_dir)?,
        None => controller.download_preview(&state.download_dir)?,
    };
    Ok(path.to_string_lossy().to_string())
}
