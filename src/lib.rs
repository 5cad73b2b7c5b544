//! Media Recorder Studio - record audio and video from local devices.
//!
//! This is the main library crate. It provides the capture controller, the
//! persisted recordings library and, with the `desktop` feature, the Tauri
//! application shell.

pub mod capture;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod config;
pub mod recorder;
pub mod store;
pub mod utils;
pub mod view;

use config::StudioConfig;
use recorder::CaptureController;
use std::sync::Arc;
use store::{FileStore, RecordingStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Build a controller wired to the configured storage and capture backend
pub fn open_studio(config: &StudioConfig) -> utils::AppResult<CaptureController> {
    let storage_dir = config.storage_dir()?;
    let storage = Arc::new(FileStore::open(&storage_dir)?);
    let store = RecordingStore::open(storage, config.storage_key.clone())?;

    let backend = capture::backend_from_config(&config.capture);
    tracing::info!(
        "Studio opened: {} stored recordings in {:?}, {} capture",
        store.len(),
        storage_dir,
        backend.name()
    );

    let mut controller = CaptureController::new(backend, store);
    controller.set_mode(config.default_mode)?;
    Ok(controller)
}

/// Initialize and run the desktop application
#[cfg(feature = "desktop")]
pub fn run() {
    use commands::recording::{forward_events, StudioState};

    let config = config::load_config();
    init_tracing(&config.log_filter);

    tracing::info!("Starting Media Recorder Studio v{}", env!("CARGO_PKG_VERSION"));

    let controller = match open_studio(&config) {
        Ok(controller) => controller,
        Err(e) => {
            tracing::error!("Failed to open studio: {}", e);
            return;
        }
    };
    let download_dir = match config.download_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::error!("Failed to resolve download directory: {:#}", e);
            return;
        }
    };

    let events = controller.subscribe();

    let result = tauri::Builder::default()
        .manage(StudioState::new(controller, download_dir, config))
        .invoke_handler(tauri::generate_handler![
            commands::recording::get_studio_view,
            commands::recording::set_recording_mode,
            commands::recording::start_recording,
            commands::recording::pause_recording,
            commands::recording::resume_recording,
            commands::recording::stop_recording,
            commands::recording::get_live_frame,
            commands::recording::get_recording_duration,
            commands::recording::list_recordings,
            commands::recording::download_recording,
        ])
        .setup(move |app| {
            tauri::async_runtime::spawn(forward_events(app.handle().clone(), events));
            Ok(())
        })
        .run(tauri::generate_context!());

    if let Err(e) = result {
        tracing::error!("Error while running tauri application: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::CaptureBackendKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_studio_with_virtual_backend() {
        let dir = tempdir().unwrap();
        let mut config = StudioConfig {
            storage_dir: Some(dir.path().to_path_buf()),
            default_mode: capture::RecordingMode::Video,
            ..StudioConfig::default()
        };
        config.capture.backend = CaptureBackendKind::Virtual;

        {
            let mut studio = open_studio(&config).unwrap();
            assert_eq!(studio.mode(), capture::RecordingMode::Video);
            studio.start().await.unwrap();
            studio.stop().await.unwrap();
        }

        let reopened = open_studio(&config).unwrap();
        assert_eq!(reopened.recordings().len(), 1);
        assert!(dir.path().join("recordings.json").exists());
    }
}
