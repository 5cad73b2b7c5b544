//! Capture controller
//!
//! Owns one capture session at a time: acquires the stream, drives the
//! encoder and the duration timer, and hands finished payloads to the
//! recording store.

use super::error::{StudioError, StudioResult};
use super::state::{CaptureState, StudioEvent};
use super::timer::DurationTimer;
use crate::capture::{
    CaptureBackend, CaptureError, EncodedPayload, MediaEncoder, MediaStream, RecordingMode,
    CAPTURE_UNAVAILABLE_MESSAGE,
};
use crate::store::{download, Recording, RecordingStore};
use chrono::Utc;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct CaptureController {
    /// Platform capture API
    backend: Arc<dyn CaptureBackend>,

    /// Finished recordings
    store: RecordingStore,

    state: Arc<RwLock<CaptureState>>,

    /// Selected mode, locked while a session is active
    mode: RecordingMode,

    /// Devices acquired for the current session
    stream: Option<Box<dyn MediaStream>>,

    /// Encoder for the current session
    encoder: Option<Box<dyn MediaEncoder>>,

    timer: DurationTimer,

    /// Whether the live camera preview should be shown
    live_preview: bool,

    /// Last finished recording
    preview: Option<Recording>,

    /// User-visible error message
    error: Option<String>,

    /// Correlates log lines of one session
    session_id: Option<Uuid>,

    event_tx: broadcast::Sender<StudioEvent>,
}

impl CaptureController {
    pub fn new(backend: Arc<dyn CaptureBackend>, store: RecordingStore) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            backend,
            store,
            state: Arc::new(RwLock::new(CaptureState::Idle)),
            mode: RecordingMode::default(),
            stream: None,
            encoder: None,
            timer: DurationTimer::default().with_events(event_tx.clone()),
            live_preview: false,
            preview: None,
            error: None,
            session_id: None,
            event_tx,
        }
    }

    /// Subscribe to controller events
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        *self.state.read()
    }

    pub fn mode(&self) -> RecordingMode {
        self.mode
    }

    /// Seconds counted in the current (or last) session
    pub fn elapsed_seconds(&self) -> u64 {
        self.timer.seconds()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn preview(&self) -> Option<&Recording> {
        self.preview.as_ref()
    }

    /// Whether the live camera feed should be visible
    pub fn live_preview_visible(&self) -> bool {
        self.live_preview && self.state().is_capturing()
    }

    /// Current camera image while the live preview is visible
    pub fn live_frame(&self) -> Option<EncodedPayload> {
        if !self.live_preview_visible() {
            return None;
        }
        self.stream.as_ref()?.live_frame()
    }

    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    pub fn recordings(&self) -> &[Recording] {
        self.store.recordings()
    }

    fn emit(&self, event: StudioEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Select the capture mode. Rejected during a session.
    pub fn set_mode(&mut self, mode: RecordingMode) -> StudioResult<()> {
        if self.state().is_active() {
            return Err(StudioError::ModeLocked(mode));
        }
        if self.mode != mode {
            tracing::debug!("Mode changed: {} -> {}", self.mode, mode);
            self.mode = mode;
            self.emit(StudioEvent::ModeChanged { mode });
        }
        Ok(())
    }

    /// Acquire devices for the selected mode and begin encoding
    pub async fn start(&mut self) -> StudioResult<()> {
        if self.state() != CaptureState::Idle {
            return Err(StudioError::AlreadyRecording);
        }

        self.error = None;
        let mode = self.mode;
        tracing::info!("Starting {} capture via {} backend", mode, self.backend.name());

        let mut stream = match self.backend.open_stream(mode.constraints()).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.capture_unavailable(e)),
        };

        let mut encoder = match stream.create_encoder(mode.mime_type()) {
            Ok(encoder) => encoder,
            Err(e) => {
                stream.stop_tracks();
                return Err(self.capture_unavailable(e));
            }
        };

        if let Err(e) = encoder.start().await {
            stream.stop_tracks();
            return Err(self.capture_unavailable(e));
        }

        let session_id = Uuid::new_v4();
        tracing::info!("Capture session {} started on stream {}", session_id, stream.id());
        self.live_preview = mode == RecordingMode::Video && stream.has_video();
        self.stream = Some(stream);
        self.encoder = Some(encoder);
        self.session_id = Some(session_id);

        self.timer.reset();
        self.timer.start();

        *self.state.write() = CaptureState::Recording;
        self.emit(StudioEvent::Started { mode });
        Ok(())
    }

    fn capture_unavailable(&mut self, cause: CaptureError) -> StudioError {
        tracing::warn!("Capture unavailable: {}", cause);
        self.error = Some(CAPTURE_UNAVAILABLE_MESSAGE.to_string());
        self.emit(StudioEvent::Error {
            message: CAPTURE_UNAVAILABLE_MESSAGE.to_string(),
        });
        StudioError::CaptureUnavailable
    }

    /// Suspend encoding and the timer
    pub async fn pause(&mut self) -> StudioResult<()> {
        let current = self.state();
        if current != CaptureState::Recording {
            return Err(StudioError::InvalidTransition {
                action: "pause",
                state: state_name(current),
            });
        }

        let encoder = self.encoder.as_mut().ok_or(StudioError::NotRecording)?;
        encoder.pause().await?;
        self.timer.stop();

        *self.state.write() = CaptureState::Paused;
        let seconds = self.timer.seconds();
        self.emit(StudioEvent::Paused { seconds });

        tracing::info!("Capture paused at {}s", seconds);
        Ok(())
    }

    /// Continue a paused session
    pub async fn resume(&mut self) -> StudioResult<()> {
        let current = self.state();
        if current != CaptureState::Paused {
            return Err(StudioError::InvalidTransition {
                action: "resume",
                state: state_name(current),
            });
        }

        let encoder = self.encoder.as_mut().ok_or(StudioError::NotRecording)?;
        encoder.resume().await?;
        self.timer.start();

        *self.state.write() = CaptureState::Recording;
        let seconds = self.timer.seconds();
        self.emit(StudioEvent::Resumed { seconds });

        tracing::info!("Capture resumed at {}s", seconds);
        Ok(())
    }

    /// Finalize the session, release devices and store the recording
    pub async fn stop(&mut self) -> StudioResult<Recording> {
        if !self.state().is_capturing() {
            return Err(StudioError::NotRecording);
        }

        *self.state.write() = CaptureState::Stopped;
        self.timer.stop();
        let duration = self.timer.seconds();

        tracing::info!("Stopping capture session after {}s", duration);

        let result = self.finish_session(duration).await;

        self.live_preview = false;
        self.session_id = None;
        *self.state.write() = CaptureState::Idle;

        match result {
            Ok((index, recording)) => {
                self.preview = Some(recording.clone());
                self.emit(StudioEvent::Stopped { index, duration });
                tracing::info!(
                    "Stored recording #{} ({}s, {} total)",
                    index + 1,
                    duration,
                    self.store.len()
                );
                Ok(recording)
            }
            Err(e) => {
                tracing::error!("Failed to finish capture session: {}", e);
                Err(e)
            }
        }
    }

    async fn finish_session(&mut self, duration: u64) -> StudioResult<(usize, Recording)> {
        let finished = match self.encoder.take() {
            Some(mut encoder) => encoder.stop().await,
            None => Err(CaptureError::InvalidState("missing encoder".to_string())),
        };

        // Devices are released whether or not the encoder finished cleanly
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
        }

        let payload = finished?;
        tracing::debug!("Encoder produced {} bytes of {}", payload.len(), payload.mime_type);

        let data = tokio::task::spawn_blocking(move || payload.to_data_url())
            .await
            .map_err(|e| StudioError::Conversion(e.to_string()))?;

        let recording = Recording::new(data, self.mode, Utc::now(), duration);
        let index = self.store.append(recording.clone())?;
        Ok((index, recording))
    }

    /// Save the recording at 0-based `index` into `dir`
    pub fn download(&self, index: usize, dir: &Path) -> StudioResult<PathBuf> {
        let recording = self.store.get(index)?;
        Ok(download::save_recording(recording, index + 1, dir)?)
    }

    /// Save the current preview into `dir`
    pub fn download_preview(&self, dir: &Path) -> StudioResult<PathBuf> {
        let recording = self.preview.as_ref().ok_or(StudioError::NoPreview)?;
        Ok(download::save_recording(recording, 1, dir)?)
    }
}

fn state_name(state: CaptureState) -> &'static str {
    match state {
        CaptureState::Idle => "idle",
        CaptureState::Recording => "recording",
        CaptureState::Paused => "paused",
        CaptureState::Stopped => "stopping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::payload::EncodedPayload;
    use crate::capture::{VirtualCaptureBackend, VirtualDevices};
    use crate::store::{KeyValueStore, MemoryStore};
    use std::time::Duration;
    use tokio::time::sleep;

    fn controller_with(backend: Arc<VirtualCaptureBackend>) -> (CaptureController, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        let store = RecordingStore::open(storage.clone(), "recordings").unwrap();
        (CaptureController::new(backend, store), storage)
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_session_never_shows_live_preview() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, _) = controller_with(backend);

        ctrl.start().await.unwrap();
        assert!(!ctrl.live_preview_visible());
        ctrl.pause().await.unwrap();
        assert!(!ctrl.live_preview_visible());
        ctrl.stop().await.unwrap();
        assert!(!ctrl.live_preview_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_session_shows_live_preview_while_capturing() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, _) = controller_with(backend);

        ctrl.set_mode(RecordingMode::Video).unwrap();
        ctrl.start().await.unwrap();
        assert!(ctrl.live_preview_visible());
        ctrl.stop().await.unwrap();
        assert!(!ctrl.live_preview_visible());
        assert_eq!(ctrl.preview().unwrap().mode, RecordingMode::Video);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_frames_follow_the_video_preview() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, _) = controller_with(backend);
        assert!(ctrl.live_frame().is_none());

        ctrl.start().await.unwrap();
        assert!(ctrl.live_frame().is_none());
        ctrl.stop().await.unwrap();

        ctrl.set_mode(RecordingMode::Video).unwrap();
        ctrl.start().await.unwrap();
        let first = ctrl.live_frame().unwrap();
        assert_eq!(first.mime_type, "image/png");
        assert_ne!(ctrl.live_frame().unwrap(), first);

        ctrl.pause().await.unwrap();
        assert!(ctrl.live_frame().is_some());

        ctrl.stop().await.unwrap();
        assert!(ctrl.live_frame().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_appends_exactly_one_recording() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, _) = controller_with(backend.clone());

        for expected in 1..=3 {
            ctrl.start().await.unwrap();
            sleep(Duration::from_millis(1200)).await;
            ctrl.stop().await.unwrap();
            assert_eq!(ctrl.recordings().len(), expected);
            assert_eq!(ctrl.state(), CaptureState::Idle);
        }
        assert_eq!(backend.live_tracks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_resets_on_each_start() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, _) = controller_with(backend);

        ctrl.start().await.unwrap();
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(ctrl.elapsed_seconds(), 3);
        let first = ctrl.stop().await.unwrap();
        assert_eq!(first.duration, 3);

        ctrl.start().await.unwrap();
        assert_eq!(ctrl.elapsed_seconds(), 0);
        sleep(Duration::from_millis(1500)).await;
        let second = ctrl.stop().await.unwrap();
        assert_eq!(second.duration, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_keeps_time_and_data() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, _) = controller_with(backend);

        ctrl.start().await.unwrap();
        sleep(Duration::from_millis(2500)).await;
        ctrl.pause().await.unwrap();
        assert_eq!(ctrl.state(), CaptureState::Paused);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(ctrl.elapsed_seconds(), 2);

        ctrl.resume().await.unwrap();
        assert_eq!(ctrl.elapsed_seconds(), 2);
        sleep(Duration::from_millis(1500)).await;
        let recording = ctrl.stop().await.unwrap();

        assert_eq!(recording.duration, 3);
        let payload = EncodedPayload::from_data_url(&recording.data).unwrap();
        let text = String::from_utf8_lossy(&payload.bytes).to_string();
        assert!(text.contains("[segment 0 audio]"));
        assert!(text.contains("[segment 1 audio]"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persisted_list_equals_memory_after_stop() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, storage) = controller_with(backend);

        ctrl.start().await.unwrap();
        ctrl.stop().await.unwrap();
        ctrl.set_mode(RecordingMode::Video).unwrap();
        ctrl.start().await.unwrap();
        ctrl.stop().await.unwrap();

        let raw = storage.get_item("recordings").unwrap().unwrap();
        let persisted: Vec<Recording> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, ctrl.recordings());
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_capture_sets_static_message() {
        let backend = Arc::new(VirtualCaptureBackend::denied());
        let (mut ctrl, _) = controller_with(backend.clone());
        let mut events = ctrl.subscribe();

        let err = ctrl.start().await.unwrap_err();
        assert!(matches!(err, StudioError::CaptureUnavailable));
        assert_eq!(ctrl.error(), Some(CAPTURE_UNAVAILABLE_MESSAGE));
        assert_eq!(ctrl.state(), CaptureState::Idle);
        assert!(ctrl.recordings().is_empty());
        assert_eq!(
            events.recv().await.unwrap(),
            StudioEvent::Error {
                message: CAPTURE_UNAVAILABLE_MESSAGE.to_string()
            }
        );

        // A later successful start clears the message
        backend.set_devices(VirtualDevices::default());
        ctrl.start().await.unwrap();
        assert_eq!(ctrl.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_camera_is_the_same_error() {
        let backend = Arc::new(VirtualCaptureBackend::new(VirtualDevices {
            camera: false,
            ..VirtualDevices::default()
        }));
        let (mut ctrl, _) = controller_with(backend.clone());

        ctrl.set_mode(RecordingMode::Video).unwrap();
        assert!(matches!(
            ctrl.start().await,
            Err(StudioError::CaptureUnavailable)
        ));
        assert_eq!(ctrl.error(), Some(CAPTURE_UNAVAILABLE_MESSAGE));
        assert_eq!(backend.live_tracks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_failure_releases_tracks() {
        let unsupported = VirtualDevices {
            encoder_unsupported: true,
            ..VirtualDevices::default()
        };
        let start_fails = VirtualDevices {
            encoder_start_fails: true,
            ..VirtualDevices::default()
        };

        for devices in [unsupported, start_fails] {
            let backend = Arc::new(VirtualCaptureBackend::new(devices));
            let (mut ctrl, _) = controller_with(backend.clone());
            ctrl.set_mode(RecordingMode::Video).unwrap();
            let mut events = ctrl.subscribe();

            assert!(matches!(
                ctrl.start().await,
                Err(StudioError::CaptureUnavailable)
            ));
            assert_eq!(backend.streams_opened(), 1);
            assert_eq!(backend.live_tracks(), 0);
            assert_eq!(ctrl.state(), CaptureState::Idle);
            assert_eq!(ctrl.error(), Some(CAPTURE_UNAVAILABLE_MESSAGE));
            assert!(!ctrl.live_preview_visible());
            assert!(ctrl.recordings().is_empty());
            assert_eq!(
                events.try_recv().unwrap(),
                StudioEvent::Error {
                    message: CAPTURE_UNAVAILABLE_MESSAGE.to_string()
                }
            );

            // Nothing is left half-open: a healthy retry works
            backend.set_devices(VirtualDevices::default());
            ctrl.start().await.unwrap();
            assert_eq!(backend.live_tracks(), 2);
            ctrl.stop().await.unwrap();
            assert_eq!(backend.live_tracks(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_transitions() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, _) = controller_with(backend.clone());

        assert!(matches!(ctrl.pause().await, Err(StudioError::InvalidTransition { .. })));
        assert!(matches!(ctrl.resume().await, Err(StudioError::InvalidTransition { .. })));
        assert!(matches!(ctrl.stop().await, Err(StudioError::NotRecording)));

        ctrl.start().await.unwrap();
        assert!(matches!(ctrl.start().await, Err(StudioError::AlreadyRecording)));
        assert!(matches!(ctrl.resume().await, Err(StudioError::InvalidTransition { .. })));
        assert!(matches!(
            ctrl.set_mode(RecordingMode::Video),
            Err(StudioError::ModeLocked(RecordingMode::Video))
        ));
        assert_eq!(ctrl.mode(), RecordingMode::Audio);
        assert_eq!(backend.streams_opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_sequence() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, _) = controller_with(backend);
        let mut events = ctrl.subscribe();

        ctrl.start().await.unwrap();
        sleep(Duration::from_millis(1100)).await;
        ctrl.pause().await.unwrap();
        ctrl.resume().await.unwrap();
        ctrl.stop().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                StudioEvent::Started {
                    mode: RecordingMode::Audio
                },
                StudioEvent::Tick { seconds: 1 },
                StudioEvent::Paused { seconds: 1 },
                StudioEvent::Resumed { seconds: 1 },
                StudioEvent::Stopped {
                    index: 0,
                    duration: 1
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_round_trips_payload() {
        let backend = Arc::new(VirtualCaptureBackend::default());
        let (mut ctrl, _) = controller_with(backend);
        let dir = tempfile::tempdir().unwrap();

        ctrl.start().await.unwrap();
        let recording = ctrl.stop().await.unwrap();

        let path = ctrl.download(0, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "recording_1.webm");
        assert_eq!(
            std::fs::read(&path).unwrap(),
            EncodedPayload::from_data_url(&recording.data).unwrap().bytes
        );
        assert!(matches!(ctrl.download(5, dir.path()), Err(StudioError::Store(_))));

        let preview_path = ctrl.download_preview(dir.path()).unwrap();
        assert_eq!(preview_path.file_name().unwrap(), "recording_1 (1).webm");
    }
}
