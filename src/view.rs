//! Presentation model
//!
//! A snapshot of everything the studio screen shows, built from the
//! controller. Renderers (the webview, the text form below) only read it.

use crate::capture::RecordingMode;
use crate::recorder::{CaptureController, CaptureState};
use crate::store::Recording;
use chrono::Local;
use serde::Serialize;
use std::fmt;

pub const EMPTY_LIST_MESSAGE: &str = "No recordings yet.";

/// `MM:SS`, minutes are not capped at 59
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Buttons offered in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Start,
    Stop,
    Pause,
    Resume,
}

/// Player for the last finished recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewView {
    pub mode: RecordingMode,
    pub source: String,
    pub download_name: String,
}

/// One row of the past recordings table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingRow {
    /// 1-based
    pub serial: usize,
    pub timestamp: String,
    pub mode: RecordingMode,
    pub duration: String,
    pub source: String,
    pub download_name: String,
}

impl RecordingRow {
    pub fn new(index: usize, recording: &Recording) -> Self {
        Self {
            serial: index + 1,
            timestamp: recording
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            mode: recording.mode,
            duration: format_time(recording.duration),
            source: recording.data.clone(),
            download_name: recording.download_name(index + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioView {
    pub mode: RecordingMode,
    pub state: CaptureState,
    pub mode_selectable: bool,
    pub controls: Vec<Control>,
    /// Running `MM:SS`, shown only during a session
    pub timer: Option<String>,
    pub live_preview: bool,
    pub error: Option<String>,
    pub preview: Option<PreviewView>,
    pub recordings: Vec<RecordingRow>,
    pub empty_message: Option<String>,
}

impl StudioView {
    pub fn from_controller(controller: &CaptureController) -> Self {
        let state = controller.state();

        let controls = match state {
            CaptureState::Idle => vec![Control::Start],
            CaptureState::Recording => vec![Control::Stop, Control::Pause],
            CaptureState::Paused => vec![Control::Stop, Control::Resume],
            CaptureState::Stopped => Vec::new(),
        };

        let recordings: Vec<RecordingRow> = controller
            .recordings()
            .iter()
            .enumerate()
            .map(|(i, r)| RecordingRow::new(i, r))
            .collect();

        Self {
            mode: controller.mode(),
            state,
            mode_selectable: !state.is_active(),
            controls,
            timer: state
                .is_capturing()
                .then(|| format_time(controller.elapsed_seconds())),
            live_preview: controller.live_preview_visible(),
            error: controller.error().map(str::to_string),
            preview: controller.preview().map(|r| PreviewView {
                mode: r.mode,
                source: r.data.clone(),
                download_name: r.download_name(1),
            }),
            empty_message: recordings
                .is_empty()
                .then(|| EMPTY_LIST_MESSAGE.to_string()),
            recordings,
        }
    }
}

/// Plain-text rendering, used for logs and terminals
impl fmt::Display for StudioView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mode: {}", self.mode)?;
        if !self.mode_selectable {
            write!(f, " (locked)")?;
        }
        writeln!(f)?;

        let controls: Vec<&str> = self
            .controls
            .iter()
            .map(|c| match c {
                Control::Start => "[Start]",
                Control::Stop => "[Stop]",
                Control::Pause => "[Pause]",
                Control::Resume => "[Resume]",
            })
            .collect();
        write!(f, "{}", controls.join(" "))?;
        if let Some(timer) = &self.timer {
            write!(f, " {}", timer)?;
        }
        writeln!(f)?;

        if self.live_preview {
            writeln!(f, "Live camera preview")?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "Error: {}", error)?;
        }
        if let Some(preview) = &self.preview {
            writeln!(f, "Preview ({}): {}", preview.mode, preview.download_name)?;
        }

        if let Some(message) = &self.empty_message {
            return writeln!(f, "{}", message);
        }

        writeln!(f, "Past Recordings")?;
        writeln!(f, "{:<5} {:<20} {:<6} {:>8}  {}", "S No", "Timestamp", "Type", "Duration", "File")?;
        for row in &self.recordings {
            writeln!(
                f,
                "{:<5} {:<20} {:<6} {:>8}  {}",
                row.serial, row.timestamp, row.mode.as_str(), row.duration, row.download_name
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{VirtualCaptureBackend, CAPTURE_UNAVAILABLE_MESSAGE};
    use crate::store::{MemoryStore, RecordingStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn controller(backend: VirtualCaptureBackend) -> CaptureController {
        let store = RecordingStore::open(Arc::new(MemoryStore::new()), "recordings").unwrap();
        CaptureController::new(Arc::new(backend), store)
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(3599), "59:59");
        assert_eq!(format_time(6000), "100:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_follows_session() {
        let mut ctrl = controller(VirtualCaptureBackend::default());

        let idle = StudioView::from_controller(&ctrl);
        assert_eq!(idle.controls, vec![Control::Start]);
        assert!(idle.mode_selectable);
        assert_eq!(idle.timer, None);
        assert_eq!(idle.empty_message.as_deref(), Some(EMPTY_LIST_MESSAGE));

        ctrl.set_mode(RecordingMode::Video).unwrap();
        ctrl.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        let recording = StudioView::from_controller(&ctrl);
        assert_eq!(recording.controls, vec![Control::Stop, Control::Pause]);
        assert!(!recording.mode_selectable);
        assert!(recording.live_preview);
        assert_eq!(recording.timer.as_deref(), Some("00:02"));

        ctrl.pause().await.unwrap();
        let paused = StudioView::from_controller(&ctrl);
        assert_eq!(paused.controls, vec![Control::Stop, Control::Resume]);
        assert!(paused.timer.is_some());

        ctrl.stop().await.unwrap();
        let done = StudioView::from_controller(&ctrl);
        assert_eq!(done.recordings.len(), 1);
        assert_eq!(done.recordings[0].serial, 1);
        assert_eq!(done.recordings[0].duration, "00:02");
        assert_eq!(done.recordings[0].download_name, "recording_1.webm");
        assert_eq!(done.preview.as_ref().unwrap().mode, RecordingMode::Video);
        assert_eq!(done.empty_message, None);
        assert!(!done.live_preview);
    }

    #[tokio::test]
    async fn test_view_shows_capture_error() {
        let mut ctrl = controller(VirtualCaptureBackend::denied());
        let _ = ctrl.start().await;

        let view = StudioView::from_controller(&ctrl);
        assert_eq!(view.error.as_deref(), Some(CAPTURE_UNAVAILABLE_MESSAGE));
        assert!(view.to_string().contains(CAPTURE_UNAVAILABLE_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_rendering_lists_recordings() {
        let mut ctrl = controller(VirtualCaptureBackend::default());
        ctrl.start().await.unwrap();
        ctrl.stop().await.unwrap();

        let text = StudioView::from_controller(&ctrl).to_string();
        assert!(text.starts_with("Mode: audio\n[Start]"));
        assert!(text.contains("Past Recordings"));
        assert!(text.contains("recording_1.webm"));
        assert!(!text.contains(EMPTY_LIST_MESSAGE));
    }
}
