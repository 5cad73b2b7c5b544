//! Capture trait definitions
//!
//! Platform-agnostic seams between the capture controller and whatever
//! actually owns the microphone and camera.

use super::error::CaptureResult;
use super::payload::EncodedPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a capture session records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    /// Microphone only
    #[default]
    Audio,
    /// Camera plus microphone
    Video,
}

impl RecordingMode {
    /// Device constraints requested from the platform for this mode
    pub fn constraints(&self) -> MediaConstraints {
        match self {
            RecordingMode::Audio => MediaConstraints {
                audio: true,
                video: false,
            },
            RecordingMode::Video => MediaConstraints {
                audio: true,
                video: true,
            },
        }
    }

    /// Container MIME type requested from the encoder
    pub fn mime_type(&self) -> &'static str {
        match self {
            RecordingMode::Audio => "audio/webm",
            RecordingMode::Video => "video/webm",
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingMode::Audio => "audio",
            RecordingMode::Video => "video",
        }
    }
}

impl std::fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which device feeds to acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

/// Kind of an acquired device feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Encoder lifecycle, mirrors the platform recorder states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderState {
    #[default]
    Inactive,
    Recording,
    Paused,
}

/// Entry point into the platform capture API
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Backend name, used in logs
    fn name(&self) -> &str;

    /// Acquire the devices matching `constraints`.
    ///
    /// May suspend on a user-mediated permission prompt. Denial and a
    /// missing device both surface as an error here.
    async fn open_stream(&self, constraints: MediaConstraints) -> CaptureResult<Box<dyn MediaStream>>;
}

/// A set of live device tracks
pub trait MediaStream: Send {
    /// Stream identifier
    fn id(&self) -> &str;

    /// Tracks currently held by this stream
    fn tracks(&self) -> Vec<TrackKind>;

    /// Whether the stream carries a camera feed
    fn has_video(&self) -> bool {
        self.tracks().contains(&TrackKind::Video)
    }

    /// Create an encoder recording this stream into `mime_type`
    fn create_encoder(&mut self, mime_type: &str) -> CaptureResult<Box<dyn MediaEncoder>>;

    /// Release every device held by the stream. Idempotent.
    fn stop_tracks(&mut self);

    /// Whether any track is still live
    fn is_active(&self) -> bool;

    /// Most recent camera image, for the live preview. `None` without a
    /// live video track or before the first frame arrives.
    fn live_frame(&self) -> Option<EncodedPayload> {
        None
    }
}

/// A recording session over a media stream
#[async_trait]
pub trait MediaEncoder: Send {
    /// Current encoder state
    fn state(&self) -> EncoderState;

    /// Begin encoding
    async fn start(&mut self) -> CaptureResult<()>;

    /// Suspend encoding, keeping everything captured so far
    async fn pause(&mut self) -> CaptureResult<()>;

    /// Continue a paused encoding
    async fn resume(&mut self) -> CaptureResult<()>;

    /// Finalize and hand back the encoded payload
    async fn stop(&mut self) -> CaptureResult<EncodedPayload>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraints_per_mode() {
        let audio = RecordingMode::Audio.constraints();
        assert!(audio.audio);
        assert!(!audio.video);

        let video = RecordingMode::Video.constraints();
        assert!(video.audio);
        assert!(video.video);
    }

    #[test]
    fn test_mode_string_forms() {
        assert_eq!(
            serde_json::from_str::<RecordingMode>("\"video\"").unwrap(),
            RecordingMode::Video
        );
        assert!(serde_json::from_str::<RecordingMode>("\"screen\"").is_err());
        assert_eq!(RecordingMode::Video.to_string(), "video");
        assert_eq!(
            serde_json::to_string(&RecordingMode::Audio).unwrap(),
            "\"audio\""
        );
    }
}
