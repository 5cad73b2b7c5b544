//! Synthetic capture backend
//!
//! Produces deterministic webm-tagged payloads without touching real
//! hardware. Used for headless runs and throughout the tests.

use super::error::{CaptureError, CaptureResult};
use super::frame;
use super::payload::EncodedPayload;
use super::traits::{
    CaptureBackend, EncoderState, MediaConstraints, MediaEncoder, MediaStream, TrackKind,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// EBML magic that opens every webm/matroska file
pub const WEBM_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Size of the synthetic camera image
pub const VIRTUAL_FRAME_SIZE: (u32, u32) = (64, 48);

/// Which virtual devices exist and whether access is granted
#[derive(Debug, Clone)]
pub struct VirtualDevices {
    pub microphone: bool,
    pub camera: bool,
    pub permission_granted: bool,
    /// Streams open but refuse to create an encoder
    pub encoder_unsupported: bool,
    /// Encoders are created but fail to start
    pub encoder_start_fails: bool,
}

impl Default for VirtualDevices {
    fn default() -> Self {
        Self {
            microphone: true,
            camera: true,
            permission_granted: true,
            encoder_unsupported: false,
            encoder_start_fails: false,
        }
    }
}

/// Capture backend backed by in-memory devices
pub struct VirtualCaptureBackend {
    devices: Mutex<VirtualDevices>,
    live_tracks: Arc<AtomicUsize>,
    streams_opened: AtomicUsize,
}

impl VirtualCaptureBackend {
    pub fn new(devices: VirtualDevices) -> Self {
        Self {
            devices: Mutex::new(devices),
            live_tracks: Arc::new(AtomicUsize::new(0)),
            streams_opened: AtomicUsize::new(0),
        }
    }

    /// Backend whose permission prompt is always refused
    pub fn denied() -> Self {
        Self::new(VirtualDevices {
            permission_granted: false,
            ..VirtualDevices::default()
        })
    }

    /// Change device availability for subsequent requests
    pub fn set_devices(&self, devices: VirtualDevices) {
        *self.devices.lock() = devices;
    }

    /// Tracks acquired and not yet released, across all streams
    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }
}

impl Default for VirtualCaptureBackend {
    fn default() -> Self {
        Self::new(VirtualDevices::default())
    }
}

#[async_trait]
impl CaptureBackend for VirtualCaptureBackend {
    fn name(&self) -> &str {
        "virtual"
    }

    async fn open_stream(&self, constraints: MediaConstraints) -> CaptureResult<Box<dyn MediaStream>> {
        let devices = self.devices.lock().clone();

        if !devices.permission_granted {
            return Err(CaptureError::PermissionDenied(
                "virtual permission prompt refused".to_string(),
            ));
        }
        if constraints.audio && !devices.microphone {
            return Err(CaptureError::DeviceNotFound("no virtual microphone".to_string()));
        }
        if constraints.video && !devices.camera {
            return Err(CaptureError::DeviceNotFound("no virtual camera".to_string()));
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(TrackKind::Audio);
        }
        if constraints.video {
            tracks.push(TrackKind::Video);
        }

        self.live_tracks.fetch_add(tracks.len(), Ordering::SeqCst);
        self.streams_opened.fetch_add(1, Ordering::SeqCst);

        let stream = VirtualStream {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
            live_tracks: self.live_tracks.clone(),
            released: false,
            encoder_unsupported: devices.encoder_unsupported,
            encoder_start_fails: devices.encoder_start_fails,
            frames_served: AtomicUsize::new(0),
        };
        tracing::debug!("Opened virtual stream {} ({:?})", stream.id, stream.tracks);

        Ok(Box::new(stream))
    }
}

struct VirtualStream {
    id: String,
    tracks: Vec<TrackKind>,
    live_tracks: Arc<AtomicUsize>,
    released: bool,
    encoder_unsupported: bool,
    encoder_start_fails: bool,
    frames_served: AtomicUsize,
}

impl MediaStream for VirtualStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<TrackKind> {
        if self.released {
            Vec::new()
        } else {
            self.tracks.clone()
        }
    }

    fn create_encoder(&mut self, mime_type: &str) -> CaptureResult<Box<dyn MediaEncoder>> {
        if self.released {
            return Err(CaptureError::Capture("stream already stopped".to_string()));
        }
        if self.encoder_unsupported {
            return Err(CaptureError::Configuration(format!(
                "no virtual encoder for {}",
                mime_type
            )));
        }
        Ok(Box::new(VirtualEncoder {
            mime_type: mime_type.to_string(),
            tracks: self.tracks.clone(),
            state: EncoderState::Inactive,
            chunks: Vec::new(),
            segment: 0,
            start_fails: self.encoder_start_fails,
        }))
    }

    fn stop_tracks(&mut self) {
        if !self.released {
            self.released = true;
            self.live_tracks.fetch_sub(self.tracks.len(), Ordering::SeqCst);
            tracing::debug!("Released virtual stream {}", self.id);
        }
    }

    fn is_active(&self) -> bool {
        !self.released
    }

    fn live_frame(&self) -> Option<EncodedPayload> {
        if self.released || !self.tracks.contains(&TrackKind::Video) {
            return None;
        }
        let sequence = self.frames_served.fetch_add(1, Ordering::Relaxed);
        let (width, height) = VIRTUAL_FRAME_SIZE;
        match frame::test_pattern(width, height, sequence) {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!("Virtual camera frame failed: {}", e);
                None
            }
        }
    }
}

impl Drop for VirtualStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// Emits one chunk per active segment, so pause/resume boundaries stay
/// visible in the finished payload
struct VirtualEncoder {
    mime_type: String,
    tracks: Vec<TrackKind>,
    state: EncoderState,
    chunks: Vec<Vec<u8>>,
    segment: usize,
    start_fails: bool,
}

impl VirtualEncoder {
    fn push_segment_chunk(&mut self) {
        let kinds: Vec<&str> = self
            .tracks
            .iter()
            .map(|t| match t {
                TrackKind::Audio => "audio",
                TrackKind::Video => "video",
            })
            .collect();
        self.chunks
            .push(format!("[segment {} {}]", self.segment, kinds.join("+")).into_bytes());
        self.segment += 1;
    }
}

#[async_trait]
impl MediaEncoder for VirtualEncoder {
    fn state(&self) -> EncoderState {
        self.state
    }

    async fn start(&mut self) -> CaptureResult<()> {
        if self.state != EncoderState::Inactive {
            return Err(CaptureError::InvalidState("already started".to_string()));
        }
        if self.start_fails {
            return Err(CaptureError::Capture("virtual encoder failed to start".to_string()));
        }
        self.chunks.clear();
        self.segment = 0;
        self.push_segment_chunk();
        self.state = EncoderState::Recording;
        Ok(())
    }

    async fn pause(&mut self) -> CaptureResult<()> {
        if self.state != EncoderState::Recording {
            return Err(CaptureError::InvalidState("not recording".to_string()));
        }
        self.state = EncoderState::Paused;
        Ok(())
    }

    async fn resume(&mut self) -> CaptureResult<()> {
        if self.state != EncoderState::Paused {
            return Err(CaptureError::InvalidState("not paused".to_string()));
        }
        self.push_segment_chunk();
        self.state = EncoderState::Recording;
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<EncodedPayload> {
        if self.state == EncoderState::Inactive {
            return Err(CaptureError::InvalidState("inactive".to_string()));
        }
        self.state = EncoderState::Inactive;

        let mut bytes = WEBM_MAGIC.to_vec();
        for chunk in self.chunks.drain(..) {
            bytes.extend(chunk);
        }
        Ok(EncodedPayload::new(self.mime_type.clone(), bytes))
    }
}
