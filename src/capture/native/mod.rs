//! Native device capture
//!
//! Microphone through cpal, camera through nokhwa. Audio-only sessions
//! produce a WAV payload, video sessions are muxed into webm by FFmpeg.

pub mod camera;
pub mod microphone;

use super::error::{CaptureError, CaptureResult};
use super::payload::EncodedPayload;
use super::traits::{
    CaptureBackend, EncoderState, MediaConstraints, MediaEncoder, MediaStream, TrackKind,
};
use async_trait::async_trait;
use camera::{CameraCapture, LatestFrame};
use microphone::MicrophoneCapture;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Capture backend using the host's real devices
pub struct NativeCaptureBackend {
    microphone_id: Option<String>,
    camera_id: Option<String>,
    fps: u32,
}

impl NativeCaptureBackend {
    pub fn new(microphone_id: Option<String>, camera_id: Option<String>, fps: u32) -> Self {
        Self {
            microphone_id,
            camera_id,
            fps,
        }
    }
}

#[async_trait]
impl CaptureBackend for NativeCaptureBackend {
    fn name(&self) -> &str {
        "native"
    }

    async fn open_stream(&self, constraints: MediaConstraints) -> CaptureResult<Box<dyn MediaStream>> {
        let microphone_id = self.microphone_id.clone();
        let wants_video = constraints.video;

        // Device probing can block on platform permission prompts
        tokio::task::spawn_blocking(move || -> CaptureResult<()> {
            if microphone::find_input_device(microphone_id.as_deref()).is_none() {
                return Err(CaptureError::DeviceNotFound("No microphone".to_string()));
            }
            if wants_video {
                if !camera::camera_present() {
                    return Err(CaptureError::DeviceNotFound("No camera".to_string()));
                }
                if !camera::ffmpeg_available() {
                    return Err(CaptureError::Configuration(
                        "FFmpeg is required for video capture".to_string(),
                    ));
                }
            }
            Ok(())
        })
        .await
        .map_err(|e| CaptureError::Capture(format!("Device probe failed: {}", e)))??;

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(TrackKind::Audio);
        }
        if constraints.video {
            tracks.push(TrackKind::Video);
        }

        let stream = NativeStream {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
            microphone_id: self.microphone_id.clone(),
            camera_id: self.camera_id.clone(),
            fps: self.fps,
            released: Arc::new(AtomicBool::new(false)),
            latest_frame: LatestFrame::default(),
        };
        tracing::info!("Opened native stream {} ({:?})", stream.id, stream.tracks);
        Ok(Box::new(stream))
    }
}

struct NativeStream {
    id: String,
    tracks: Vec<TrackKind>,
    microphone_id: Option<String>,
    camera_id: Option<String>,
    fps: u32,
    released: Arc<AtomicBool>,
    latest_frame: LatestFrame,
}

impl MediaStream for NativeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<TrackKind> {
        if self.released.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            self.tracks.clone()
        }
    }

    fn create_encoder(&mut self, mime_type: &str) -> CaptureResult<Box<dyn MediaEncoder>> {
        if self.released.load(Ordering::SeqCst) {
            return Err(CaptureError::Capture("stream already stopped".to_string()));
        }
        Ok(Box::new(NativeEncoder {
            mime_type: mime_type.to_string(),
            microphone_id: self.tracks.contains(&TrackKind::Audio).then(|| self.microphone_id.clone()),
            camera_id: self.tracks.contains(&TrackKind::Video).then(|| self.camera_id.clone()),
            fps: self.fps,
            state: EncoderState::Inactive,
            paused: Arc::new(AtomicBool::new(false)),
            released: self.released.clone(),
            latest_frame: self.latest_frame.clone(),
            workdir: None,
            microphone: None,
            camera: None,
        }))
    }

    fn stop_tracks(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            tracing::info!("Released native stream {}", self.id);
        }
    }

    fn is_active(&self) -> bool {
        !self.released.load(Ordering::SeqCst)
    }

    fn live_frame(&self) -> Option<EncodedPayload> {
        if !self.is_active() {
            return None;
        }
        // Convert outside the lock so the camera thread never waits on it
        let buffer = self.latest_frame.lock().clone()?;
        match camera::preview_image(&buffer) {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::debug!("Skipping live frame: {}", e);
                None
            }
        }
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

struct NativeEncoder {
    mime_type: String,
    /// Outer `Some` means the track was requested
    microphone_id: Option<Option<String>>,
    camera_id: Option<Option<String>>,
    fps: u32,
    state: EncoderState,
    paused: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
    latest_frame: LatestFrame,
    workdir: Option<tempfile::TempDir>,
    microphone: Option<MicrophoneCapture>,
    camera: Option<CameraCapture>,
}

#[async_trait]
impl MediaEncoder for NativeEncoder {
    fn state(&self) -> EncoderState {
        self.state
    }

    async fn start(&mut self) -> CaptureResult<()> {
        if self.state != EncoderState::Inactive {
            return Err(CaptureError::InvalidState("already started".to_string()));
        }

        let workdir = tempfile::tempdir()?;
        self.paused.store(false, Ordering::SeqCst);

        if let Some(device) = self.microphone_id.clone() {
            let (paused, released) = (self.paused.clone(), self.released.clone());
            let capture = tokio::task::spawn_blocking(move || {
                MicrophoneCapture::spawn(device, paused, released)
            })
            .await
            .map_err(|e| CaptureError::Capture(e.to_string()))??;
            self.microphone = Some(capture);
        }

        if let Some(device) = self.camera_id.clone() {
            let (paused, released) = (self.paused.clone(), self.released.clone());
            let latest = self.latest_frame.clone();
            let dir = workdir.path().to_path_buf();
            let fps = self.fps;
            let capture = tokio::task::spawn_blocking(move || {
                CameraCapture::spawn(device, fps, &dir, paused, released, latest)
            })
            .await
            .map_err(|e| CaptureError::Capture(e.to_string()))??;
            self.camera = Some(capture);
        }

        self.workdir = Some(workdir);
        self.state = EncoderState::Recording;
        Ok(())
    }

    async fn pause(&mut self) -> CaptureResult<()> {
        if self.state != EncoderState::Recording {
            return Err(CaptureError::InvalidState("not recording".to_string()));
        }
        self.paused.store(true, Ordering::SeqCst);
        self.state = EncoderState::Paused;
        Ok(())
    }

    async fn resume(&mut self) -> CaptureResult<()> {
        if self.state != EncoderState::Paused {
            return Err(CaptureError::InvalidState("not paused".to_string()));
        }
        self.paused.store(false, Ordering::SeqCst);
        self.state = EncoderState::Recording;
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<EncodedPayload> {
        if self.state == EncoderState::Inactive {
            return Err(CaptureError::InvalidState("inactive".to_string()));
        }
        self.state = EncoderState::Inactive;

        let microphone = self.microphone.take();
        let camera = self.camera.take();
        let workdir = self
            .workdir
            .take()
            .ok_or_else(|| CaptureError::InvalidState("no working directory".to_string()))?;
        let mime_type = self.mime_type.clone();

        tokio::task::spawn_blocking(move || finalize(microphone, camera, workdir, mime_type))
            .await
            .map_err(|e| CaptureError::Capture(e.to_string()))?
    }
}

fn finalize(
    microphone: Option<MicrophoneCapture>,
    camera: Option<CameraCapture>,
    workdir: tempfile::TempDir,
    mime_type: String,
) -> CaptureResult<EncodedPayload> {
    let audio = microphone.map(|m| m.finish()).transpose()?;

    let Some(camera) = camera else {
        let wav = audio.unwrap_or_default().to_wav()?;
        return Ok(EncodedPayload::new("audio/wav", wav));
    };

    let video_path = camera.finish()?;
    let Some(audio) = audio else {
        return Ok(EncodedPayload::new(mime_type, std::fs::read(&video_path)?));
    };

    let audio_path = workdir.path().join("microphone.wav");
    std::fs::write(&audio_path, audio.to_wav()?)?;
    let muxed_path = workdir.path().join("recording.webm");

    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(&video_path)
        .arg("-i")
        .arg(&audio_path)
        .args(["-c:v", "copy", "-c:a", "libopus", "-shortest"])
        .arg(&muxed_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(CaptureError::Capture(format!(
            "FFmpeg mux failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    tracing::info!("Muxed camera and microphone into {:?}", muxed_path);
    Ok(EncodedPayload::new(mime_type, std::fs::read(&muxed_path)?))
}
