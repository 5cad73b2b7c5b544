//! Camera capture using nokhwa
//!
//! Frames are handed to an FFmpeg child process untouched, FFmpeg owns the
//! pixel format conversion and the webm container. The newest frame is also
//! kept for the live preview.

use crate::capture::error::{CaptureError, CaptureResult};
use crate::capture::frame::{self, JPEG_MIME};
use crate::capture::payload::EncodedPayload;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::{Buffer, Camera, NokhwaError};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

/// Whether FFmpeg can be launched
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Whether at least one camera is visible to nokhwa
pub fn camera_present() -> bool {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => !cameras.is_empty(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            false
        }
    }
}

/// Map a device id to a nokhwa index, numeric ids first
pub fn camera_index(device_id: Option<&str>) -> CameraIndex {
    match device_id {
        Some(id) => match id.parse::<u32>() {
            Ok(idx) => CameraIndex::Index(idx),
            Err(_) => CameraIndex::String(id.to_string()),
        },
        None => CameraIndex::Index(0),
    }
}

/// Newest camera frame, shared between the capture thread and the stream
pub type LatestFrame = Arc<Mutex<Option<Buffer>>>;

/// Open the camera at the configured rate, or at its highest resolution if
/// it has no mode for that rate
fn open_camera(index: &CameraIndex, fps: u32) -> Result<Camera, NokhwaError> {
    let preferred = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestFrameRate(fps.max(1)));
    match Camera::new(index.clone(), preferred) {
        Ok(camera) => Ok(camera),
        Err(e) => {
            tracing::debug!("Camera has no {}fps mode ({:?}), using its default", fps, e);
            let fallback =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
            Camera::new(index.clone(), fallback)
        }
    }
}

/// Rate FFmpeg stamps the piped frames with.
///
/// `Camera::frame` blocks once per delivered frame, so this is the rate the
/// camera negotiated. The configured rate is only a request.
pub fn input_frame_rate(format: &CameraFormat) -> u32 {
    format.frame_rate().max(1)
}

/// Turn a raw camera frame into an image the webview can show.
///
/// MJPEG frames already are JPEG images. Everything else is converted to
/// RGB and encoded as PNG.
pub fn preview_image(buffer: &Buffer) -> CaptureResult<EncodedPayload> {
    if buffer.source_frame_format() == FrameFormat::MJPEG {
        return Ok(EncodedPayload::new(JPEG_MIME, buffer.buffer().to_vec()));
    }
    let image = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| CaptureError::Capture(format!("Failed to decode camera frame: {:?}", e)))?;
    let (width, height) = (image.width(), image.height());
    frame::encode_png(width, height, &image.into_raw())
}

/// FFmpeg input arguments for a nokhwa frame format
fn ffmpeg_input_args(format: FrameFormat, width: u32, height: u32, fps: u32) -> Vec<String> {
    let size = format!("{width}x{height}");
    let rate = fps.to_string();
    let raw = |pix_fmt: &str| {
        vec![
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pixel_format".to_string(),
            pix_fmt.to_string(),
            "-video_size".to_string(),
            size.clone(),
            "-framerate".to_string(),
            rate.clone(),
        ]
    };

    match format {
        FrameFormat::MJPEG => vec![
            "-f".to_string(),
            "mjpeg".to_string(),
            "-framerate".to_string(),
            rate.clone(),
        ],
        FrameFormat::YUYV => raw("yuyv422"),
        FrameFormat::NV12 => raw("nv12"),
        FrameFormat::GRAY => raw("gray"),
        FrameFormat::RAWRGB => raw("rgb24"),
        other => {
            tracing::warn!("Unknown camera format {:?}, assuming yuyv422", other);
            raw("yuyv422")
        }
    }
}

/// A running camera capture thread writing a video-only webm
pub struct CameraCapture {
    running: Arc<AtomicBool>,
    output: PathBuf,
    handle: Option<JoinHandle<CaptureResult<()>>>,
}

impl CameraCapture {
    /// Open the camera and start FFmpeg. Blocks until frames are flowing.
    pub fn spawn(
        device_id: Option<String>,
        fps: u32,
        output_dir: &Path,
        paused: Arc<AtomicBool>,
        released: Arc<AtomicBool>,
        latest: LatestFrame,
    ) -> CaptureResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let output = output_dir.join("camera.webm");
        let (ready_tx, ready_rx) = mpsc::channel::<CaptureResult<()>>();

        let thread_running = running.clone();
        let thread_output = output.clone();
        let handle = std::thread::spawn(move || -> CaptureResult<()> {
            let index = camera_index(device_id.as_deref());

            let mut camera = match open_camera(&index, fps) {
                Ok(c) => c,
                Err(e) => {
                    let msg = format!("Failed to open camera {:?}: {:?}", index, e);
                    let _ = ready_tx.send(Err(CaptureError::DeviceNotFound(msg.clone())));
                    return Err(CaptureError::DeviceNotFound(msg));
                }
            };

            if let Err(e) = camera.open_stream() {
                let msg = format!("Failed to open camera stream: {:?}", e);
                let _ = ready_tx.send(Err(CaptureError::Capture(msg.clone())));
                return Err(CaptureError::Capture(msg));
            }

            let camera_format = camera.camera_format();
            let width = camera_format.resolution().width();
            let height = camera_format.resolution().height();
            let actual_fps = input_frame_rate(&camera_format);

            let mut args = vec!["-y".to_string(), "-loglevel".to_string(), "error".to_string()];
            args.extend(ffmpeg_input_args(camera_format.format(), width, height, actual_fps));
            args.extend(
                [
                    "-i",
                    "-",
                    "-c:v",
                    "libvpx",
                    "-deadline",
                    "realtime",
                    "-b:v",
                    "2M",
                    "-pix_fmt",
                    "yuv420p",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
            args.push(thread_output.to_string_lossy().to_string());

            let mut ffmpeg = match Command::new("ffmpeg")
                .args(&args)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()
            {
                Ok(p) => p,
                Err(e) => {
                    let _ = camera.stop_stream();
                    let msg = format!("Failed to start FFmpeg: {}", e);
                    let _ = ready_tx.send(Err(CaptureError::Configuration(msg.clone())));
                    return Err(CaptureError::Configuration(msg));
                }
            };

            tracing::info!(
                "Camera capture started: {}x{} @ {}fps ({:?}, requested {}fps)",
                width,
                height,
                actual_fps,
                camera_format.format(),
                fps
            );
            let _ = ready_tx.send(Ok(()));

            let mut frames: u64 = 0;
            if let Some(mut stdin) = ffmpeg.stdin.take() {
                while thread_running.load(Ordering::SeqCst) && !released.load(Ordering::SeqCst) {
                    match camera.frame() {
                        Ok(frame) => {
                            if !paused.load(Ordering::Relaxed) {
                                if stdin.write_all(frame.buffer()).is_err() {
                                    tracing::error!("FFmpeg closed its input early");
                                    break;
                                }
                                frames += 1;
                            }
                            // The preview stays live while paused
                            *latest.lock() = Some(frame);
                        }
                        Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
                    }
                }
                // Closing stdin lets FFmpeg finalize the container
                drop(stdin);
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {:?}", e);
            }
            latest.lock().take();

            let result = ffmpeg.wait_with_output()?;
            if !result.status.success() {
                return Err(CaptureError::Capture(format!(
                    "FFmpeg exited with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr)
                )));
            }

            tracing::info!("Camera capture stopped after {} frames", frames);
            Ok(())
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                running,
                output,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::Capture(
                    "Camera thread exited before frames started".to_string(),
                ))
            }
        }
    }

    /// Stop capturing and return the path of the finished video
    pub fn finish(mut self) -> CaptureResult<PathBuf> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| CaptureError::Capture("Camera thread panicked".to_string()))??;
        }
        Ok(self.output.clone())
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nokhwa::utils::Resolution;

    #[test]
    fn test_camera_index_parsing() {
        assert_eq!(camera_index(Some("2")), CameraIndex::Index(2));
        assert_eq!(
            camera_index(Some("/dev/video0")),
            CameraIndex::String("/dev/video0".to_string())
        );
        assert_eq!(camera_index(None), CameraIndex::Index(0));
    }

    #[test]
    fn test_ffmpeg_uses_negotiated_rate() {
        let negotiated = CameraFormat::new(Resolution::new(1280, 720), FrameFormat::MJPEG, 60);
        assert_eq!(input_frame_rate(&negotiated), 60);

        let unknown = CameraFormat::new(Resolution::new(640, 480), FrameFormat::YUYV, 0);
        assert_eq!(input_frame_rate(&unknown), 1);

        let args = ffmpeg_input_args(negotiated.format(), 1280, 720, input_frame_rate(&negotiated));
        assert_eq!(args, vec!["-f", "mjpeg", "-framerate", "60"]);
    }

    #[test]
    fn test_mjpeg_preview_is_passed_through() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9];
        let buffer = Buffer::new(Resolution::new(1, 1), &jpeg, FrameFormat::MJPEG);
        let image = preview_image(&buffer).unwrap();
        assert_eq!(image.mime_type, JPEG_MIME);
        assert_eq!(image.bytes, jpeg);
    }

    #[test]
    fn test_yuyv_preview_becomes_png() {
        // Two pixels sharing one chroma pair
        let buffer = Buffer::new(Resolution::new(2, 1), &[128, 128, 200, 128], FrameFormat::YUYV);
        let image = preview_image(&buffer).unwrap();
        assert_eq!(image.mime_type, frame::PNG_MIME);
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_mjpeg_input_is_not_raw() {
        let args = ffmpeg_input_args(FrameFormat::MJPEG, 640, 480, 30);
        assert_eq!(args[1], "mjpeg");
        let args = ffmpeg_input_args(FrameFormat::YUYV, 640, 480, 30);
        assert!(args.contains(&"640x480".to_string()));
    }
}
