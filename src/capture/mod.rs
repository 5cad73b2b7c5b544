//! Device capture
//!
//! The platform capture API sits behind [`CaptureBackend`]. Two backends
//! ship: a synthetic one that always works, and a native one (feature
//! `native-capture`) driving the real microphone and camera.

pub mod error;
pub mod frame;
pub mod payload;
pub mod traits;
pub mod virtual_device;

#[cfg(feature = "native-capture")]
pub mod native;

pub use error::{CaptureError, CaptureResult, CAPTURE_UNAVAILABLE_MESSAGE};
pub use payload::EncodedPayload;
pub use traits::{
    CaptureBackend, EncoderState, MediaConstraints, MediaEncoder, MediaStream, RecordingMode,
    TrackKind,
};
pub use virtual_device::{VirtualCaptureBackend, VirtualDevices};

use crate::config::{CaptureBackendKind, CaptureConfig};
use std::sync::Arc;

/// Build the backend selected in the configuration
pub fn backend_from_config(config: &CaptureConfig) -> Arc<dyn CaptureBackend> {
    match config.backend {
        CaptureBackendKind::Virtual => Arc::new(VirtualCaptureBackend::default()),
        CaptureBackendKind::Native => {
            #[cfg(feature = "native-capture")]
            {
                Arc::new(native::NativeCaptureBackend::new(
                    config.microphone_id.clone(),
                    config.camera_id.clone(),
                    config.camera_fps,
                ))
            }

            #[cfg(not(feature = "native-capture"))]
            {
                tracing::warn!("Built without native capture, falling back to the virtual backend");
                Arc::new(VirtualCaptureBackend::default())
            }
        }
    }
}
