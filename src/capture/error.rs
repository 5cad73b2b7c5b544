//! Capture errors

use thiserror::Error;

/// Static message shown whenever the platform refuses or lacks a device.
///
/// Permission denial and a missing device share this message.
pub const CAPTURE_UNAVAILABLE_MESSAGE: &str = "Permission denied or device not available.";

/// Errors raised by capture backends, streams and encoders
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Encoder is {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
