//! Controller errors

use crate::capture::{CaptureError, RecordingMode};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudioError {
    /// Permission denied or no device. The cause is only logged.
    #[error("Capture unavailable")]
    CaptureUnavailable,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: &'static str },

    #[error("Cannot switch to {0} mode during a capture session")]
    ModeLocked(RecordingMode),

    #[error("No preview available")]
    NoPreview,

    #[error("Payload conversion failed: {0}")]
    Conversion(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StudioResult<T> = Result<T, StudioError>;
