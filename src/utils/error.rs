//! Error types and handling
//!
//! Application-wide error aggregation and the shape errors take when they
//! cross into the frontend.

use crate::capture::{CaptureError, CAPTURE_UNAVAILABLE_MESSAGE};
use crate::recorder::StudioError;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Studio(#[from] StudioError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Configuration error: {0:#}")]
    Config(#[from] anyhow::Error),
}

/// Error response for frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Studio(StudioError::CaptureUnavailable) => "CAPTURE_UNAVAILABLE",
            AppError::Studio(StudioError::AlreadyRecording) => "ALREADY_RECORDING",
            AppError::Studio(StudioError::NotRecording) => "NOT_RECORDING",
            AppError::Studio(StudioError::InvalidTransition { .. }) => "INVALID_TRANSITION",
            AppError::Studio(StudioError::ModeLocked(_)) => "MODE_LOCKED",
            AppError::Studio(StudioError::NoPreview) => "NO_PREVIEW",
            AppError::Studio(StudioError::Conversion(_)) => "CONVERSION_ERROR",
            AppError::Studio(StudioError::Capture(_)) | AppError::Capture(_) => "CAPTURE_ERROR",
            AppError::Studio(StudioError::Store(_)) | AppError::Store(_) => "STORAGE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        };

        // The unavailable case always reads the same to the user
        let message = match &error {
            AppError::Studio(StudioError::CaptureUnavailable) => {
                CAPTURE_UNAVAILABLE_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        ErrorResponse {
            code: code.to_string(),
            message,
        }
    }
}

impl From<StudioError> for ErrorResponse {
    fn from(error: StudioError) -> Self {
        AppError::from(error).into()
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_unavailable_response() {
        let response = ErrorResponse::from(StudioError::CaptureUnavailable);
        assert_eq!(response.code, "CAPTURE_UNAVAILABLE");
        assert_eq!(response.message, CAPTURE_UNAVAILABLE_MESSAGE);
    }

    #[test]
    fn test_store_error_code() {
        let response = ErrorResponse::from(StudioError::Store(StoreError::IndexOutOfRange {
            index: 4,
            len: 1,
        }));
        assert_eq!(response.code, "STORAGE_ERROR");
        assert!(response.message.contains("position 4"));
    }
}
