//! The persisted recording entity

use crate::capture::payload::{extension_for_mime, EncodedPayload};
use crate::capture::RecordingMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A finished take, immutable once created.
///
/// Field names match the stored list format:
/// `{ "data", "type", "timestamp", "duration" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    /// `data:<mime>;base64,...` URL of the encoded payload
    pub data: String,

    #[serde(rename = "type")]
    pub mode: RecordingMode,

    pub timestamp: DateTime<Utc>,

    /// Duration in whole seconds, as counted by the studio timer
    #[serde(default)]
    pub duration: u64,
}

impl Recording {
    pub fn new(data: String, mode: RecordingMode, timestamp: DateTime<Utc>, duration: u64) -> Self {
        Self {
            data,
            mode,
            timestamp,
            duration,
        }
    }

    /// MIME type carried in the data URL header
    pub fn mime_type(&self) -> Option<&str> {
        let (header, _) = self.data.strip_prefix("data:")?.rsplit_once(',')?;
        Some(header.split(';').next().unwrap_or(header))
    }

    /// `recording_<position>.<ext>` for a 1-based list position
    pub fn download_name(&self, position: usize) -> String {
        let ext = extension_for_mime(self.mime_type().unwrap_or_default());
        format!("recording_{}.{}", position, ext)
    }

    /// Decode the stored payload
    pub fn payload(&self) -> Result<EncodedPayload, crate::capture::payload::DataUrlError> {
        EncodedPayload::from_data_url(&self.data)
    }
}
