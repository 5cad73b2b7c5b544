//! Recording store
//!
//! Keeps finished recordings in creation order and mirrors the list into
//! durable key-value storage after every append.

pub mod download;
pub mod library;
pub mod recording;
pub mod storage;

pub use library::RecordingStore;
pub use recording::Recording;
pub use storage::{FileStore, KeyValueStore, MemoryStore};

use crate::capture::payload::DataUrlError;
use thiserror::Error;

/// Store-related errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    Encoding(#[from] DataUrlError),

    #[error("No recording at position {index} (have {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type StoreResult<T> = Result<T, StoreError>;
