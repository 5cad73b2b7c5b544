//! Materialize stored recordings as files

use super::recording::Recording;
use super::StoreResult;
use std::fs;
use std::path::{Path, PathBuf};

/// Write `recording` into `dir` as `recording_<position>.<ext>`.
///
/// An existing file is never overwritten; a ` (n)` suffix is added instead.
pub fn save_recording(recording: &Recording, position: usize, dir: &Path) -> StoreResult<PathBuf> {
    let payload = recording.payload()?;
    fs::create_dir_all(dir)?;

    let path = unique_path(dir, &recording.download_name(position));
    fs::write(&path, &payload.bytes)?;

    tracing::info!("Downloaded {} bytes to {:?}", payload.len(), path);
    Ok(path)
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (file_name, String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
