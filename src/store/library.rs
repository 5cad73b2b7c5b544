//! Ordered, persisted list of finished recordings

use super::recording::Recording;
use super::storage::KeyValueStore;
use super::{StoreError, StoreResult};
use std::sync::Arc;

/// Append-only recording list mirrored into key-value storage.
///
/// After every successful append the persisted list has the same length
/// and contents as the in-memory one.
pub struct RecordingStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    recordings: Vec<Recording>,
}

impl RecordingStore {
    /// Load the list stored under `key`. A missing key is an empty list.
    pub fn open(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> StoreResult<Self> {
        let key = key.into();
        let recordings = match storage.get_item(&key)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };

        tracing::info!("Loaded {} recordings from '{}'", recordings.len(), key);
        Ok(Self {
            storage,
            key,
            recordings,
        })
    }

    /// Append a recording and persist the whole list.
    ///
    /// Returns the 0-based position. If persisting fails the in-memory list
    /// is left as it was.
    pub fn append(&mut self, recording: Recording) -> StoreResult<usize> {
        self.recordings.push(recording);

        if let Err(e) = self.persist() {
            self.recordings.pop();
            tracing::error!("Failed to persist recordings: {}", e);
            return Err(e);
        }

        let index = self.recordings.len() - 1;
        tracing::debug!("Appended recording #{} ({} total)", index + 1, self.recordings.len());
        Ok(index)
    }

    fn persist(&self) -> StoreResult<()> {
        let json = serde_json::to_string(&self.recordings)?;
        self.storage.set_item(&self.key, &json)
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    pub fn get(&self, index: usize) -> StoreResult<&Recording> {
        self.recordings.get(index).ok_or(StoreError::IndexOutOfRange {
            index,
            len: self.recordings.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RecordingMode;
    use crate::store::storage::MemoryStore;
    use chrono::Utc;

    /// Storage that refuses every write
    struct FullStorage;

    impl KeyValueStore for FullStorage {
        fn get_item(&self, _key: &str) -> StoreResult<Option<String>> {
            Ok(None)
        }

        fn set_item(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "quota exceeded",
            )))
        }

        fn remove_item(&self, _key: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    fn recording(n: u64) -> Recording {
        Recording::new(
            format!("data:audio/webm;base64,{}", n),
            RecordingMode::Audio,
            Utc::now(),
            n,
        )
    }

    #[test]
    fn test_persisted_list_matches_memory() {
        let storage = Arc::new(MemoryStore::new());
        let mut store = RecordingStore::open(storage.clone(), "recordings").unwrap();

        for n in 0..3 {
            let index = store.append(recording(n)).unwrap();
            assert_eq!(index, n as usize);

            let raw = storage.get_item("recordings").unwrap().unwrap();
            let persisted: Vec<Recording> = serde_json::from_str(&raw).unwrap();
            assert_eq!(persisted, store.recordings());
        }
    }

    #[test]
    fn test_reopen_keeps_order() {
        let storage = Arc::new(MemoryStore::new());
        {
            let mut store = RecordingStore::open(storage.clone(), "recordings").unwrap();
            store.append(recording(1)).unwrap();
            store.append(recording(2)).unwrap();
        }
        let store = RecordingStore::open(storage, "recordings").unwrap();
        let durations: Vec<u64> = store.recordings().iter().map(|r| r.duration).collect();
        assert_eq!(durations, vec![1, 2]);
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let mut store = RecordingStore::open(Arc::new(FullStorage), "recordings").unwrap();
        assert!(store.append(recording(1)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_list_is_an_error() {
        let storage = Arc::new(MemoryStore::new());
        storage.set_item("recordings", "not json").unwrap();
        assert!(matches!(
            RecordingStore::open(storage, "recordings"),
            Err(StoreError::Json(_))
        ));
    }

    #[test]
    fn test_get_out_of_range() {
        let store = RecordingStore::open(Arc::new(MemoryStore::new()), "recordings").unwrap();
        assert!(matches!(
            store.get(0),
            Err(StoreError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }
}
