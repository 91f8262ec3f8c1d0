//! Local layout persistence.
//!
//! `Persistence` owns the storage backend and the frame debounce. Mutations
//! call `schedule_persist`, which only raises a pending flag; the host then
//! calls `flush_frame` once per animation frame, so a burst of mutations
//! costs exactly one write carrying the latest state.
//!
//! When the backend fails its startup probe every operation becomes a no-op
//! for the rest of the session.

use pc_core::codec::{self, CodecError};
use pc_core::model::LayoutDocument;
use pc_core::ZoomBounds;
use std::collections::{HashMap, HashSet};

const PROBE_KEY: &str = "__product_canvas_probe__";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage backend: {0}")]
    Backend(String),
}

/// A string key/value store (`localStorage` in the browser).
pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-memory backend for native hosts and tests, with failure injection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    pub entries: HashMap<String, String>,
    pub fail_reads: bool,
    pub fail_writes: bool,
    /// Successful `set` calls, probe excluded.
    pub writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut storage = Self::default();
        storage.entries.insert(key.to_string(), value.to_string());
        storage
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads {
            return Err(StorageError::Unavailable);
        }
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::QuotaExceeded);
        }
        self.entries.insert(key.to_string(), value.to_string());
        if key != PROBE_KEY {
            self.writes += 1;
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable);
        }
        self.entries.remove(key);
        Ok(())
    }
}

/// Whether `backend` accepts a write-then-remove round trip.
pub fn probe<S: StorageBackend>(backend: &mut S) -> bool {
    match backend
        .set(PROBE_KEY, PROBE_KEY)
        .and_then(|()| backend.remove(PROBE_KEY))
    {
        Ok(()) => true,
        Err(e) => {
            log::warn!("local storage unavailable, layout will not persist: {e}");
            false
        }
    }
}

pub struct Persistence<S: StorageBackend> {
    backend: S,
    available: bool,
    key: String,
    bounds: ZoomBounds,
    pending: bool,
}

impl<S: StorageBackend> Persistence<S> {
    /// Wrap a backend, probing it once.
    pub fn new(mut backend: S, key: impl Into<String>, bounds: ZoomBounds) -> Self {
        let available = probe(&mut backend);
        Self {
            backend,
            available,
            key: key.into(),
            bounds,
            pending: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    /// Load the stored layout and prune ids not in `known`.
    ///
    /// Never fails: missing, unreadable or malformed data yields an empty
    /// document. When pruning changed anything the cleaned document is
    /// written back at once.
    pub fn read(&mut self, known: &HashSet<String>) -> LayoutDocument {
        if !self.available {
            return LayoutDocument::default();
        }
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LayoutDocument::default(),
            Err(e) => {
                log::error!("reading {}: {e}", self.key);
                return LayoutDocument::default();
            }
        };
        let mut doc = match codec::decode(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("discarding stored layout {}: {e}", self.key);
                return LayoutDocument::default();
            }
        };
        codec::sanitize(&mut doc, self.bounds);
        if codec::prune(&mut doc, known) {
            log::debug!("pruned stale entries from {}, rewriting", self.key);
            self.write(&doc);
        }
        doc
    }

    /// Sanitize, serialize and store. Failures are logged, never raised.
    pub fn write(&mut self, doc: &LayoutDocument) -> bool {
        if !self.available {
            return false;
        }
        match self.try_write(doc) {
            Ok(()) => true,
            Err(e) => {
                log::error!("writing {}: {e}", self.key);
                false
            }
        }
    }

    fn try_write(&mut self, doc: &LayoutDocument) -> Result<(), PersistError> {
        let raw = codec::encode(doc, self.bounds)?;
        self.backend.set(&self.key, &raw)?;
        log::trace!("wrote {} bytes to {}", raw.len(), self.key);
        Ok(())
    }

    /// Mark the layout dirty. Returns `true` when the caller must request an
    /// animation frame, i.e. no flush was already pending.
    pub fn schedule_persist(&mut self) -> bool {
        if !self.available || self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Frame callback: write `doc` if a persist is pending.
    pub fn flush_frame(&mut self, doc: &LayoutDocument) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.write(doc)
    }
}

#[derive(Debug, thiserror::Error)]
enum PersistError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_core::model::NodeTransform;
    use pretty_assertions::assert_eq;

    const KEY: &str = "layout";

    fn known(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn doc_at(left: f64) -> LayoutDocument {
        let mut doc = LayoutDocument::default();
        doc.objects.insert("1".into(), NodeTransform::new(left, 0.0, 1.0));
        doc
    }

    #[test]
    fn read_missing_key_is_empty() {
        let mut p = Persistence::new(MemoryStorage::new(), KEY, ZoomBounds::default());
        assert!(p.read(&known(&["1"])).is_empty());
    }

    #[test]
    fn read_malformed_is_empty_and_not_rewritten() {
        let mut p = Persistence::new(
            MemoryStorage::with_entry(KEY, "not json"),
            KEY,
            ZoomBounds::default(),
        );
        assert!(p.read(&known(&["1"])).is_empty());
        assert_eq!(p.backend().writes, 0);
    }

    #[test]
    fn read_rewrites_when_pruned() {
        let stored = r#"{"objects":{"1":{"left":1,"top":2,"scaleX":1,"scaleY":1},"9":{"left":0,"top":0,"scaleX":1,"scaleY":1}},"groups":[]}"#;
        let mut p = Persistence::new(MemoryStorage::with_entry(KEY, stored), KEY, ZoomBounds::default());
        let doc = p.read(&known(&["1"]));
        assert_eq!(doc.objects.len(), 1);
        assert_eq!(p.backend().writes, 1);
        assert!(!p.backend().raw(KEY).unwrap().contains("\"9\""));

        // Second read is already clean.
        p.read(&known(&["1"]));
        assert_eq!(p.backend().writes, 1);
    }

    #[test]
    fn burst_of_schedules_flushes_once_with_latest_state() {
        let mut p = Persistence::new(MemoryStorage::new(), KEY, ZoomBounds::default());
        let mut frames_requested = 0;
        let mut latest = LayoutDocument::default();
        for i in 0..50 {
            latest = doc_at(i as f64);
            if p.schedule_persist() {
                frames_requested += 1;
            }
        }
        assert_eq!(frames_requested, 1);
        assert!(p.flush_frame(&latest));
        assert!(!p.flush_frame(&latest));
        assert_eq!(p.backend().writes, 1);
        let stored = codec::decode(p.backend().raw(KEY).unwrap()).unwrap();
        assert_eq!(stored.objects["1"].left, 49.0);
    }

    #[test]
    fn failing_write_is_swallowed() {
        let mut p = Persistence::new(MemoryStorage::new(), KEY, ZoomBounds::default());
        p.backend_mut().fail_writes = true;
        assert!(!p.write(&doc_at(1.0)));
        p.backend_mut().fail_writes = false;
        assert!(p.write(&doc_at(1.0)));
    }

    #[test]
    fn unavailable_storage_disables_everything() {
        let storage = MemoryStorage {
            fail_writes: true,
            ..MemoryStorage::default()
        };
        let mut p = Persistence::new(storage, KEY, ZoomBounds::default());
        assert!(!p.is_available());
        assert!(!p.schedule_persist());
        assert!(!p.write(&doc_at(1.0)));
        assert!(p.read(&known(&["1"])).is_empty());
    }
}
