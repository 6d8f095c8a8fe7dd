//! Result store: the last OCR result, a loading flag, and an error.
//!
//! [`ResultStore`] is an explicit object handed to whoever needs it; there
//! is no global. Readers call [`ResultStore::subscribe`] and get a
//! `tokio::sync::watch` receiver that changes on every mutation
//! (last write wins).
//!
//! Persistence is confined to the [`StateStorage`] boundary. Every mutation
//! saves the full state; startup loads it once. The saved shape is
//! versioned, and anything that does not parse as the current version is
//! discarded in favour of the default state.
//!
//! ```text
//! set_data ────┐
//! set_loading ─┼──▶ watch::Sender<ResultState> ──▶ subscribers
//! set_error ───┤              │
//! reset ───────┘              └──▶ StateStorage::save (JSON, atomic)
//! ```

use crate::error::OcrError;
use crate::output::OcrResponse;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Version tag written alongside the persisted state.
pub const STATE_VERSION: u32 = 1;

/// File name of the persisted state inside the data directory.
pub const STATE_FILE_NAME: &str = "ocr-storage.json";

/// Snapshot of the store.
///
/// `is_loading` and `error` are never both set after a mutator returns;
/// `data` and `error` may coexist while a new request is failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultState {
    pub data: Option<OcrResponse>,
    pub is_loading: bool,
    pub error: Option<String>,
}

// ── Persistence boundary ─────────────────────────────────────────────────

/// Durable home of the serialised [`ResultState`].
pub trait StateStorage: Send + Sync {
    /// Read the persisted state.
    ///
    /// Returns the default state when nothing was saved yet or when the
    /// saved shape does not match the current version.
    fn load(&self) -> Result<ResultState, OcrError>;

    /// Replace the persisted state.
    fn save(&self, state: &ResultState) -> Result<(), OcrError>;
}

#[derive(Serialize)]
struct PersistedRef<'a> {
    version: u32,
    state: &'a ResultState,
}

#[derive(Deserialize)]
struct Persisted {
    version: u32,
    state: ResultState,
}

/// Serialise a state in the versioned envelope.
pub fn encode_state(state: &ResultState) -> Result<String, OcrError> {
    serde_json::to_string(&PersistedRef {
        version: STATE_VERSION,
        state,
    })
    .map_err(|e| OcrError::Internal(format!("state serialisation: {e}")))
}

/// Parse a versioned envelope, or `None` if it is not the current shape.
///
/// A persisted `is_loading = true` means a previous run died mid-upload;
/// uploads cannot be resumed, so the flag is cleared.
pub fn decode_state(raw: &str) -> Option<ResultState> {
    match serde_json::from_str::<Persisted>(raw) {
        Ok(p) if p.version == STATE_VERSION => {
            let mut state = p.state;
            if state.is_loading {
                debug!("Clearing stale loading flag from persisted state");
                state.is_loading = false;
            }
            Some(state)
        }
        Ok(p) => {
            warn!(
                "Persisted state has version {}, expected {}; starting empty",
                p.version, STATE_VERSION
            );
            None
        }
        Err(e) => {
            warn!("Persisted state is unreadable ({}); starting empty", e);
            None
        }
    }
}

/// Default location of the state file: `<data_local_dir>/ocr-scanner/ocr-storage.json`,
/// or `./.ocr-storage.json` when the platform has no data directory.
pub fn default_state_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("ocr-scanner").join(STATE_FILE_NAME),
        None => PathBuf::from(format!(".{STATE_FILE_NAME}")),
    }
}

/// JSON file storage with atomic replacement (temp file + rename).
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStorage for FileStorage {
    fn load(&self) -> Result<ResultState, OcrError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(decode_state(&raw).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}", self.path.display());
                Ok(ResultState::default())
            }
            Err(e) => Err(OcrError::StateReadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn save(&self, state: &ResultState) -> Result<(), OcrError> {
        let write_err = |source: std::io::Error| OcrError::StateWriteFailed {
            path: self.path.clone(),
            source,
        };

        let encoded = encode_state(state)?;
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(encoded.as_bytes()).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!("Saved state to {} ({} bytes)", self.path.display(), encoded.len());
        Ok(())
    }
}

/// In-process storage holding the serialised envelope.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-serialised envelope.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    /// The last saved envelope, if any.
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|s| s.clone())
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> Result<ResultState, OcrError> {
        Ok(self
            .raw()
            .and_then(|raw| decode_state(&raw))
            .unwrap_or_default())
    }

    fn save(&self, state: &ResultState) -> Result<(), OcrError> {
        let encoded = encode_state(state)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| OcrError::Internal("state slot poisoned".into()))?;
        *slot = Some(encoded);
        Ok(())
    }
}

// ── Store ────────────────────────────────────────────────────────────────

/// The single state cell for one process.
pub struct ResultStore {
    tx: watch::Sender<ResultState>,
    storage: Box<dyn StateStorage>,
}

impl ResultStore {
    /// Rehydrate from `storage`.
    pub fn open(storage: impl StateStorage + 'static) -> Result<Self, OcrError> {
        let initial = storage.load()?;
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            tx,
            storage: Box::new(storage),
        })
    }

    /// A store backed by a fresh [`MemoryStorage`].
    pub fn in_memory() -> Self {
        let (tx, _rx) = watch::channel(ResultState::default());
        Self {
            tx,
            storage: Box::new(MemoryStorage::new()),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ResultState {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<ResultState> {
        self.tx.subscribe()
    }

    /// Store a new result, replacing the old one, and clear any error.
    pub fn set_data(&self, data: OcrResponse) -> Result<(), OcrError> {
        self.update(|s| {
            s.data = Some(data);
            s.error = None;
        })
    }

    pub fn set_loading(&self, loading: bool) -> Result<(), OcrError> {
        self.update(|s| s.is_loading = loading)
    }

    /// Record a failure and clear the loading flag.
    pub fn set_error(&self, message: impl Into<String>) -> Result<(), OcrError> {
        let message = message.into();
        self.update(|s| {
            s.error = Some(message);
            s.is_loading = false;
        })
    }

    /// Start over: back to the initial empty state.
    pub fn reset(&self) -> Result<(), OcrError> {
        self.update(|s| *s = ResultState::default())
    }

    /// Apply `f` in memory, notify subscribers, then persist.
    ///
    /// The in-memory state changes even when saving fails.
    fn update(&self, f: impl FnOnce(&mut ResultState)) -> Result<(), OcrError> {
        self.tx.send_modify(f);
        let state = self.tx.borrow();
        self.storage.save(&state)
    }
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("state", &*self.tx.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OcrPage;

    fn response(pages: usize) -> OcrResponse {
        OcrResponse {
            pages: (0..pages)
                .map(|i| OcrPage {
                    index: i as u32,
                    markdown: format!("page {i}"),
                    images: vec![],
                    dimensions: None,
                })
                .collect(),
            model: "mistral-ocr-test".into(),
            usage_info: None,
        }
    }

    #[test]
    fn starts_empty() {
        let store = ResultStore::in_memory();
        assert_eq!(store.snapshot(), ResultState::default());
    }

    #[test]
    fn set_error_clears_loading() {
        let store = ResultStore::in_memory();
        store.set_loading(true).unwrap();
        store.set_error("x").unwrap();
        let s = store.snapshot();
        assert!(!s.is_loading);
        assert_eq!(s.error.as_deref(), Some("x"));
    }

    #[test]
    fn set_data_clears_error() {
        let store = ResultStore::in_memory();
        store.set_error("old failure").unwrap();
        store.set_data(response(2)).unwrap();
        let s = store.snapshot();
        assert_eq!(s.error, None);
        assert_eq!(s.data.map(|d| d.page_count()), Some(2));
    }

    #[test]
    fn set_data_replaces_wholesale() {
        let store = ResultStore::in_memory();
        store.set_data(response(3)).unwrap();
        store.set_data(response(1)).unwrap();
        assert_eq!(store.snapshot().data.map(|d| d.page_count()), Some(1));
    }

    #[test]
    fn reset_restores_initial_tuple() {
        let store = ResultStore::in_memory();
        store.set_data(response(1)).unwrap();
        store.set_loading(true).unwrap();
        store.set_error("boom").unwrap();
        store.set_loading(true).unwrap();
        store.reset().unwrap();
        let s = store.snapshot();
        assert_eq!(s.data, None);
        assert!(!s.is_loading);
        assert_eq!(s.error, None);
    }

    #[test]
    fn subscribers_see_changes() {
        let store = ResultStore::in_memory();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());
        store.set_loading(true).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_loading);
    }

    #[test]
    fn every_mutation_is_persisted() {
        let storage = std::sync::Arc::new(MemoryStorage::new());
        let store = ResultStore::open(SharedMemory(storage.clone())).unwrap();
        store.set_data(response(2)).unwrap();
        let saved = decode_state(&storage.raw().unwrap()).unwrap();
        assert_eq!(saved.data.map(|d| d.page_count()), Some(2));

        store.reset().unwrap();
        let saved = decode_state(&storage.raw().unwrap()).unwrap();
        assert_eq!(saved, ResultState::default());
    }

    #[test]
    fn decode_rejects_other_versions_and_shapes() {
        assert!(decode_state(r#"{"version":2,"state":{"data":null,"is_loading":false,"error":null}}"#).is_none());
        assert!(decode_state(r#"{"data":null,"isLoading":false}"#).is_none());
        assert!(decode_state("not json").is_none());
    }

    #[test]
    fn decode_clears_stale_loading() {
        let raw = r#"{"version":1,"state":{"data":null,"is_loading":true,"error":null}}"#;
        assert!(!decode_state(raw).unwrap().is_loading);
    }

    #[test]
    fn mismatched_storage_falls_back_to_default() {
        let store = ResultStore::open(MemoryStorage::with_raw(r#"{"state":{"data":42}}"#)).unwrap();
        assert_eq!(store.snapshot(), ResultState::default());
    }

    #[test]
    fn file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(STATE_FILE_NAME);

        let store = ResultStore::open(FileStorage::new(&path)).unwrap();
        store.set_data(response(2)).unwrap();
        store.set_error("network down").unwrap();

        let reopened = ResultStore::open(FileStorage::new(&path)).unwrap();
        let s = reopened.snapshot();
        assert_eq!(s.data.map(|d| d.page_count()), Some(2));
        assert_eq!(s.error.as_deref(), Some("network down"));
    }

    #[test]
    fn file_storage_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("absent.json"));
        assert_eq!(storage.load().unwrap(), ResultState::default());
    }

    /// Lets a test keep a handle on the storage the store owns.
    struct SharedMemory(std::sync::Arc<MemoryStorage>);

    impl StateStorage for SharedMemory {
        fn load(&self) -> Result<ResultState, OcrError> {
            self.0.load()
        }
        fn save(&self, state: &ResultState) -> Result<(), OcrError> {
            self.0.save(state)
        }
    }
}
