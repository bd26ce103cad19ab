//! Local record store
//!
//! Every piece of local state (id cache, drafts, bookmarks, scheduled posts)
//! is a [`RecordStore`]: one JSON file holding a versioned mapping of key to
//! record. Writes go to a temporary file in the same directory which is then
//! renamed over the committed file, so an interrupted write never leaves a
//! half-written store behind.
//!
//! There is no cross-process locking. Two invocations racing on the same
//! file resolve as last-rename-wins.

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{MoltError, Result, StoreError};

/// On-disk schema version understood by this build
pub const STORE_VERSION: u32 = 1;

/// Contents of a store file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreFile<K: Ord, V> {
    pub version: u32,

    /// Next id handed out by stores with sequential ids; never decremented
    #[serde(default = "default_next_id")]
    pub next_id: u64,

    pub records: BTreeMap<K, V>,
}

fn default_next_id() -> u64 {
    1
}

impl<K: Ord, V> Default for StoreFile<K, V> {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            next_id: default_next_id(),
            records: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> StoreFile<K, V> {
    /// Reserve the next sequential id
    ///
    /// The counter is kept above every integer key ever stored, so deleting
    /// the newest record does not cause its id to be handed out again.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }
}

impl<V> StoreFile<u64, V> {
    /// Allocate a record id above the counter and every stored key
    pub fn next_record_id(&mut self) -> u64 {
        if let Some(&max) = self.records.keys().next_back() {
            self.next_id = self.next_id.max(max + 1);
        }
        self.allocate_id()
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: Option<u32>,
}

/// A typed, file-backed mapping
pub struct RecordStore<K, V> {
    path: PathBuf,
    _records: PhantomData<fn() -> (K, V)>,
}

impl<K, V> RecordStore<K, V>
where
    K: Ord + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store
    ///
    /// A missing file is a fresh store. A file that cannot be parsed, or
    /// that was written with a different schema version, is reported as
    /// [`MoltError::CorruptStore`] and left untouched.
    pub fn load(&self) -> Result<StoreFile<K, V>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "store file missing, starting empty");
                return Ok(StoreFile::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                }
                .into())
            }
        };

        let probe: VersionProbe =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;
        match probe.version {
            Some(STORE_VERSION) => {}
            Some(found) => {
                return Err(self.corrupt(format!(
                    "unsupported store version {} (expected {})",
                    found, STORE_VERSION
                )))
            }
            None => return Err(self.corrupt("missing version tag")),
        }

        let data: StoreFile<K, V> =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;

        tracing::debug!(
            path = %self.path.display(),
            records = data.records.len(),
            "loaded store"
        );
        Ok(data)
    }

    /// Atomically replace the store file with `data`
    pub fn save(&self, data: &StoreFile<K, V>) -> Result<()> {
        let staged = self.stage(data)?;
        self.commit(staged)?;
        tracing::debug!(
            path = %self.path.display(),
            records = data.records.len(),
            "saved store"
        );
        Ok(())
    }

    /// Write `data` to a temporary file next to the store without touching
    /// the committed file. Dropping the result discards the write.
    pub(crate) fn stage(&self, data: &StoreFile<K, V>) -> Result<NamedTempFile> {
        let mut temp = create_temp_beside(&self.path)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, data).map_err(|source| {
                StoreError::Serialize {
                    path: self.path.clone(),
                    source,
                }
            })?;
            writer
                .write_all(b"\n")
                .and_then(|_| writer.flush())
                .map_err(|source| self.write_error(source))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|source| self.write_error(source))?;
        Ok(temp)
    }

    /// Rename a staged file over the committed store
    pub(crate) fn commit(&self, staged: NamedTempFile) -> Result<()> {
        persist(staged, &self.path, 0o644)
    }

    fn corrupt(&self, reason: impl Into<String>) -> MoltError {
        MoltError::CorruptStore {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn write_error(&self, source: std::io::Error) -> MoltError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
        .into()
    }
}

/// Atomically replace `path` with `contents`
///
/// Used for files that are not record stores, such as the config file.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut temp = create_temp_beside(path)?;
    temp.write_all(contents)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    persist(temp, path, mode)
}

fn create_temp_beside(path: &Path) -> Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let write_error = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(parent).map_err(write_error)?;
    let temp = tempfile::Builder::new()
        .prefix(".molt-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(write_error)?;
    Ok(temp)
}

#[cfg_attr(not(unix), allow(unused_variables))]
fn persist(temp: NamedTempFile, path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))
            .map_err(|source| StoreError::Write {
                path: path.to_path_buf(),
                source,
            })?;
    }

    temp.persist(path).map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    fn note(text: &str) -> Note {
        Note {
            text: text.to_string(),
        }
    }

    fn store_in(dir: &TempDir) -> RecordStore<u64, Note> {
        RecordStore::new(dir.path().join("notes.json"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let data = store.load().unwrap();
        assert!(data.records.is_empty());
        assert_eq!(data.version, STORE_VERSION);
        assert_eq!(data.next_id, 1);
    }

    #[test]
    fn test_roundtrip_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let data = StoreFile::default();
        store.save(&data).unwrap();
        assert_eq!(store.load().unwrap(), data);
    }

    #[test]
    fn test_roundtrip_single_and_multi() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut data = StoreFile::default();
        let id = data.allocate_id();
        data.records.insert(id, note("first"));
        store.save(&data).unwrap();
        assert_eq!(store.load().unwrap(), data);

        for text in ["second", "third", "fourth"] {
            let id = data.allocate_id();
            data.records.insert(id, note(text));
        }
        store.save(&data).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, data);
        assert_eq!(loaded.records.len(), 4);
        assert_eq!(loaded.next_id, 5);
    }

    #[test]
    fn test_string_keys_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store: RecordStore<String, Note> = RecordStore::new(dir.path().join("keyed.json"));

        let mut data = StoreFile::default();
        data.records.insert("b".to_string(), note("bee"));
        data.records.insert("a".to_string(), note("ay"));
        store.save(&data).unwrap();

        assert_eq!(store.load().unwrap(), data);
    }

    #[test]
    fn test_malformed_file_is_corrupt_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, MoltError::CorruptStore { .. }));

        // The bad file is left for the user to inspect
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_wrong_record_shape_is_corrupt_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"version": 1, "next_id": 2, "records": {"1": {"body": "x"}}}"#,
        )
        .unwrap();

        assert!(matches!(
            store.load().unwrap_err(),
            MoltError::CorruptStore { .. }
        ));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"version": 99, "next_id": 1, "records": {}}"#,
        )
        .unwrap();

        let err = store.load().unwrap_err();
        match err {
            MoltError::CorruptStore { reason, .. } => {
                assert!(reason.contains("99"), "unexpected reason: {}", reason)
            }
            other => panic!("Expected CorruptStore, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"records": {}}"#).unwrap();

        assert!(matches!(
            store.load().unwrap_err(),
            MoltError::CorruptStore { .. }
        ));
    }

    #[test]
    fn test_interrupted_write_keeps_committed_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut committed = StoreFile::default();
        let id = committed.allocate_id();
        committed.records.insert(id, note("committed"));
        store.save(&committed).unwrap();

        let mut next = committed.clone();
        let id = next.allocate_id();
        next.records.insert(id, note("never renamed"));

        // Simulate a crash after the temp file is written but before rename
        let staged = store.stage(&next).unwrap();
        assert!(staged.path().exists());
        assert_eq!(store.load().unwrap(), committed);
        drop(staged);

        assert_eq!(store.load().unwrap(), committed);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("notes.json")]);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store: RecordStore<u64, Note> =
            RecordStore::new(dir.path().join("nested").join("deeper").join("notes.json"));

        store.save(&StoreFile::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_allocate_id_is_monotonic() {
        let mut data: StoreFile<u64, Note> = StoreFile::default();
        let first = data.allocate_id();
        let second = data.allocate_id();
        data.records.remove(&second);
        let third = data.allocate_id();

        assert_eq!((first, second, third), (1, 2, 3));
    }

    #[test]
    fn test_next_record_id_skips_past_hand_edited_keys() {
        let mut data: StoreFile<u64, Note> = StoreFile::default();
        data.records.insert(41, note("imported"));

        assert_eq!(data.next_record_id(), 42);
        assert_eq!(data.next_record_id(), 43);
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        write_atomic(&path, b"one", 0o600).unwrap();
        write_atomic(&path, b"two", 0o600).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
