//! Key/value persistence underneath an [`IndexedRecordStore`](crate::store::IndexedRecordStore).
//!
//! A backend only knows get / put / delete by key. It offers no secondary
//! lookup and no multi-key transaction; the store layers both on top.
//!
//! Two implementations ship here:
//! - [`MemoryBackend`]: in-process map, with fault injection for tests.
//! - [`FileBackend`]: one JSON file per key under a directory, written with
//!   the `.tmp` + rename pattern so a crash never leaves a torn value.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{backend_io, BackendError};
use crate::lockfile::LockFile;

/// Lock file guarding writes to a [`FileBackend`] directory. Never a key file.
pub const LOCK_FILE: &str = ".lock";

/// Durable key -> bytes map with read-your-writes semantics.
pub trait StateBackend: Send + Sync + fmt::Debug {
    /// Returns `None` if the key has never been written or was deleted.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), BackendError>;

    /// Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Exclusive hold over every handle on the same storage, in any process.
    /// `None` when the storage is private to this handle.
    fn lock_exclusive(&self) -> Result<Option<LockFile>, BackendError> {
        Ok(None)
    }
}

/// Type-erased backend handle shared by a store and its owner.
pub type SharedBackend = Arc<dyn StateBackend>;

impl<T: StateBackend + ?Sized> StateBackend for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        (**self).delete(key)
    }

    fn lock_exclusive(&self) -> Result<Option<LockFile>, BackendError> {
        (**self).lock_exclusive()
    }
}

// ---------------------------------------------------------------------------
// 1. In-memory backend
// ---------------------------------------------------------------------------

/// Backend operation targeted by an injected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Get,
    Put,
    Delete,
}

#[derive(Debug)]
struct Fault {
    op: FaultOp,
    key_prefix: String,
    remaining: usize,
}

/// In-process backend. Cheap to construct; state dies with the value.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `op` on keys starting with `key_prefix`
    /// fail with [`BackendError::Unavailable`]. An empty prefix matches all keys.
    pub fn fail_next(&self, op: FaultOp, key_prefix: impl Into<String>, times: usize) {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        faults.push(Fault {
            op,
            key_prefix: key_prefix.into(),
            remaining: times,
        });
    }

    /// Disarm every pending fault.
    pub fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Raw keys currently held, sorted. Includes the index key.
    pub fn raw_keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn trip(&self, op: FaultOp, key: &str) -> Result<(), BackendError> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let hit = faults
            .iter_mut()
            .find(|f| f.op == op && f.remaining > 0 && key.starts_with(&f.key_prefix));
        if let Some(fault) = hit {
            fault.remaining -= 1;
            faults.retain(|f| f.remaining > 0);
            return Err(BackendError::Unavailable(format!(
                "injected {op:?} fault on '{key}'"
            )));
        }
        Ok(())
    }
}

impl StateBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.trip(FaultOp::Get, key)?;
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        self.trip(FaultOp::Put, key)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.trip(FaultOp::Delete, key)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 2. File backend
// ---------------------------------------------------------------------------

/// Directory-backed store: `<root>/<hex(key)>.json`, mode `0600`.
///
/// Keys are hex-encoded so any byte sequence maps to a portable file name.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Does no I/O; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<hex(key)>.json`: pure, no I/O.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", hex::encode(key.as_bytes())))
    }

    fn ensure_root(&self) -> Result<(), BackendError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| backend_io(&self.root, e))?;
            set_dir_permissions(&self.root)?;
        }
        Ok(())
    }
}

impl StateBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(backend_io(path, err)),
        }
    }

    /// Write flow: bytes -> `.json.tmp` sibling -> `chmod 0600` -> `rename`.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        self.ensure_root()?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|e| backend_io(&tmp, e))?;
        set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, &path).map_err(|e| backend_io(&path, e))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(backend_io(path, err)),
        }
    }

    /// `<root>/.lock`. Every process opening this directory contends on it.
    fn lock_exclusive(&self) -> Result<Option<LockFile>, BackendError> {
        self.ensure_root()?;
        LockFile::acquire(self.root.join(LOCK_FILE)).map(Some)
    }
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), BackendError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| backend_io(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), BackendError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), BackendError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| backend_io(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), BackendError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_put_get_delete() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("a").unwrap(), None);
        backend.put("a", b"1").unwrap();
        assert_eq!(backend.get("a").unwrap(), Some(b"1".to_vec()));
        backend.delete("a").unwrap();
        assert_eq!(backend.get("a").unwrap(), None);
        backend.delete("a").expect("deleting an absent key succeeds");
    }

    #[test]
    fn injected_fault_fires_once_then_clears() {
        let backend = MemoryBackend::new();
        backend.fail_next(FaultOp::Put, "V", 1);

        let err = backend.put("V1", b"x").unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        backend.put("V1", b"x").expect("fault consumed");
    }

    #[test]
    fn fault_prefix_only_matches_prefixed_keys() {
        let backend = MemoryBackend::new();
        backend.fail_next(FaultOp::Put, "_index", 1);
        backend.put("V1", b"x").expect("unrelated key unaffected");
        assert!(backend.put("_index", b"[]").is_err());
    }

    #[test]
    fn file_backend_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(tmp.path().join("vessels"));
        assert_eq!(backend.get("V1").unwrap(), None);

        backend.put("V1", br#"{"a":1}"#).unwrap();
        assert_eq!(backend.get("V1").unwrap(), Some(br#"{"a":1}"#.to_vec()));

        backend.delete("V1").unwrap();
        assert_eq!(backend.get("V1").unwrap(), None);
    }

    #[test]
    fn file_backend_hex_encodes_keys() {
        let backend = FileBackend::new("/stores/vessels");
        let path = backend.path_for("../escape");
        assert_eq!(path.parent(), Some(Path::new("/stores/vessels")));
        assert!(path.ends_with("2e2e2f657363617065.json"));
    }

    #[test]
    fn only_file_backend_hands_out_a_shared_lock() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(tmp.path().join("vessels"));
        let lock = backend.lock_exclusive().unwrap().expect("file lock");
        assert_eq!(lock.path(), tmp.path().join("vessels").join(LOCK_FILE));
        assert!(MemoryBackend::new().lock_exclusive().unwrap().is_none());
    }

    #[test]
    fn file_backend_cleans_up_tmp() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::new(tmp.path());
        backend.put("V1", b"{}").unwrap();
        let tmp_path = backend.path_for("V1").with_extension("json.tmp");
        assert!(!tmp_path.exists(), ".tmp must be gone after successful put");
    }
}
