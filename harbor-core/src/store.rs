//! Indexed record store: keyed records plus an ordered index of live keys.
//!
//! # Persisted layout
//!
//! ```text
//! <key>     -> {"version": 1, "record": { ... }}   (one entry per record)
//! "_index"  -> ["V1", "V7", "V3", ...]             (creation order)
//! ```
//!
//! The backend has no secondary lookup, so the index is the only way to
//! enumerate records; every attribute lookup is a full scan of it.
//!
//! # Invariant
//!
//! Every indexed key resolves to a record and every record is indexed.
//! Creates and deletes touch two backend keys. Every write runs its whole
//! read-modify-write under the writer lock: a process mutex plus, for
//! backends shared between processes, the backend's exclusive file lock.
//! When the second write fails the first is undone so the store is left as
//! it was before the call. If the undo also fails the
//! call returns [`StoreError::Inconsistent`] and [`IndexedRecordStore::check_integrity`]
//! will report the damage.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::StateBackend;
use crate::error::{BackendError, StoreError};
use crate::lockfile::LockFile;

/// Backend key holding the ordered index. Never a valid record key.
pub const INDEX_KEY: &str = "_index";

/// Envelope version written by this build.
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// An entity that can live in an [`IndexedRecordStore`].
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Human-readable entity name used in errors ("vessel", "berth booking").
    const KIND: &'static str;

    /// Primary key. Must be stable for the lifetime of the record.
    fn key(&self) -> &str;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    record: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    record: T,
}

/// Result of a read-modify-write through [`IndexedRecordStore::modify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T> {
    /// The record changed and was persisted.
    Written(T),
    /// The mutation was a no-op; nothing was written.
    Unchanged(T),
}

impl<T> WriteOutcome<T> {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            WriteOutcome::Written(record) | WriteOutcome::Unchanged(record) => record,
        }
    }
}

/// Findings of [`IndexedRecordStore::check_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Indexed keys with no stored record.
    pub dangling: Vec<String>,
    /// Keys that appear more than once in the index.
    pub duplicates: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.duplicates.is_empty()
    }
}

/// Held for the duration of one write. The file lock is released first.
struct WriterGuard<'a> {
    _shared: Option<LockFile>,
    _process: MutexGuard<'a, ()>,
}

/// Generic keyed store with a maintained creation-order index.
#[derive(Debug)]
pub struct IndexedRecordStore<T, B> {
    backend: B,
    writer: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record, B: StateBackend> IndexedRecordStore<T, B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            writer: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // -----------------------------------------------------------------------
    // 1. Provisioning and index access
    // -----------------------------------------------------------------------

    /// Initialize the index to an empty list if it has never been written.
    /// Idempotent.
    pub fn provision(&self) -> Result<(), StoreError> {
        let _writer = self.lock_writer()?;
        if self.read_raw(INDEX_KEY)?.is_none() {
            self.write_index(&[])?;
            tracing::debug!(kind = T::KIND, "provisioned empty index");
        }
        Ok(())
    }

    /// All live keys in creation order. An unprovisioned store has none.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        match self.read_raw(INDEX_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                key: INDEX_KEY.to_owned(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.keys()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.keys()?.is_empty())
    }

    pub fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.keys()?.iter().any(|k| k == key))
    }

    // -----------------------------------------------------------------------
    // 2. Reads
    // -----------------------------------------------------------------------

    /// Fetch one record, or [`StoreError::NotFound`].
    pub fn get(&self, key: &str) -> Result<T, StoreError> {
        validate_key::<T>(key)?;
        self.load(key)?.ok_or_else(|| not_found::<T>(key))
    }

    /// Lazily yield every record matching `predicate`, in creation order.
    ///
    /// The index is snapshotted when the scan starts; records are fetched one
    /// at a time as the iterator advances. Keys deleted mid-scan are skipped.
    /// Call `scan` again to restart.
    pub fn scan<P>(&self, predicate: P) -> Result<Scan<'_, T, B, P>, StoreError>
    where
        P: FnMut(&T) -> bool,
    {
        Ok(Scan {
            store: self,
            keys: self.keys()?.into_iter(),
            predicate,
        })
    }

    /// Every record, in creation order.
    pub fn list_all(&self) -> Result<Vec<T>, StoreError> {
        self.scan(|_| true)?.collect()
    }

    // -----------------------------------------------------------------------
    // 3. Writes
    // -----------------------------------------------------------------------

    /// Create a record. Fails with [`StoreError::AlreadyExists`] if its key
    /// is already indexed.
    pub fn insert(&self, record: &T) -> Result<(), StoreError> {
        let key = record.key();
        validate_key::<T>(key)?;
        let bytes = encode(key, record)?;

        let _writer = self.lock_writer()?;
        let mut index = self.keys()?;
        if index.iter().any(|k| k == key) {
            return Err(StoreError::AlreadyExists {
                kind: T::KIND,
                key: key.to_owned(),
            });
        }

        // An unindexed value under this key is an orphan from an earlier torn
        // write; remember it so a failed index write restores it verbatim.
        let previous = self.read_raw(key)?;
        self.write_raw(key, &bytes)?;

        index.push(key.to_owned());
        if let Err(write) = self.backend.put(INDEX_KEY, &encode_index(&index)?) {
            let rollback = match previous {
                Some(old) => self.backend.put(key, &old),
                None => self.backend.delete(key),
            };
            return Err(torn(key, write, rollback));
        }

        tracing::debug!(kind = T::KIND, key, "record created");
        Ok(())
    }

    /// Replace an existing record wholesale. Fails with
    /// [`StoreError::NotFound`] if its key is not indexed.
    pub fn replace(&self, record: &T) -> Result<(), StoreError> {
        let key = record.key();
        validate_key::<T>(key)?;
        let bytes = encode(key, record)?;

        let _writer = self.lock_writer()?;
        self.ensure_indexed(key)?;
        self.write_raw(key, &bytes)?;
        tracing::debug!(kind = T::KIND, key, "record replaced");
        Ok(())
    }

    /// Read-modify-write one record under the writer lock.
    ///
    /// `apply` returns whether it changed anything; if not, nothing is
    /// written and the call reports [`WriteOutcome::Unchanged`]. This is what
    /// makes repeated status updates idempotent.
    pub fn modify<F>(&self, key: &str, apply: F) -> Result<WriteOutcome<T>, StoreError>
    where
        F: FnOnce(&mut T) -> bool,
    {
        validate_key::<T>(key)?;
        let _writer = self.lock_writer()?;
        self.ensure_indexed(key)?;
        let mut record = self.load(key)?.ok_or_else(|| not_found::<T>(key))?;

        if !apply(&mut record) {
            return Ok(WriteOutcome::Unchanged(record));
        }
        let bytes = encode(key, &record)?;
        self.write_raw(key, &bytes)?;
        Ok(WriteOutcome::Written(record))
    }

    /// Remove a record and its index entry. Fails with
    /// [`StoreError::NotFound`] if the key is not indexed.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key::<T>(key)?;
        let _writer = self.lock_writer()?;
        let index = self.keys()?;
        if !index.iter().any(|k| k == key) {
            return Err(not_found::<T>(key));
        }

        let remaining: Vec<String> = index.iter().filter(|k| *k != key).cloned().collect();
        self.write_index(&remaining)?;

        if let Err(write) = self.backend.delete(key) {
            let rollback = self.backend.put(INDEX_KEY, &encode_index(&index)?);
            return Err(torn(key, write, rollback));
        }

        tracing::debug!(kind = T::KIND, key, "record deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // 4. Integrity
    // -----------------------------------------------------------------------

    /// Walk the index and report keys that break the store invariant.
    pub fn check_integrity(&self) -> Result<IntegrityReport, StoreError> {
        let mut report = IntegrityReport::default();
        let mut seen = HashSet::new();
        for key in self.keys()? {
            if !seen.insert(key.clone()) {
                if !report.duplicates.contains(&key) {
                    report.duplicates.push(key);
                }
                continue;
            }
            if self.read_raw(&key)?.is_none() {
                report.dangling.push(key);
            }
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn lock_writer(&self) -> Result<WriterGuard<'_>, StoreError> {
        let process = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let shared = self
            .backend
            .lock_exclusive()
            .map_err(|source| StoreError::Backend {
                key: INDEX_KEY.to_owned(),
                source,
            })?;
        Ok(WriterGuard {
            _shared: shared,
            _process: process,
        })
    }

    fn ensure_indexed(&self, key: &str) -> Result<(), StoreError> {
        if self.keys()?.iter().any(|k| k == key) {
            Ok(())
        } else {
            Err(not_found::<T>(key))
        }
    }

    fn load(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.read_raw(key)? else {
            return Ok(None);
        };
        let envelope: Envelope<T> =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                key: key.to_owned(),
                source,
            })?;
        if envelope.version != RECORD_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                key: key.to_owned(),
                found: envelope.version,
                expected: RECORD_FORMAT_VERSION,
            });
        }
        Ok(Some(envelope.record))
    }

    fn read_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.backend.get(key).map_err(|source| StoreError::Backend {
            key: key.to_owned(),
            source,
        })
    }

    fn write_raw(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.backend
            .put(key, bytes)
            .map_err(|source| StoreError::Backend {
                key: key.to_owned(),
                source,
            })
    }

    fn write_index(&self, keys: &[String]) -> Result<(), StoreError> {
        self.write_raw(INDEX_KEY, &encode_index(keys)?)
    }
}

/// Lazy, finite scan over an [`IndexedRecordStore`]; see [`IndexedRecordStore::scan`].
pub struct Scan<'a, T, B, P> {
    store: &'a IndexedRecordStore<T, B>,
    keys: std::vec::IntoIter<String>,
    predicate: P,
}

impl<T, B, P> Iterator for Scan<'_, T, B, P>
where
    T: Record,
    B: StateBackend,
    P: FnMut(&T) -> bool,
{
    type Item = Result<T, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        for key in self.keys.by_ref() {
            match self.store.load(&key) {
                Ok(Some(record)) => {
                    if (self.predicate)(&record) {
                        return Some(Ok(record));
                    }
                }
                Ok(None) => {
                    tracing::debug!(kind = T::KIND, key = %key, "indexed key vanished during scan");
                }
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }
}

fn validate_key<T: Record>(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key == INDEX_KEY {
        return Err(StoreError::InvalidKey {
            kind: T::KIND,
            key: key.to_owned(),
        });
    }
    Ok(())
}

fn not_found<T: Record>(key: &str) -> StoreError {
    StoreError::NotFound {
        kind: T::KIND,
        key: key.to_owned(),
    }
}

fn encode<T: Serialize>(key: &str, record: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(&EnvelopeRef {
        version: RECORD_FORMAT_VERSION,
        record,
    })
    .map_err(|source| StoreError::Encode {
        key: key.to_owned(),
        source,
    })
}

fn encode_index(keys: &[String]) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(keys).map_err(|source| StoreError::Encode {
        key: INDEX_KEY.to_owned(),
        source,
    })
}

fn torn(key: &str, write: BackendError, rollback: Result<(), BackendError>) -> StoreError {
    match rollback {
        Ok(()) => StoreError::Backend {
            key: key.to_owned(),
            source: write,
        },
        Err(rollback) => {
            tracing::error!(key, %write, %rollback, "rollback failed; index and records disagree");
            StoreError::Inconsistent {
                key: key.to_owned(),
                write,
                rollback,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
