//! Per-vessel transition locks.
//!
//! At most one transition runs per vessel id at a time; different ids never
//! contend. Entries are created on demand and dropped once the last holder
//! or waiter lets go, so the map only ever holds ids with work in flight.
//!
//! Locks built with [`TransitionLocks::across_processes`] also hold a
//! per-vessel [`LockFile`], so every process sharing the lock directory
//! takes turns on the same vessel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use harbor_core::lockfile::{self, LockFile};
use harbor_core::{BackendError, VesselId};
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Default)]
pub struct TransitionLocks {
    slots: Arc<Mutex<HashMap<VesselId, Slot>>>,
    lock_dir: Option<PathBuf>,
}

impl TransitionLocks {
    /// Locks private to this process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks shared with every process using `lock_dir`.
    pub fn across_processes(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            slots: Arc::default(),
            lock_dir: Some(lock_dir.into()),
        }
    }

    pub fn lock_dir(&self) -> Option<&Path> {
        self.lock_dir.as_deref()
    }

    /// Wait until no other transition holds `vessel_id`, then hold it until
    /// the returned guard is dropped. Fails only if the lock file cannot be
    /// opened.
    pub async fn acquire(&self, vessel_id: &VesselId) -> Result<TransitionGuard, BackendError> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(vessel_id.clone()).or_default().clone()
        };
        let held = slot.clone().lock_owned().await;
        let mut guard = TransitionGuard {
            slots: Arc::clone(&self.slots),
            vessel_id: vessel_id.clone(),
            slot,
            file: None,
            held: Some(held),
        };

        if let Some(dir) = &self.lock_dir {
            let path = lockfile::lock_path(dir, vessel_id.as_str());
            let file = tokio::task::spawn_blocking(move || LockFile::acquire(path))
                .await
                .map_err(|join| BackendError::Unavailable(format!("lock task failed: {join}")))??;
            guard.file = Some(file);
        }
        Ok(guard)
    }

    /// Number of vessel ids with a holder or waiter.
    pub fn in_use(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive hold on one vessel id's transitions.
#[derive(Debug)]
pub struct TransitionGuard {
    slots: Arc<Mutex<HashMap<VesselId, Slot>>>,
    vessel_id: VesselId,
    slot: Slot,
    file: Option<LockFile>,
    held: Option<OwnedMutexGuard<()>>,
}

impl TransitionGuard {
    pub fn vessel_id(&self) -> &VesselId {
        &self.vessel_id
    }
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        self.file.take();
        self.held.take();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Two references left: the map's and ours. Nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.vessel_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn entry_removed_after_release() {
        let locks = TransitionLocks::new();
        let guard = locks.acquire(&VesselId::from("V1")).await.unwrap();
        assert_eq!(locks.in_use(), 1);
        assert_eq!(guard.vessel_id().as_str(), "V1");
        drop(guard);
        assert_eq!(locks.in_use(), 0);
    }

    #[tokio::test]
    async fn different_ids_do_not_contend() {
        let locks = TransitionLocks::new();
        let _a = locks.acquire(&VesselId::from("V1")).await.unwrap();
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&VesselId::from("V2")))
            .await;
        assert!(matches!(b, Ok(Ok(_))), "V2 must not wait on V1");
    }

    #[tokio::test]
    async fn same_id_waits_for_release() {
        let locks = Arc::new(TransitionLocks::new());
        let first = locks.acquire(&VesselId::from("V1")).await.unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _second = locks.acquire(&VesselId::from("V1")).await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "second holder must block");
        assert_eq!(locks.in_use(), 1);

        drop(first);
        waiter.await.expect("waiter completes");
        assert_eq!(locks.in_use(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn separate_lock_tables_share_the_lock_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ours = TransitionLocks::across_processes(tmp.path());
        let theirs = Arc::new(TransitionLocks::across_processes(tmp.path()));

        let held = ours.acquire(&VesselId::from("V1")).await.unwrap();
        assert!(tmp.path().join("5631.lock").exists());

        let waiter = {
            let theirs = Arc::clone(&theirs);
            tokio::spawn(async move {
                let _guard = theirs.acquire(&VesselId::from("V1")).await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished(), "the other table must wait on the file lock");

        let other_vessel =
            tokio::time::timeout(Duration::from_secs(2), theirs.acquire(&VesselId::from("V2"))).await;
        assert!(matches!(other_vessel, Ok(Ok(_))), "V2 must not wait on V1");

        drop(held);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter granted after release")
            .expect("waiter completes");
    }
}
