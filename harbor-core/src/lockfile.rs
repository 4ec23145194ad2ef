//! Advisory file locks shared by every process that opens the same home.
//!
//! In-process mutexes only order the threads of one process. A [`LockFile`]
//! orders the CLI, the daemon and any other process as well. The lock is
//! released when the value is dropped or the process exits.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{backend_io, BackendError};

/// Exclusive hold on one lock file.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    /// Block until the exclusive lock on `path` is held. Creates the file,
    /// and its parent directory, on first use.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| backend_io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| backend_io(&path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| backend_io(&path, e))?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// `<dir>/<hex(key)>.lock`: pure, no I/O.
pub fn lock_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.lock", hex::encode(key.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn second_holder_waits_for_release() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("locks").join("store.lock");
        let first = LockFile::acquire(&path).unwrap();
        assert!(path.exists());

        let (tx, rx) = mpsc::channel();
        let contender = {
            let path = path.clone();
            thread::spawn(move || {
                let _second = LockFile::acquire(path).unwrap();
                tx.send(()).unwrap();
            })
        };
        assert!(
            rx.recv_timeout(Duration::from_millis(150)).is_err(),
            "lock must not be granted twice"
        );

        drop(first);
        rx.recv_timeout(Duration::from_secs(5))
            .expect("granted after release");
        contender.join().unwrap();
    }

    #[test]
    fn lock_path_hex_encodes_key() {
        let path = lock_path(Path::new("/run/locks"), "V1");
        assert_eq!(path, Path::new("/run/locks/5631.lock"));
    }
}
