//! Advisory dispatch lock.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;
use tracing::{debug, info};

use crate::error::MonitorError;

/// Exclusive advisory file lock held across the dispatch step.
///
/// Guards against two concurrent runs double-sending the same batch; a
/// second run blocks until the holder releases. The lock file's content
/// is irrelevant and the lock is released on drop.
pub struct DispatchLock {
    file: File,
}

impl DispatchLock {
    /// Ensure the lock file exists, then block until the exclusive lock
    /// is acquired.
    pub fn acquire(path: &Path) -> Result<Self, MonitorError> {
        let unavailable = |source| MonitorError::LockUnavailable {
            path: path.to_owned(),
            source,
        };

        if !path.exists() {
            info!(path = %path.display(), "creating lock file");
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(unavailable)?;
        file.lock_exclusive().map_err(unavailable)?;
        debug!(path = %path.display(), "dispatch lock acquired");
        Ok(Self { file })
    }
}

impl Drop for DispatchLock {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            debug!(%error, "failed to release dispatch lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_the_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binmon.lock");
        let lock = DispatchLock::acquire(&path).unwrap();
        assert!(path.exists());
        drop(lock);
    }

    #[test]
    fn lock_can_be_reacquired_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binmon.lock");
        drop(DispatchLock::acquire(&path).unwrap());
        DispatchLock::acquire(&path).unwrap();
    }
}
