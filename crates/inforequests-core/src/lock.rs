//! Advisory file lock serializing expiration sweeps.
//!
//! The CLI holds [`SweepLock`] around
//! [`crate::workflow::expiration::expire_all`]; one sweep runs at a time.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ErrorCode;

/// Lock file name inside the data directory.
pub const SWEEP_LOCK_FILE: &str = "expire.lock";

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another sweep holds {} (waited {waited:?})", .path.display())]
    Timeout { path: PathBuf, waited: Duration },

    #[error("cannot open sweep lock: {0}")]
    Io(#[from] io::Error),
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::InternalUnexpected,
        }
    }
}

/// Exclusive hold on the sweep lock file; released on drop.
#[derive(Debug)]
pub struct SweepLock {
    file: File,
    path: PathBuf,
}

impl SweepLock {
    /// Take the lock at `path`, retrying until `timeout` has passed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] while another process holds the
    /// lock, or [`LockError::Io`] if the file cannot be created.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let started = Instant::now();
        while file.try_lock_exclusive().is_err() {
            let waited = started.elapsed();
            if waited >= timeout {
                tracing::warn!(path = %path.display(), ?waited, "sweep lock busy");
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(RETRY_INTERVAL);
        }

        tracing::debug!(path = %path.display(), "took sweep lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Give the lock up before the guard goes out of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SweepLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to unlock sweep lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LockError, SWEEP_LOCK_FILE, SweepLock};
    use crate::error::ErrorCode;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn lock_can_be_taken_again_after_release() -> Result<(), LockError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join(SWEEP_LOCK_FILE);

        let first = SweepLock::acquire(&path, Duration::from_millis(50))?;
        assert_eq!(first.path(), path.as_path());
        first.release();

        let second = SweepLock::acquire(&path, Duration::from_millis(50))?;
        drop(second);
        Ok(())
    }

    #[test]
    fn held_lock_times_out_with_contention_code() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SWEEP_LOCK_FILE);
        let _held = SweepLock::acquire(&path, Duration::from_millis(50)).expect("first lock");

        let err = SweepLock::acquire(&path, Duration::from_millis(20)).expect_err("busy");
        assert!(matches!(&err, LockError::Timeout { path: p, .. } if *p == path));
        assert_eq!(err.code(), ErrorCode::LockContention);
        assert!(err.code().hint().is_some());
    }

    #[test]
    fn waiter_gets_the_lock_once_the_holder_finishes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SWEEP_LOCK_FILE);
        let (locked_tx, locked_rx) = mpsc::channel();

        let holder_path = path.clone();
        let holder = thread::spawn(move || {
            let lock = SweepLock::acquire(&holder_path, Duration::from_millis(50))
                .expect("holder lock");
            locked_tx.send(()).expect("signal");
            thread::sleep(Duration::from_millis(50));
            lock.release();
        });

        locked_rx.recv().expect("holder locked");
        let lock = SweepLock::acquire(&path, Duration::from_secs(5)).expect("waiter lock");
        drop(lock);
        holder.join().expect("holder thread");
    }
}
