//! Per-directory build lock.
//!
//! Picking the latest artifact and writing a new one is not transactional,
//! so two builds into the same models directory must not overlap. The CLI
//! holds this lock for the whole build.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{MbError, Result};

/// Advisory exclusive lock on a models directory.
#[derive(Debug)]
pub struct BuildLock {
    file: File,
    lock_path: PathBuf,
}

impl BuildLock {
    const LOCK_FILENAME: &'static str = ".mbuild.lock";

    /// Try to acquire the lock without blocking.
    pub fn try_acquire(dir: &Path) -> Result<Option<Self>> {
        fs::create_dir_all(dir)?;
        let lock_path = dir.join(Self::LOCK_FILENAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, lock_path })),
            Err(err) if is_contended(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Acquire with timeout (polling).
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            if let Some(lock) = Self::try_acquire(dir)? {
                return Ok(lock);
            }
            if start.elapsed() >= timeout {
                return Err(MbError::LockTimeout(dir.display().to_string()));
            }
            std::thread::sleep(poll_interval);
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
