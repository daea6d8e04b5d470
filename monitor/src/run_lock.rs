//! Keeps two scan cycles from interleaving writes to the same state files.

use shared_models::error::{ModelError, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = ".trend_monitor.lock";

/// Exclusive lock on a state directory, released on drop.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl RunLock {
    /// Fails immediately with [`ModelError::Lock`] when another run holds it.
    pub fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        try_lock(&file, &path)?;
        debug!(path = %path.display(), "Run lock acquired");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock(file: &File, path: &Path) -> Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and outlives the call.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Err(ModelError::Lock(format!(
            "another run holds {}",
            path.display()
        )));
    }
    Err(err.into())
}

#[cfg(not(unix))]
fn try_lock(_file: &File, path: &Path) -> Result<()> {
    tracing::warn!(path = %path.display(), "File locking unsupported here, running unlocked");
    Ok(())
}
