// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Single-writer advisory locking on the data directory.

use fs2::FileExt;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// An exclusive, non-blocking advisory lock on `barrel.lock`, held for the
/// lifetime of a read-write [`crate::Engine`].
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Acquires an exclusive non-blocking lock on `path`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyLocked`] if another process already holds the lock,
    /// or [`Error::Io`] if the lock file cannot be created.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                log::debug!("Acquired directory lock at {}", path.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(Error::AlreadyLocked),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Releases the lock, closes the file handle and removes the lock file.
    ///
    /// Best-effort: failures are logged but do not abort shutdown.
    pub fn release(self) {
        if let Err(e) = self.file.unlock() {
            log::warn!("Failed to unlock {}: {e}", self.path.display());
        }
        drop(self.file);
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to remove lock file {}: {e}", self.path.display());
        }
    }
}
