// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

/// Append-only handle onto one segment file.
///
/// Tracks its own end offset in memory so the write path never needs a `stat` call.
pub(crate) struct Writer {
    inner: BufWriter<File>,
    offset: u64,
}

impl Writer {
    /// Opens `path` for appending, creating it if it doesn't exist yet.
    pub(crate) fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            inner: BufWriter::new(file),
            offset,
        })
    }

    /// Writes `bytes` and returns the offset at which the write began.
    ///
    /// Flushes the buffer to the OS file straight away, so a concurrent reader
    /// opening its own handle on the same path (the stale-segment read path)
    /// sees the bytes immediately. This is not a `fsync`: durability across a
    /// crash still depends on `sync`/`always_fsync`.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> std::io::Result<u64> {
        let offset = self.offset;
        self.inner.write_all(bytes)?;
        self.inner.flush()?;
        self.offset += bytes.len() as u64;
        Ok(offset)
    }

    /// Flushes the buffered writer and `fsync`s the underlying file.
    pub(crate) fn sync(&mut self) -> std::io::Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().sync_all()
    }

    /// Current end offset of the file, tracked in memory.
    pub(crate) fn size(&self) -> u64 {
        self.offset
    }
}
