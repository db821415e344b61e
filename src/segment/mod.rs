// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub(crate) mod reader;
pub(crate) mod writer;

use std::path::{Path, PathBuf};

use crate::{
    error::Result,
    id::SegmentId,
};
use writer::Writer;

/// Builds the on-disk filename for segment `id`, zero-padded so a directory
/// listing sorts in id order.
pub(crate) fn segment_path(dir: &Path, id: SegmentId) -> PathBuf {
    dir.join(format!("barrel_{id:020}.db"))
}

/// One on-disk log file: either the single active segment being appended to,
/// or one of the stale segments kept only for reads until the next merge.
///
/// A stale segment holds no open file handle between reads; [`Segment::read_at`]
/// opens, reads and closes a fresh handle each call.
pub(crate) struct Segment {
    pub(crate) id: SegmentId,
    pub(crate) path: PathBuf,
    writer: Option<Writer>,
}

impl Segment {
    /// Creates (or reopens for appending) the active segment `id` in `dir`.
    pub(crate) fn create_active(dir: &Path, id: SegmentId) -> Result<Self> {
        let path = segment_path(dir, id);
        let writer = Writer::create(&path)?;
        Ok(Self {
            id,
            path,
            writer: Some(writer),
        })
    }

    /// Wraps an existing, already-written segment file as stale: reads only.
    pub(crate) fn open_stale(path: PathBuf, id: SegmentId) -> Self {
        Self {
            id,
            path,
            writer: None,
        }
    }

    /// Appends `bytes`, returning the offset the write began at.
    ///
    /// # Panics
    ///
    /// Panics if called on a stale segment; the engine never appends to one.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self
            .writer
            .as_mut()
            .expect("append on stale segment")
            .append(bytes)?;
        Ok(offset)
    }

    /// Flushes and `fsync`s the active segment. No-op on a stale segment.
    pub(crate) fn sync(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.sync()?;
        }
        Ok(())
    }

    /// Current size of the segment in bytes.
    pub(crate) fn size(&self) -> Result<u64> {
        match &self.writer {
            Some(writer) => Ok(writer.size()),
            None => Ok(std::fs::metadata(&self.path)?.len()),
        }
    }

    /// Reads `size` value bytes ending at `value_end_offset`.
    pub(crate) fn read_at(&self, value_end_offset: u64, size: u64) -> Result<Vec<u8>> {
        reader::read_at(&self.path, value_end_offset, size)
    }

    /// Demotes this segment from active to stale, flushing first.
    ///
    /// Called when the engine rotates onto a new active segment.
    pub(crate) fn freeze(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.sync()?;
        }
        Ok(())
    }
}
