// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    fs::File,
    io::{BufReader, Read},
    os::unix::fs::FileExt,
    path::Path,
};

use crate::{
    error::{Error, Result},
    record::{Header, Record, HEADER_SIZE},
};

/// Reads `size` bytes from `path`, starting at `value_end_offset - size`.
///
/// Opens and closes a fresh file handle per call: stale segments are read
/// infrequently enough that keeping a long-lived descriptor per segment isn't
/// worth the bookkeeping.
pub(crate) fn read_at<P: AsRef<Path>>(path: P, value_end_offset: u64, size: u64) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let start = value_end_offset
        .checked_sub(size)
        .ok_or(Error::ShortRead)?;

    let mut buf = vec![0u8; size as usize];
    file.read_exact_at(&mut buf, start).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ShortRead
        } else {
            Error::Io(e)
        }
    })?;

    Ok(buf)
}

/// Sequentially replays every record in a segment file, in on-disk order.
///
/// Used at startup (to rebuild the keydir when no hints file is available)
/// and during merge (to stream a stale segment's records by position rather
/// than by keydir lookup is *not* done here — merge reads through the keydir;
/// this scanner is strictly for the full-segment replay case).
pub(crate) struct Scanner {
    inner: BufReader<File>,
    offset: u64,
}

/// One record observed by [`Scanner`], with the byte range it occupied.
pub(crate) struct ScannedRecord {
    pub(crate) record: Record,
    /// Offset one past the last byte of the record (matches keydir `Meta::value_end_offset`).
    pub(crate) value_end_offset: u64,
    /// Total size in bytes of header + key + value.
    pub(crate) record_size: u64,
}

impl Scanner {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self {
            inner: BufReader::new(File::open(path)?),
            offset: 0,
        })
    }
}

impl Iterator for Scanner {
    type Item = Result<ScannedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut header_buf = [0u8; HEADER_SIZE];
        match self.inner.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return None,
            Err(e) => return Some(Err(Error::Io(e))),
        }

        let mut cursor = std::io::Cursor::new(header_buf.as_slice());
        let header = match (|| -> std::io::Result<Header> {
            Ok(Header {
                checksum: cursor.read_u32::<LittleEndian>()?,
                timestamp: cursor.read_u32::<LittleEndian>()?,
                expiry: cursor.read_u32::<LittleEndian>()?,
                key_size: cursor.read_u32::<LittleEndian>()?,
                value_size: cursor.read_u32::<LittleEndian>()?,
            })
        })() {
            Ok(h) => h,
            Err(e) => return Some(Err(Error::Io(e))),
        };

        let mut key = vec![0u8; header.key_size as usize];
        if let Err(e) = self.inner.read_exact(&mut key) {
            return Some(Err(Error::Io(e)));
        }

        let mut value = vec![0u8; header.value_size as usize];
        if let Err(e) = self.inner.read_exact(&mut value) {
            return Some(Err(Error::Io(e)));
        }

        let record_size = HEADER_SIZE as u64 + header.key_size as u64 + header.value_size as u64;
        self.offset += record_size;

        Some(Ok(ScannedRecord {
            record: Record { header, key, value },
            value_end_offset: self.offset,
            record_size,
        }))
    }
}
