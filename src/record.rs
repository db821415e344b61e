// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! On-disk record format: a fixed-size header followed by the key and value bytes.
//!
//! ```text
//! | checksum u32 | timestamp u32 | expiry u32 | key_size u32 | value_size u32 | key | value |
//! ```
//!
//! All integer fields are little-endian. `checksum` is the CRC-32 (IEEE polynomial) of
//! the value bytes only. A tombstone is a record whose value is empty.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

use crate::error::{Error, Result};

/// Size in bytes of the fixed-width record header.
pub const HEADER_SIZE: usize = 20;

/// The largest key or value size this format can represent.
pub const MAX_FIELD_SIZE: u64 = u32::MAX as u64;

/// Fixed-width fields that precede every record's key and value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// CRC-32/IEEE of the value bytes
    pub checksum: u32,
    /// Seconds since the Unix epoch when the record was written
    pub timestamp: u32,
    /// Absolute Unix second the record becomes invalid; `0` means no expiry
    pub expiry: u32,
    /// Length of the key in bytes
    pub key_size: u32,
    /// Length of the value in bytes
    pub value_size: u32,
}

impl Header {
    /// Returns `false` if `expiry == 0`, otherwise whether `now` is past it.
    #[must_use]
    pub fn is_expired(&self, now: u32) -> bool {
        self.expiry != 0 && now > self.expiry
    }
}

/// A fully decoded record: header plus the owned key and value bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// The record's fixed-width header
    pub header: Header,
    /// The key bytes
    pub key: Vec<u8>,
    /// The value bytes; empty for a tombstone
    pub value: Vec<u8>,
}

impl Record {
    /// Builds a live record for `key`/`value`, computing the CRC and stamping `timestamp`.
    #[must_use]
    pub fn new(key: &[u8], value: &[u8], timestamp: u32, expiry: u32) -> Self {
        let checksum = checksum_of(value);
        Self {
            header: Header {
                checksum,
                timestamp,
                expiry,
                key_size: key.len() as u32,
                value_size: value.len() as u32,
            },
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    /// Builds a tombstone record (empty value) for `key`.
    #[must_use]
    pub fn tombstone(key: &[u8], timestamp: u32) -> Self {
        Self::new(key, &[], timestamp, 0)
    }

    /// `true` iff the value's CRC-32/IEEE matches the header's checksum.
    #[must_use]
    pub fn checksum_is_valid(&self) -> bool {
        checksum_of(&self.value) == self.header.checksum
    }

    /// `true` iff the record is a tombstone (empty value).
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.header.value_size == 0
    }
}

/// Computes the CRC-32/IEEE checksum of `value`.
#[must_use]
pub fn checksum_of(value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(value);
    hasher.finalize()
}

/// Encodes `header`, `key` and `value` into a freshly allocated buffer.
///
/// # Errors
///
/// Returns [`Error::KeyTooLarge`] / [`Error::ValueTooLarge`] if either field exceeds
/// [`MAX_FIELD_SIZE`] bytes.
pub fn encode(key: &[u8], value: &[u8], timestamp: u32, expiry: u32) -> Result<Vec<u8>> {
    if key.len() as u64 > MAX_FIELD_SIZE {
        return Err(Error::KeyTooLarge);
    }
    if value.len() as u64 > MAX_FIELD_SIZE {
        return Err(Error::ValueTooLarge);
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + key.len() + value.len());
    encode_into(&mut buf, key, value, timestamp, expiry)?;
    Ok(buf)
}

/// Encodes a record into an existing buffer, appending to whatever it already contains.
///
/// Used by callers that reuse a scratch buffer across writes instead of allocating
/// a fresh `Vec` per `put`.
pub fn encode_into(
    buf: &mut Vec<u8>,
    key: &[u8],
    value: &[u8],
    timestamp: u32,
    expiry: u32,
) -> Result<()> {
    if key.len() as u64 > MAX_FIELD_SIZE {
        return Err(Error::KeyTooLarge);
    }
    if value.len() as u64 > MAX_FIELD_SIZE {
        return Err(Error::ValueTooLarge);
    }

    let checksum = checksum_of(value);

    buf.write_u32::<LittleEndian>(checksum)?;
    buf.write_u32::<LittleEndian>(timestamp)?;
    buf.write_u32::<LittleEndian>(expiry)?;
    buf.write_u32::<LittleEndian>(key.len() as u32)?;
    buf.write_u32::<LittleEndian>(value.len() as u32)?;
    buf.write_all(key)?;
    buf.write_all(value)?;

    Ok(())
}

/// Decodes a complete record from `bytes`.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if `bytes` is shorter than the header or the
/// declared key/value sizes.
pub fn decode(bytes: &[u8]) -> Result<Record> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::InvalidFormat);
    }

    let mut cursor = Cursor::new(bytes);
    let checksum = cursor.read_u32::<LittleEndian>()?;
    let timestamp = cursor.read_u32::<LittleEndian>()?;
    let expiry = cursor.read_u32::<LittleEndian>()?;
    let key_size = cursor.read_u32::<LittleEndian>()?;
    let value_size = cursor.read_u32::<LittleEndian>()?;

    let key_size = key_size as usize;
    let value_size = value_size as usize;

    if bytes.len() < HEADER_SIZE + key_size + value_size {
        return Err(Error::InvalidFormat);
    }

    let key = bytes
        .get(HEADER_SIZE..HEADER_SIZE + key_size)
        .ok_or(Error::InvalidFormat)?
        .to_vec();
    let value = bytes
        .get(HEADER_SIZE + key_size..HEADER_SIZE + key_size + value_size)
        .ok_or(Error::InvalidFormat)?
        .to_vec();

    Ok(Record {
        header: Header {
            checksum,
            timestamp,
            expiry,
            key_size: key_size as u32,
            value_size: value_size as u32,
        },
        key,
        value,
    })
}
