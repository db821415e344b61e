// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Error types returned by the storage engine.

/// Represents errors that can occur while operating the storage engine.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Another process already holds the directory lock
    AlreadyLocked,

    /// A mutating operation was attempted while the engine is read-only
    ReadOnly,

    /// `put`/`delete` was called with an empty key
    EmptyKey,

    /// The key is larger than `u32::MAX` bytes
    KeyTooLarge,

    /// The value is larger than `u32::MAX` bytes
    ValueTooLarge,

    /// The key is not present in the keydir
    NotFound,

    /// The record exists but its expiry has passed
    Expired,

    /// The CRC stored in the record header does not match its value bytes
    ChecksumMismatch,

    /// A decoded buffer was shorter than its declared header/field sizes
    InvalidFormat,

    /// A read returned fewer bytes than the record size demanded
    ShortRead,

    /// Segment data could not be parsed at startup; fatal to `open`
    Corruption(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::AlreadyLocked => write!(f, "data directory is locked by another process"),
            Self::ReadOnly => write!(f, "operation not allowed: engine is read-only"),
            Self::EmptyKey => write!(f, "key must not be empty"),
            Self::KeyTooLarge => write!(f, "key exceeds the maximum size of u32::MAX bytes"),
            Self::ValueTooLarge => write!(f, "value exceeds the maximum size of u32::MAX bytes"),
            Self::NotFound => write!(f, "key not found"),
            Self::Expired => write!(f, "key has expired"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch: record is corrupt"),
            Self::InvalidFormat => write!(f, "invalid record format"),
            Self::ShortRead => write!(f, "short read: record is truncated"),
            Self::Corruption(msg) => write!(f, "segment corruption: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Storage engine result
pub type Result<T> = std::result::Result<T, Error>;
