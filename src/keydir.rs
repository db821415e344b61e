// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The in-memory index from key to the location of its latest record, and its
//! on-disk accelerator, the hints file.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    collections::HashMap,
    io::{Cursor, Write},
    path::Path,
};

use crate::{
    error::{Error, Result},
    id::SegmentId,
};

const HINTS_MAGIC: &[u8] = b"BARRHNT1";

/// Where a key's latest record lives, and the metadata needed to validate and
/// expire it without re-reading the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Meta {
    pub(crate) segment_id: SegmentId,
    /// Offset one past the last byte of the record.
    pub(crate) value_end_offset: u64,
    /// Total size in bytes of header + key + value.
    pub(crate) record_size: u64,
    pub(crate) timestamp: u32,
    pub(crate) expiry: u32,
}

impl Meta {
    fn is_expired(&self, now: u32) -> bool {
        self.expiry != 0 && now > self.expiry
    }
}

/// `HashMap`-backed index from key bytes to [`Meta`].
///
/// Pure map mutations; all exclusion is provided by the engine's lock, not by
/// this type.
#[derive(Default)]
pub(crate) struct Keydir {
    entries: HashMap<Vec<u8>, Meta>,
}

impl Keydir {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<Meta> {
        self.entries.get(key).copied()
    }

    pub(crate) fn insert(&mut self, key: Vec<u8>, meta: Meta) {
        self.entries.insert(key, meta);
    }

    pub(crate) fn remove(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.entries.keys()
    }

    /// Returns the keys whose `Meta` is expired as of `now`.
    ///
    /// Used by the expiry sweep; does not mutate the map so the caller can
    /// append tombstones before removing entries.
    pub(crate) fn expired_keys(&self, now: u32) -> Vec<Vec<u8>> {
        self.entries
            .iter()
            .filter(|(_, meta)| meta.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Serializes the keydir to `path` via a temp file renamed into place, so
    /// a crash mid-write never leaves a half-written hints file.
    pub(crate) fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let folder = path.parent().expect("hints path must have a parent");

        let mut bytes = Vec::with_capacity(HINTS_MAGIC.len() + 8 + self.entries.len() * 64);
        bytes.write_all(HINTS_MAGIC)?;
        bytes.write_u64::<LittleEndian>(self.entries.len() as u64)?;

        for (key, meta) in &self.entries {
            bytes.write_u32::<LittleEndian>(key.len() as u32)?;
            bytes.write_all(key)?;
            bytes.write_u64::<LittleEndian>(meta.segment_id)?;
            bytes.write_u64::<LittleEndian>(meta.value_end_offset)?;
            bytes.write_u64::<LittleEndian>(meta.record_size)?;
            bytes.write_u32::<LittleEndian>(meta.timestamp)?;
            bytes.write_u32::<LittleEndian>(meta.expiry)?;
        }

        let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
        temp_file.write_all(&bytes)?;
        temp_file.persist(path).map_err(|e| Error::Io(e.error))?;

        #[cfg(not(target_os = "windows"))]
        {
            std::fs::File::open(path)?.sync_all()?;
        }

        Ok(())
    }

    /// Loads a keydir previously written by [`Keydir::persist`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the magic header or declared
    /// lengths don't match; callers should treat this as "no hints file" and
    /// fall back to a full segment scan rather than aborting `open`.
    pub(crate) fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.len() < HINTS_MAGIC.len() {
            return Err(Error::InvalidFormat);
        }

        let mut cursor = Cursor::new(bytes.as_slice());
        let mut magic = [0u8; 8];
        std::io::Read::read_exact(&mut cursor, &mut magic)?;
        if magic != HINTS_MAGIC {
            return Err(Error::InvalidFormat);
        }

        let count = cursor.read_u64::<LittleEndian>()?;
        let mut entries = HashMap::with_capacity(count as usize);

        for _ in 0..count {
            let key_len = cursor.read_u32::<LittleEndian>()? as usize;
            let mut key = vec![0u8; key_len];
            std::io::Read::read_exact(&mut cursor, &mut key)?;

            let meta = Meta {
                segment_id: cursor.read_u64::<LittleEndian>()?,
                value_end_offset: cursor.read_u64::<LittleEndian>()?,
                record_size: cursor.read_u64::<LittleEndian>()?,
                timestamp: cursor.read_u32::<LittleEndian>()?,
                expiry: cursor.read_u32::<LittleEndian>()?,
            };

            entries.insert(key, meta);
        }

        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta(segment_id: SegmentId) -> Meta {
        Meta {
            segment_id,
            value_end_offset: 100,
            record_size: 30,
            timestamp: 1,
            expiry: 0,
        }
    }

    #[test]
    fn insert_get_remove() {
        let mut keydir = Keydir::new();
        keydir.insert(b"a".to_vec(), sample_meta(0));
        assert_eq!(keydir.get(b"a"), Some(sample_meta(0)));
        assert_eq!(keydir.len(), 1);

        keydir.remove(b"a");
        assert_eq!(keydir.get(b"a"), None);
        assert_eq!(keydir.len(), 0);
    }

    #[test]
    fn expired_keys_filters_by_ttl() {
        let mut keydir = Keydir::new();
        keydir.insert(b"forever".to_vec(), sample_meta(0));
        keydir.insert(
            b"soon".to_vec(),
            Meta {
                expiry: 50,
                ..sample_meta(0)
            },
        );

        let expired = keydir.expired_keys(100);
        assert_eq!(expired, vec![b"soon".to_vec()]);
    }

    #[test]
    fn persist_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("barrel.hints");

        let mut keydir = Keydir::new();
        keydir.insert(b"alpha".to_vec(), sample_meta(1));
        keydir.insert(b"beta".to_vec(), sample_meta(2));
        keydir.persist(&path).expect("persist");

        let loaded = Keydir::load(&path).expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(b"alpha"), Some(sample_meta(1)));
        assert_eq!(loaded.get(b"beta"), Some(sample_meta(2)));
    }

    #[test]
    fn load_rejects_bad_magic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("barrel.hints");
        std::fs::write(&path, b"not a hints file").expect("write");
        assert!(matches!(Keydir::load(&path), Err(Error::InvalidFormat)));
    }
}
