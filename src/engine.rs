// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The storage engine: startup recovery, the put/get/delete/list path, and
//! segment rotation. Background maintenance lives in [`crate::compactor`].

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    compactor::Compactor,
    error::{Error, Result},
    id::{IdGenerator, SegmentId},
    keydir::{Keydir, Meta},
    lock::DirectoryLock,
    options::Options,
    record,
    segment::{segment_path, Segment},
};

const LOCK_FILE: &str = "barrel.lock";
const HINTS_FILE: &str = "barrel.hints";
const SEGMENT_PREFIX: &str = "barrel_";
const SEGMENT_SUFFIX: &str = ".db";

pub(crate) fn now_unix() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as u32
}

fn parse_segment_id(file_name: &str) -> Option<SegmentId> {
    file_name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?
        .parse()
        .ok()
}

fn list_segment_ids<P: AsRef<Path>>(dir: P) -> Result<Vec<SegmentId>> {
    let mut ids = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };

        if let Some(id) = parse_segment_id(&name) {
            ids.push(id);
        }
    }

    ids.sort_unstable();
    Ok(ids)
}

/// Mutable state protected by the single engine lock. Every put, get, delete,
/// rotation, sweep and merge runs with this held.
pub(crate) struct State {
    pub(crate) active: Segment,
    pub(crate) stale: HashMap<SegmentId, Segment>,
    pub(crate) keydir: Keydir,
    /// Reused across `put`/`delete` calls to avoid a fresh allocation per record;
    /// cleared, never shrunk, before each use.
    scratch: Vec<u8>,
}

impl State {
    fn segment_for(&self, segment_id: SegmentId) -> Option<&Segment> {
        if self.active.id == segment_id {
            Some(&self.active)
        } else {
            self.stale.get(&segment_id)
        }
    }
}

pub(crate) struct Inner {
    pub(crate) dir: PathBuf,
    pub(crate) options: Options,
    pub(crate) id_generator: IdGenerator,
    pub(crate) state: Mutex<State>,
    lock: Mutex<Option<DirectoryLock>>,
}

impl Inner {
    fn hints_path(&self) -> PathBuf {
        self.dir.join(HINTS_FILE)
    }

    pub(crate) fn persist_hints(&self, state: &State) -> Result<()> {
        state.keydir.persist(self.hints_path())
    }

    /// Moves the active segment to stale and opens a fresh active segment if
    /// the current one has reached `max_active_file_size`.
    pub(crate) fn rotate_if_needed(&self) -> Result<()> {
        let mut state = self.state.lock().expect("engine lock poisoned");
        self.rotate_locked(&mut state)
    }

    fn rotate_locked(&self, state: &mut State) -> Result<()> {
        if state.active.size()? < self.options.max_active_file_size {
            return Ok(());
        }

        let old_id = state.active.id;
        let new_id = self.id_generator.next();
        let new_active = Segment::create_active(&self.dir, new_id)?;
        let mut old_active = std::mem::replace(&mut state.active, new_active);
        old_active.freeze()?;
        state.stale.insert(old_id, old_active);

        log::info!("Rotated active segment #{old_id} -> #{new_id}");
        Ok(())
    }

    fn read_record(&self, state: &State, meta: &Meta) -> Result<record::Record> {
        let segment = state
            .segment_for(meta.segment_id)
            .ok_or_else(|| Error::Corruption(format!("keydir references missing segment #{}", meta.segment_id)))?;

        let bytes = segment.read_at(meta.value_end_offset, meta.record_size)?;
        record::decode(&bytes)
    }

    pub(crate) fn put(&self, key: &[u8], value: &[u8], expiry: u32) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if self.options.read_only {
            return Err(Error::ReadOnly);
        }

        let timestamp = now_unix();

        let mut state = self.state.lock().expect("engine lock poisoned");
        state.scratch.clear();
        record::encode_into(&mut state.scratch, key, value, timestamp, expiry)?;
        let record_size = state.scratch.len() as u64;

        let start = state.active.append(&state.scratch)?;
        let segment_id = state.active.id;

        if self.options.always_fsync {
            state.active.sync()?;
        }

        state.keydir.insert(
            key.to_vec(),
            Meta {
                segment_id,
                value_end_offset: start + record_size,
                record_size,
                timestamp,
                expiry,
            },
        );

        self.rotate_locked(&mut state)
    }

    pub(crate) fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let state = self.state.lock().expect("engine lock poisoned");

        let meta = state.keydir.get(key).ok_or(Error::NotFound)?;

        if meta.expiry != 0 && now_unix() > meta.expiry {
            return Err(Error::Expired);
        }

        let record = self.read_record(&state, &meta)?;
        if !record.checksum_is_valid() {
            return Err(Error::ChecksumMismatch);
        }

        Ok(record.value)
    }

    pub(crate) fn delete(&self, key: &[u8]) -> Result<()> {
        if self.options.read_only {
            return Err(Error::ReadOnly);
        }

        let timestamp = now_unix();

        let mut state = self.state.lock().expect("engine lock poisoned");
        state.scratch.clear();
        record::encode_into(&mut state.scratch, key, &[], timestamp, 0)?;
        state.active.append(&state.scratch)?;

        if self.options.always_fsync {
            state.active.sync()?;
        }

        state.keydir.remove(key);

        self.rotate_locked(&mut state)
    }

    pub(crate) fn list(&self) -> Vec<Vec<u8>> {
        let state = self.state.lock().expect("engine lock poisoned");
        // NOTE: build with `Vec::new()` + extend, not a pre-sized slice -
        // a pre-sized-then-appended Vec produces leading empty entries.
        let mut keys = Vec::new();
        keys.extend(state.keydir.keys().cloned());
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().expect("engine lock poisoned").keydir.len()
    }

    pub(crate) fn fold<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let state = self.state.lock().expect("engine lock poisoned");
        for key in state.keydir.keys() {
            f(key)?;
        }
        Ok(())
    }

    pub(crate) fn sync(&self) -> Result<()> {
        let mut state = self.state.lock().expect("engine lock poisoned");
        state.active.sync()
    }

    /// Runs the expiry sweep, then merges if at least two stale segments exist.
    pub(crate) fn run_maintenance(&self) -> Result<()> {
        let mut state = self.state.lock().expect("engine lock poisoned");
        self.sweep_expired_locked(&mut state);

        if state.stale.len() >= 2 {
            self.merge_locked(&mut state)?;
        }

        self.persist_hints(&state)
    }

    fn sweep_expired_locked(&self, state: &mut State) {
        let now = now_unix();
        let expired = state.keydir.expired_keys(now);

        for key in expired {
            let result: Result<()> = (|| {
                let timestamp = now_unix();
                state.scratch.clear();
                record::encode_into(&mut state.scratch, &key, &[], timestamp, 0)?;
                state.active.append(&state.scratch)?;
                Ok(())
            })();

            match result {
                Ok(()) => state.keydir.remove(&key),
                Err(e) => log::warn!(
                    "Expiry sweep failed to tombstone key ({} bytes): {e}",
                    key.len()
                ),
            }
        }
    }

    /// Rewrites every live key into a fresh segment and drops all prior
    /// segment files. Rename-before-delete: the merged file is renamed into
    /// place before any old segment is unlinked, so a crash mid-merge leaves
    /// the prior generation fully intact.
    fn merge_locked(&self, state: &mut State) -> Result<()> {
        log::info!("Merging {} stale segments", state.stale.len());

        // Chosen before writing any record: guaranteed higher than every id
        // handed out so far, including every pre-merge segment id.
        let merged_id = self.id_generator.next();

        let scratch_dir = tempfile::tempdir_in(&self.dir)?;
        let mut temp_writer = Segment::create_active(scratch_dir.path(), 0)?;
        let mut tentative = Keydir::new();

        for key in state.keydir.keys().cloned().collect::<Vec<_>>() {
            let Some(meta) = state.keydir.get(&key) else {
                continue;
            };

            let record = self.read_record(&*state, &meta)?;
            let bytes = record::encode(&record.key, &record.value, record.header.timestamp, record.header.expiry)?;
            let start = temp_writer.append(&bytes)?;

            tentative.insert(
                key,
                Meta {
                    segment_id: merged_id,
                    value_end_offset: start + bytes.len() as u64,
                    record_size: bytes.len() as u64,
                    timestamp: meta.timestamp,
                    expiry: meta.expiry,
                },
            );
        }

        temp_writer.sync()?;

        let merged_path = segment_path(&self.dir, merged_id);
        std::fs::rename(&temp_writer.path, &merged_path)?;

        let old_paths: Vec<PathBuf> = state
            .stale
            .values()
            .map(|s| s.path.clone())
            .chain(std::iter::once(state.active.path.clone()))
            .collect();

        for path in old_paths {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to remove superseded segment {}: {e}", path.display());
            }
        }

        state.active = Segment::create_active(&self.dir, merged_id)?;
        state.stale.clear();
        state.keydir = tentative;

        if self.options.always_fsync {
            state.active.sync()?;
        }

        log::info!("Merge complete; active segment is now #{merged_id}");
        Ok(())
    }

    pub(crate) fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().expect("engine lock poisoned");

        // Read-only engines hold no writer and no lock; touching the active
        // segment or the hints file here would overwrite a read-write
        // engine's own accelerator with a stale, read-only-side keydir.
        if !self.options.read_only {
            state.active.sync()?;
            self.persist_hints(&state)?;
        }

        if let Some(lock) = self.lock.lock().expect("lock mutex poisoned").take() {
            lock.release();
        }

        Ok(())
    }
}

/// A single-writer, persistent key-value store following the Bitcask model.
///
/// Share across threads behind an `Arc<Engine>`; every operation takes `&self`
/// and serializes internally on the engine lock.
pub struct Engine {
    inner: std::sync::Arc<Inner>,
    compactor: Mutex<Option<Compactor>>,
}

impl Engine {
    /// Opens (or creates) the store at `options.dir`.
    ///
    /// Recovers the keydir from the hints file if present and valid, or by
    /// scanning every segment from the lowest id upward otherwise.
    pub fn open(options: Options) -> Result<Self> {
        std::fs::create_dir_all(&options.dir)?;

        let lock = if options.read_only {
            None
        } else {
            Some(DirectoryLock::acquire(options.dir.join(LOCK_FILE))?)
        };

        let ids = list_segment_ids(&options.dir)?;
        log::info!("Opening store at {} ({} existing segments)", options.dir.display(), ids.len());

        let hints_path = options.dir.join(HINTS_FILE);
        let mut keydir = match Keydir::load(&hints_path) {
            Ok(keydir) => {
                log::debug!("Loaded keydir from hints file");
                Some(keydir)
            }
            Err(e) => {
                log::debug!("Hints file unavailable ({e}); will scan segments");
                None
            }
        };

        let mut stale = HashMap::new();
        for &id in &ids {
            let path = segment_path(&options.dir, id);

            if keydir.is_none() {
                replay_segment(&path, id, stale_keydir_mut(&mut keydir))?;
            }

            stale.insert(id, Segment::open_stale(path, id));
        }

        let keydir = keydir.unwrap_or_default();

        let highest_id = ids.iter().max().copied();

        // Read-only opens never write to the directory: no new active segment
        // file is created. The highest-id existing segment (if any) stands in
        // as the inert "active" slot so `get` can still find it by id; it's
        // also already registered in `stale`, which is harmless since nothing
        // ever appends to it.
        let (active, next_id) = if options.read_only {
            match highest_id {
                Some(id) => (Segment::open_stale(segment_path(&options.dir, id), id), id + 1),
                None => (Segment::open_stale(segment_path(&options.dir, 0), 0), 1),
            }
        } else {
            let new_active_id = highest_id.map_or(0, |max| max + 1);
            (Segment::create_active(&options.dir, new_active_id)?, new_active_id + 1)
        };

        let id_generator = IdGenerator::new(next_id);

        let inner = std::sync::Arc::new(Inner {
            dir: options.dir.clone(),
            options: options.clone(),
            id_generator,
            state: Mutex::new(State {
                active,
                stale,
                keydir,
                scratch: Vec::new(),
            }),
            lock: Mutex::new(lock),
        });

        let compactor = if options.read_only {
            None
        } else {
            Some(Compactor::spawn(inner.clone(), &options))
        };

        Ok(Self {
            inner,
            compactor: Mutex::new(compactor),
        })
    }

    /// Inserts or overwrites `key` with `value`. Never expires.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.put(key, value, 0)
    }

    /// Inserts or overwrites `key` with `value`, expiring `ttl` from now.
    pub fn put_with_expiry(&self, key: &[u8], value: &[u8], ttl: std::time::Duration) -> Result<()> {
        let expiry = now_unix().saturating_add(ttl.as_secs() as u32).max(1);
        self.inner.put(key, value, expiry)
    }

    /// Looks up `key`.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.inner.get(key)
    }

    /// Deletes `key`. Idempotent: succeeds even if `key` was never present.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.delete(key)
    }

    /// Returns a snapshot of every live key. Order is unspecified.
    pub fn list(&self) -> Vec<Vec<u8>> {
        self.inner.list()
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// `true` iff the store currently holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes `f` for every live key, under the engine lock. Stops at the
    /// first error `f` returns.
    ///
    /// `f` must not call back into the engine: the engine lock is held for
    /// the duration of the fold.
    pub fn fold<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        self.inner.fold(f)
    }

    /// Flushes the active segment to disk.
    pub fn sync(&self) -> Result<()> {
        self.inner.sync()
    }

    /// Stops background maintenance, flushes, writes a hints file and
    /// releases the directory lock.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(compactor) = self.compactor.lock().expect("compactor mutex poisoned").take() {
            compactor.stop();
        }
        self.inner.shutdown()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Error during engine shutdown: {e}");
        }
    }
}

fn stale_keydir_mut(keydir: &mut Option<Keydir>) -> &mut Keydir {
    keydir.get_or_insert_with(Keydir::new)
}

fn replay_segment(path: &Path, id: SegmentId, keydir: &mut Keydir) -> Result<()> {
    let scanner = crate::segment::reader::Scanner::open(path)?;

    for scanned in scanner {
        let scanned = scanned?;

        if scanned.record.is_tombstone() {
            keydir.remove(&scanned.record.key);
            continue;
        }

        keydir.insert(
            scanned.record.key,
            Meta {
                segment_id: id,
                value_end_offset: scanned.value_end_offset,
                record_size: scanned.record_size,
                timestamp: scanned.record.header.timestamp,
                expiry: scanned.record.header.expiry,
            },
        );
    }

    Ok(())
}
