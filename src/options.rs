// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Configuration for opening an [`crate::Engine`].
///
/// Construct with [`Options::new`] and chain the setters, or use the
/// [`Default`] values and override only what you need.
#[derive(Clone, Debug)]
pub struct Options {
    pub(crate) dir: PathBuf,
    pub(crate) read_only: bool,
    pub(crate) always_fsync: bool,
    pub(crate) sync_interval: Duration,
    pub(crate) compact_interval: Duration,
    pub(crate) check_file_size_interval: Duration,
    pub(crate) max_active_file_size: u64,
    pub(crate) debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            read_only: false,
            always_fsync: false,
            sync_interval: Duration::from_secs(60),
            compact_interval: Duration::from_secs(6 * 60 * 60),
            check_file_size_interval: Duration::from_secs(60),
            max_active_file_size: 4 * 1_024 * 1_024 * 1_024,
            debug: false,
        }
    }
}

impl Options {
    /// Creates a builder with the same defaults as [`Options::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data directory. Default: `.`.
    #[must_use]
    pub fn dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.dir = dir.as_ref().to_path_buf();
        self
    }

    /// Opens the engine without a writer: `put`/`delete` return [`crate::Error::ReadOnly`]
    /// and no background maintenance threads are started. Default: `false`.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// `fsync`s the active segment after every write instead of relying on the
    /// periodic background sync. Default: `false`.
    #[must_use]
    pub fn always_fsync(mut self, always_fsync: bool) -> Self {
        self.always_fsync = always_fsync;
        self
    }

    /// Interval of the background `fsync` loop. Default: 1 minute.
    #[must_use]
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Interval of the background expiry-sweep-and-merge loop. Default: 6 hours.
    #[must_use]
    pub fn compact_interval(mut self, interval: Duration) -> Self {
        self.compact_interval = interval;
        self
    }

    /// Interval of the background active-segment size check that triggers
    /// rotation. Default: 1 minute.
    #[must_use]
    pub fn check_file_size_interval(mut self, interval: Duration) -> Self {
        self.check_file_size_interval = interval;
        self
    }

    /// Active segment size at which the next size check rotates onto a fresh
    /// segment. Default: 4 GiB.
    #[must_use]
    pub fn max_active_file_size(mut self, bytes: u64) -> Self {
        self.max_active_file_size = bytes;
        self
    }

    /// Enables verbose debug logging of internal engine operations. Default: `false`.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let opts = Options::default();
        assert_eq!(opts.dir, PathBuf::from("."));
        assert!(!opts.read_only);
        assert!(!opts.always_fsync);
        assert_eq!(opts.sync_interval, Duration::from_secs(60));
        assert_eq!(opts.compact_interval, Duration::from_secs(6 * 60 * 60));
        assert_eq!(opts.check_file_size_interval, Duration::from_secs(60));
        assert_eq!(opts.max_active_file_size, 4 * 1_024 * 1_024 * 1_024);
        assert!(!opts.debug);
    }

    #[test]
    fn builder_chains() {
        let opts = Options::new()
            .dir("/tmp/somewhere")
            .read_only(true)
            .always_fsync(true)
            .max_active_file_size(1_024);

        assert_eq!(opts.dir, PathBuf::from("/tmp/somewhere"));
        assert!(opts.read_only);
        assert!(opts.always_fsync);
        assert_eq!(opts.max_active_file_size, 1_024);
    }
}
