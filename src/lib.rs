// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An embeddable, single-writer, persistent key-value store following the
//! Bitcask model: every write appends to an active log file, an in-memory
//! index (the keydir) maps each live key to the byte offset of its most
//! recent record, and a background compactor reclaims space by merging
//! stale log segments.
//!
//! The working set of keys is expected to fit in memory; values may be
//! large. Point reads cost one disk seek. Writes are durable either
//! immediately (`always_fsync`) or after the next background sync.
//!
//! # Example usage
//!
//! ```
//! use barrelcask::{Engine, Options};
//!
//! # fn main() -> barrelcask::Result<()> {
//! # let dir = tempfile::tempdir()?;
//! let engine = Engine::open(Options::new().dir(dir.path()))?;
//!
//! engine.put(b"hello", b"world")?;
//! assert_eq!(engine.get(b"hello")?, b"world");
//!
//! engine.delete(b"hello")?;
//! assert!(engine.get(b"hello").is_err());
//!
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]

mod compactor;
mod engine;
mod error;
mod id;
mod keydir;
mod lock;
mod options;
mod record;
mod segment;

pub use {
    engine::Engine,
    error::{Error, Result},
    options::Options,
};
