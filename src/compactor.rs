// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Background maintenance: three independent periodic loops, each a plain OS
//! thread parked on a timeout-bounded channel receive rather than any async
//! runtime or timer wheel.

use std::{
    sync::{mpsc, Arc},
    thread::JoinHandle,
    time::Duration,
};

use crate::{engine::Inner, options::Options};

/// One periodic background loop, cancellable by dropping its paired sender.
struct Loop {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Loop {
    fn spawn<F>(name: &'static str, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                        log::trace!("{name} loop stopping");
                        return;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => tick(),
                }
            })
            .expect("failed to spawn background maintenance thread");

        Self { stop_tx, handle }
    }

    fn stop(self) {
        // Dropping the sender also wakes the thread immediately via a
        // disconnect, but an explicit send short-circuits the current wait.
        let _ = self.stop_tx.send(());
        drop(self.stop_tx);
        if let Err(e) = self.handle.join() {
            log::warn!("Background maintenance thread panicked: {e:?}");
        }
    }
}

/// Owns the three background maintenance threads for one [`crate::Engine`].
pub(crate) struct Compactor {
    size_check: Loop,
    fsync: Loop,
    merge: Loop,
}

impl Compactor {
    pub(crate) fn spawn(inner: Arc<Inner>, options: &Options) -> Self {
        let size_check = {
            let inner = inner.clone();
            Loop::spawn("barrelcask-size-check", options.check_file_size_interval, move || {
                if let Err(e) = inner.rotate_if_needed() {
                    log::warn!("Size-check rotation failed: {e}");
                }
            })
        };

        let fsync = {
            let inner = inner.clone();
            let always_fsync = options.always_fsync;
            Loop::spawn("barrelcask-fsync", options.sync_interval, move || {
                if always_fsync {
                    return;
                }
                if let Err(e) = inner.sync() {
                    log::warn!("Background fsync failed: {e}");
                }
            })
        };

        let merge = {
            let inner = inner.clone();
            Loop::spawn("barrelcask-merge", options.compact_interval, move || {
                if let Err(e) = inner.run_maintenance() {
                    log::warn!("Background merge/expiry sweep failed: {e}");
                }
            })
        };

        Self {
            size_check,
            fsync,
            merge,
        }
    }

    /// Stops and joins all three loops. Called once from `Engine::shutdown`.
    pub(crate) fn stop(self) {
        self.size_check.stop();
        self.fsync.stop();
        self.merge.stop();
    }
}
