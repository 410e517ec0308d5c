//! In-process backend driven by hand
//!
//! Nothing touches the filesystem: the owner injects batches, wait failures
//! and open failures, and can count how many handles are open. Useful for
//! exercising a `Notifier` deterministically.

use super::{wake_channel, Backend, ChangeRecord, Interrupter, Wait, WatchHandle};
use crate::error::NativeError;
use crate::event::EventMask;
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

enum Feed {
    Batch(Vec<ChangeRecord>),
    Fail(NativeError),
}

#[derive(Default)]
struct Shared {
    /// Feeds of handles that are (or were) open
    feeds: Mutex<Vec<Sender<Feed>>>,
    /// Failure handed to the next `open`
    open_failure: Mutex<Option<NativeError>>,
    /// Directories passed to `open`, in order
    opened_dirs: Mutex<Vec<PathBuf>>,
    live: AtomicUsize,
    opened: AtomicUsize,
}

/// Hand-driven backend; clones share state
#[derive(Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a batch to every open handle
    ///
    /// Batches sent while no handle is open are discarded.
    pub fn emit(&self, records: Vec<ChangeRecord>) {
        self.send(|| Feed::Batch(records.clone()));
    }

    /// Make the pending (or next) wait of every open handle fail
    pub fn fail_wait(&self, error: NativeError) {
        self.send(|| Feed::Fail(error.clone()));
    }

    /// Make the next `open` fail
    pub fn fail_next_open(&self, error: NativeError) {
        *self.shared.open_failure.lock() = Some(error);
    }

    /// Handles currently open
    pub fn live_handles(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Handles opened since creation
    pub fn opened_handles(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Directories passed to `open`, in order
    pub fn opened_directories(&self) -> Vec<PathBuf> {
        self.shared.opened_dirs.lock().clone()
    }

    fn send(&self, feed: impl Fn() -> Feed) {
        let mut feeds = self.shared.feeds.lock();
        // Closed handles drop their receiver; forget them
        feeds.retain(|tx| tx.send(feed()).is_ok());
    }
}

impl Backend for MemoryBackend {
    type Handle = MemoryHandle;

    fn open(&self, directory: &Path) -> Result<MemoryHandle, NativeError> {
        if let Some(error) = self.shared.open_failure.lock().take() {
            return Err(error);
        }

        let (feed_tx, feed_rx) = crossbeam_channel::unbounded();
        let (interrupter, wake_rx) = wake_channel();

        self.shared.feeds.lock().push(feed_tx);
        self.shared.opened_dirs.lock().push(directory.to_path_buf());
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        self.shared.live.fetch_add(1, Ordering::SeqCst);

        Ok(MemoryHandle {
            shared: Arc::clone(&self.shared),
            feed: feed_rx,
            wake_rx,
            interrupter,
        })
    }
}

/// Handle opened by [`MemoryBackend`]
pub struct MemoryHandle {
    shared: Arc<Shared>,
    feed: Receiver<Feed>,
    wake_rx: Receiver<()>,
    interrupter: Interrupter,
}

impl WatchHandle for MemoryHandle {
    fn wait(&mut self, mask: EventMask) -> Result<Wait, NativeError> {
        loop {
            let feed = select! {
                recv(self.wake_rx) -> _ => return Ok(Wait::Cancelled),
                recv(self.feed) -> msg => match msg {
                    Ok(feed) => feed,
                    // Backend dropped; nothing will ever arrive
                    Err(_) => return Ok(Wait::Cancelled),
                },
            };

            match feed {
                Feed::Fail(error) => return Err(error),
                Feed::Batch(records) => {
                    let records: Vec<_> = records
                        .into_iter()
                        .filter(|record| mask.admits(record.event))
                        .collect();
                    if !records.is_empty() {
                        return Ok(Wait::Changes(records));
                    }
                }
            }
        }
    }

    fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}
