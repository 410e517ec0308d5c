//! Directory change primitives
//!
//! A [`Backend`] opens a [`WatchHandle`] on one directory. The handle's
//! `wait` blocks until changes arrive, the handle is interrupted, or the
//! primitive fails. Dropping the handle closes it.
//!
//! - [`NotifyBackend`]: the OS watcher picked by the `notify` crate
//! - [`MemoryBackend`]: in-process, driven by hand (tests, embedding)

use crate::error::NativeError;
use crate::event::{ChangeEvent, EventMask};
use crossbeam_channel::{Receiver, Sender};
use std::ffi::OsString;
use std::path::Path;

pub mod memory;
pub mod native;

pub use memory::MemoryBackend;
pub use native::NotifyBackend;

/// One reported change: the affected entry and what happened to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Entry name relative to the watched directory
    pub name: OsString,
    /// Kind of change
    pub event: ChangeEvent,
}

impl ChangeRecord {
    pub fn new(name: impl Into<OsString>, event: ChangeEvent) -> Self {
        Self {
            name: name.into(),
            event,
        }
    }
}

/// Result of a blocking wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wait {
    /// A batch of changes, in the order the primitive reported them
    Changes(Vec<ChangeRecord>),
    /// The handle was interrupted
    Cancelled,
}

/// Opens watch handles on directories
pub trait Backend: Send + 'static {
    type Handle: WatchHandle;

    /// Start watching `directory` (non-recursively)
    fn open(&self, directory: &Path) -> Result<Self::Handle, NativeError>;
}

/// An open subscription to changes in one directory
pub trait WatchHandle: Send + 'static {
    /// Block until changes compatible with `mask` arrive or the handle is
    /// interrupted
    ///
    /// Backends may report more than `mask` asks for; callers filter.
    fn wait(&mut self, mask: EventMask) -> Result<Wait, NativeError>;

    /// A token that forces a pending or future `wait` to return
    /// [`Wait::Cancelled`]
    fn interrupter(&self) -> Interrupter;
}

/// Forces a handle's blocking wait to return
#[derive(Debug, Clone)]
pub struct Interrupter {
    tx: Sender<()>,
}

impl Interrupter {
    /// Wake the handle; repeated calls are harmless
    pub fn interrupt(&self) {
        // A full slot already guarantees a wake-up
        let _ = self.tx.try_send(());
    }
}

/// Wake-up channel shared by the backends
///
/// The receiving half goes into the handle's `select!`.
pub(crate) fn wake_channel() -> (Interrupter, Receiver<()>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (Interrupter { tx }, rx)
}
