//! OS-backed watch handles via the `notify` crate
//!
//! `notify` picks the platform primitive (inotify, FSEvents, kqueue,
//! ReadDirectoryChangesW). Its callback forwards raw events into a channel;
//! `wait` blocks on that channel and the wake channel at the same time.

use super::{wake_channel, Backend, ChangeRecord, Interrupter, Wait, WatchHandle};
use crate::error::NativeError;
use crate::event::{ChangeEvent, EventMask};
use crossbeam_channel::{select, Receiver};
use nix::errno::Errno;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Backend over the platform's recommended watcher
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyBackend;

impl Backend for NotifyBackend {
    type Handle = NotifyHandle;

    fn open(&self, directory: &Path) -> Result<NotifyHandle, NativeError> {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the handle is being closed
            let _ = event_tx.send(res);
        })
        .map_err(|e| NativeError::from_notify(&e))?;

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| NativeError::from_notify(&e))?;

        let (interrupter, wake_rx) = wake_channel();
        debug!("Opened watch on {}", directory.display());

        Ok(NotifyHandle {
            _watcher: watcher,
            directory: directory.to_path_buf(),
            events: event_rx,
            wake_rx,
            interrupter,
        })
    }
}

/// Open watch on one directory
pub struct NotifyHandle {
    // Dropping the watcher closes the OS handle
    _watcher: RecommendedWatcher,
    directory: PathBuf,
    events: Receiver<notify::Result<Event>>,
    wake_rx: Receiver<()>,
    interrupter: Interrupter,
}

impl NotifyHandle {
    /// Append the records described by one raw event
    fn collect(
        &self,
        raw: notify::Result<Event>,
        mask: EventMask,
        records: &mut Vec<ChangeRecord>,
    ) -> Result<(), NativeError> {
        let event = raw.map_err(|e| NativeError::from_notify(&e))?;

        if event.need_rescan() {
            warn!(
                "Change queue for {} overflowed, some changes were dropped",
                self.directory.display()
            );
        }

        let kinds = classify(&event.kind);
        for path in &event.paths {
            if path.parent() != Some(self.directory.as_path()) {
                continue;
            }
            let Some(name) = path.file_name() else {
                continue;
            };
            for kind in kinds.iter().filter(|kind| mask.admits(**kind)) {
                records.push(ChangeRecord::new(name, *kind));
            }
        }
        Ok(())
    }
}

impl WatchHandle for NotifyHandle {
    fn wait(&mut self, mask: EventMask) -> Result<Wait, NativeError> {
        loop {
            let first = select! {
                recv(self.wake_rx) -> _ => return Ok(Wait::Cancelled),
                recv(self.events) -> msg => match msg {
                    Ok(raw) => raw,
                    Err(_) => return Err(NativeError::from_code(Errno::EBADF as i32)),
                },
            };

            let mut records = Vec::new();
            self.collect(first, mask, &mut records)?;

            // Whatever is already queued belongs to the same batch
            while let Ok(raw) = self.events.try_recv() {
                self.collect(raw, mask, &mut records)?;
            }

            if !records.is_empty() {
                return Ok(Wait::Changes(records));
            }
        }
    }

    fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }
}

impl Drop for NotifyHandle {
    fn drop(&mut self) {
        debug!("Closing watch on {}", self.directory.display());
    }
}

/// Map a raw event kind onto the change kinds it may represent
///
/// Kinds the OS leaves unspecified count as every kind.
fn classify(kind: &EventKind) -> &'static [ChangeEvent] {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => &[ChangeEvent::FileName],
        EventKind::Modify(ModifyKind::Name(_)) => &[ChangeEvent::FileName],
        EventKind::Modify(ModifyKind::Metadata(_)) => &[ChangeEvent::FileAttributes],
        EventKind::Modify(ModifyKind::Data(_)) => &[ChangeEvent::FileSize],
        EventKind::Access(_) => &[],
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => &ChangeEvent::ALL,
    }
}
