//! Background worker that waits on a watch handle and dispatches callbacks
//!
//! One thread per watch session. The thread owns the handle, so the handle is
//! closed exactly when the thread exits.

use crate::error::Error;
use crate::event::{ChangeEvent, EventMask};
use crate::platform::{ChangeRecord, Wait, WatchHandle};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace};

/// Callback shared between the notifier and its worker
pub(crate) type Callback = Arc<dyn Fn(&Path, ChangeEvent) + Send + Sync + 'static>;

/// Everything one watch session needs, moved onto its thread
pub(crate) struct WorkerLoop<H> {
    pub(crate) handle: H,
    pub(crate) file_name: OsString,
    pub(crate) path: PathBuf,
    pub(crate) mask: EventMask,
    pub(crate) callback: Callback,
    /// Cleared by the owner to end the session; checked on every wake
    pub(crate) running: Arc<AtomicBool>,
    /// Where a wait failure is left for the owner
    pub(crate) failure: Arc<Mutex<Option<Error>>>,
}

impl<H: WatchHandle> WorkerLoop<H> {
    /// Start the loop on a dedicated thread
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        let name = format!("notifier:{}", self.file_name.to_string_lossy());
        thread::Builder::new().name(name).spawn(move || self.run())
    }

    fn run(mut self) {
        debug!("Worker started for {}", self.path.display());

        loop {
            let outcome = self.handle.wait(self.mask);

            // Shutdown wins over anything the wait brought back
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            match outcome {
                Ok(Wait::Changes(records)) => self.dispatch(&records),
                Ok(Wait::Cancelled) => break,
                Err(native) => {
                    let err = Error::wait(
                        format!("Failed waiting for changes to {}", self.path.display()),
                        native,
                    );
                    error!("{}", err);
                    *self.failure.lock() = Some(err);
                    self.running.store(false, Ordering::Release);
                    break;
                }
            }
        }

        debug!("Worker for {} exiting", self.path.display());
    }

    /// Invoke the callback for the records that concern the tracked file
    ///
    /// Each kind fires at most once per batch, in first-seen order.
    fn dispatch(&self, records: &[ChangeRecord]) {
        trace!("Batch of {} records for {}", records.len(), self.path.display());

        let mut delivered: Vec<ChangeEvent> = Vec::with_capacity(ChangeEvent::ALL.len());
        for record in records {
            if record.name != self.file_name || !self.mask.admits(record.event) {
                continue;
            }
            if delivered.contains(&record.event) {
                continue;
            }
            delivered.push(record.event);
            (self.callback)(&self.path, record.event);
        }
    }
}
