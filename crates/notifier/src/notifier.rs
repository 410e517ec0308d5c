//! The public notifier: resolved target, callback and start/stop lifecycle

use crate::error::{Error, NativeError};
use crate::event::{ChangeEvent, EventMask};
use crate::path::{PathResolver, WatchTarget};
use crate::platform::{Backend, Interrupter, NotifyBackend, WatchHandle};
use crate::worker::{Callback, WorkerLoop};
use crate::Result;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info};

/// Lifecycle state of a [`Notifier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    /// Constructed, never started
    Idle,
    /// A worker is delivering notifications
    Watching,
    /// Stopped explicitly or by a wait failure; may be started again
    Stopped,
}

/// A running watch session
struct Session {
    running: Arc<AtomicBool>,
    interrupter: Interrupter,
    thread: JoinHandle<()>,
}

impl Session {
    /// Whether the worker has ended on its own
    fn is_over(&self) -> bool {
        !self.running.load(Ordering::Acquire) || self.thread.is_finished()
    }
}

/// Watches one file and calls back on a background thread when it changes
///
/// Notifications are "at least once": a qualifying change produces one or
/// more callbacks, and several changes may be folded into one. Callbacks for
/// one notifier never overlap. The path handed to the callback is the
/// canonical form of the watched path, which may be spelled differently from
/// what the caller supplied.
///
/// Dropping the notifier stops it.
pub struct Notifier<B: Backend = NotifyBackend> {
    target: WatchTarget,
    path: PathBuf,
    callback: Callback,
    mask: EventMask,
    backend: B,
    state: NotifierState,
    session: Option<Session>,
    failure: Arc<Mutex<Option<Error>>>,
}

impl Notifier<NotifyBackend> {
    /// Notify on any change to the file at `path`
    pub fn new<F>(path: impl AsRef<Path>, callback: F) -> Result<Self>
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        Self::with_events(path, move |path: &Path, _event| callback(path), EventMask::ALL)
    }

    /// Notify on changes to the file at `path` that intersect `mask`
    pub fn with_events<F>(path: impl AsRef<Path>, callback: F, mask: EventMask) -> Result<Self>
    where
        F: Fn(&Path, ChangeEvent) + Send + Sync + 'static,
    {
        Self::with_backend(path, callback, mask, NotifyBackend)
    }
}

impl<B: Backend> Notifier<B> {
    /// Like [`Notifier::with_events`], over a specific backend
    pub fn with_backend<F>(
        path: impl AsRef<Path>,
        callback: F,
        mask: EventMask,
        backend: B,
    ) -> Result<Self>
    where
        F: Fn(&Path, ChangeEvent) + Send + Sync + 'static,
    {
        let target = PathResolver::new().resolve(path.as_ref())?;
        Ok(Self::from_target(target, callback, mask, backend))
    }

    /// Build from an already resolved target
    pub fn from_target<F>(target: WatchTarget, callback: F, mask: EventMask, backend: B) -> Self
    where
        F: Fn(&Path, ChangeEvent) + Send + Sync + 'static,
    {
        Self {
            path: target.full_path(),
            target,
            callback: Arc::new(callback),
            mask,
            backend,
            state: NotifierState::Idle,
            session: None,
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin (or resume) delivering notifications
    ///
    /// Does nothing when already watching. If the previous session ended with
    /// a wait failure, that failure is returned once and nothing is started;
    /// call again to start a fresh session.
    pub fn start_watching(&mut self) -> Result<()> {
        self.reap();
        if self.session.is_some() {
            return Ok(());
        }

        if let Some(err) = self.failure.lock().take() {
            return Err(err);
        }

        let directory = self.target.directory();
        let handle = self.backend.open(directory).map_err(|e| {
            Error::handle_open(format!("Failed to watch {}", directory.display()), e)
        })?;
        let interrupter = handle.interrupter();
        let running = Arc::new(AtomicBool::new(true));

        let worker = WorkerLoop {
            handle,
            file_name: self.target.file_name().to_os_string(),
            path: self.path.clone(),
            mask: self.mask,
            callback: Arc::clone(&self.callback),
            running: Arc::clone(&running),
            failure: Arc::clone(&self.failure),
        };
        // On failure the closure, and the handle with it, is dropped
        let thread = worker.spawn().map_err(|e| {
            Error::handle_open(
                format!("Failed to start watcher thread for {}", self.path.display()),
                NativeError::from_io(&e),
            )
        })?;

        self.session = Some(Session {
            running,
            interrupter,
            thread,
        });
        self.state = NotifierState::Watching;
        info!("Watching {} for {}", self.path.display(), self.mask);
        Ok(())
    }

    /// Stop delivering notifications
    ///
    /// Blocks until the worker has exited and the handle is closed. No
    /// callback runs after this returns. Does nothing unless watching.
    pub fn stop_watching(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.running.store(false, Ordering::Release);
        session.interrupter.interrupt();
        if session.thread.join().is_err() {
            error!("Watcher thread for {} panicked", self.path.display());
        }

        self.state = NotifierState::Stopped;
        debug!("Stopped watching {}", self.path.display());
    }

    /// Current lifecycle state
    pub fn state(&self) -> NotifierState {
        match &self.session {
            Some(session) if session.is_over() => NotifierState::Stopped,
            Some(_) => NotifierState::Watching,
            None => self.state,
        }
    }

    /// Whether a worker is currently delivering notifications
    pub fn is_watching(&self) -> bool {
        self.state() == NotifierState::Watching
    }

    /// The failure that ended the last session, if it has not been re-raised
    /// by `start_watching` yet
    pub fn last_error(&self) -> Option<Error> {
        self.failure.lock().clone()
    }

    /// Resolved directory and file name
    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Canonical path passed to the callback
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    /// Join a worker that ended on its own
    fn reap(&mut self) {
        if self.session.as_ref().is_some_and(Session::is_over) {
            self.stop_watching();
        }
    }
}

impl<B: Backend> Drop for Notifier<B> {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

impl<B: Backend> fmt::Debug for Notifier<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("path", &self.path)
            .field("mask", &self.mask)
            .field("state", &self.state())
            .finish()
    }
}
