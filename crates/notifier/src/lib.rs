//! Single-file change notification
//!
//! OS change primitives watch directories, not files. This crate resolves a
//! file path into its canonical directory and file name, watches the
//! directory, and calls back on a dedicated thread whenever the file changes
//! in a way the caller asked about:
//! - Path canonicalization with a one-shot buffer-growth retry
//! - Start/stop lifecycle with forced wake-up of the blocking wait
//! - Serial, per-batch coalesced callbacks filtered by an [`EventMask`]
//! - Structured errors carrying the native failure code
//!
//! ```no_run
//! use notifier::{EventMask, Notifier};
//!
//! let mut notifier = Notifier::with_events(
//!     "app.toml",
//!     |path, event| println!("{} changed ({})", path.display(), event),
//!     EventMask::FILE_NAME | EventMask::FILE_SIZE,
//! )?;
//! notifier.start_watching()?;
//! # Ok::<(), notifier::Error>(())
//! ```

pub mod error;
pub mod event;
pub mod notifier;
pub mod path;
pub mod platform;
mod worker;

// Re-exports
pub use error::{Error, ErrorKind, NativeError};
pub use event::{ChangeEvent, EventMask};
pub use notifier::{Notifier, NotifierState};
pub use path::{PathResolver, WatchTarget};
pub use platform::{Backend, ChangeRecord, MemoryBackend, NotifyBackend, Wait, WatchHandle};

/// Result type for notifier operations
pub type Result<T> = std::result::Result<T, Error>;
