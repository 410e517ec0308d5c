//! Error reporting for native failures
//!
//! Every failure the notifier surfaces originates in an OS call (path
//! canonicalization, opening a watch, waiting on it). The raw code is kept
//! alongside the OS description so callers can branch on it.

use std::fmt;
use std::io;

/// A failure code reported by the operating system, with its description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    code: i32,
    description: String,
}

impl NativeError {
    /// Build from a raw OS error code, looking up the OS description
    pub fn from_code(code: i32) -> Self {
        Self {
            code,
            description: describe(code),
        }
    }

    /// Build from an I/O error
    ///
    /// Errors that did not come from the OS (no raw code) are mapped to the
    /// closest errno so the code is never zero.
    pub fn from_io(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Self::from_code(code),
            None => Self {
                code: errno_for_kind(err.kind()),
                description: err.to_string(),
            },
        }
    }

    /// Build from a `notify` error
    pub fn from_notify(err: &notify::Error) -> Self {
        use nix::errno::Errno;

        match &err.kind {
            notify::ErrorKind::Io(io_err) => Self::from_io(io_err),
            notify::ErrorKind::PathNotFound => Self::from_code(Errno::ENOENT as i32),
            notify::ErrorKind::WatchNotFound => Self::from_code(Errno::ENOENT as i32),
            notify::ErrorKind::InvalidConfig(_) => Self::from_code(Errno::EINVAL as i32),
            notify::ErrorKind::MaxFilesWatch => Self::from_code(Errno::ENOSPC as i32),
            notify::ErrorKind::Generic(message) => Self {
                code: Errno::EIO as i32,
                description: message.clone(),
            },
        }
    }

    /// The raw OS code
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Human-readable description of the code
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code {} = {}", self.code, self.description)
    }
}

impl std::error::Error for NativeError {}

impl From<io::Error> for NativeError {
    fn from(err: io::Error) -> Self {
        Self::from_io(&err)
    }
}

fn describe(code: i32) -> String {
    nix::errno::Errno::from_i32(code).desc().to_string()
}

fn errno_for_kind(kind: io::ErrorKind) -> i32 {
    use nix::errno::Errno;

    let errno = match kind {
        io::ErrorKind::NotFound => Errno::ENOENT,
        io::ErrorKind::PermissionDenied => Errno::EACCES,
        io::ErrorKind::AlreadyExists => Errno::EEXIST,
        io::ErrorKind::InvalidInput => Errno::EINVAL,
        io::ErrorKind::Interrupted => Errno::EINTR,
        io::ErrorKind::OutOfMemory => Errno::ENOMEM,
        _ => Errno::EIO,
    };
    errno as i32
}

/// Which stage of the notifier failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The path could not be canonicalized
    PathResolution,
    /// The directory watch could not be opened
    HandleOpen,
    /// The blocking wait failed mid-session
    Wait,
}

/// Notifier errors
///
/// Displayed as `<context>: Code <code> = <description>`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Path cannot be canonicalized or split; raised at construction
    #[error("{context}: {source}")]
    PathResolution {
        context: String,
        #[source]
        source: NativeError,
    },

    /// The watch on the target directory could not be created
    #[error("{context}: {source}")]
    HandleOpen {
        context: String,
        #[source]
        source: NativeError,
    },

    /// The blocking wait failed; the session that hit it has ended
    #[error("{context}: {source}")]
    Wait {
        context: String,
        #[source]
        source: NativeError,
    },
}

impl Error {
    pub(crate) fn path_resolution(context: impl Into<String>, source: NativeError) -> Self {
        Self::PathResolution {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn handle_open(context: impl Into<String>, source: NativeError) -> Self {
        Self::HandleOpen {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn wait(context: impl Into<String>, source: NativeError) -> Self {
        Self::Wait {
            context: context.into(),
            source,
        }
    }

    /// Stage that failed
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PathResolution { .. } => ErrorKind::PathResolution,
            Error::HandleOpen { .. } => ErrorKind::HandleOpen,
            Error::Wait { .. } => ErrorKind::Wait,
        }
    }

    /// The underlying native failure
    pub fn native(&self) -> &NativeError {
        match self {
            Error::PathResolution { source, .. }
            | Error::HandleOpen { source, .. }
            | Error::Wait { source, .. } => source,
        }
    }

    /// Raw OS code of the underlying failure
    pub fn code(&self) -> i32 {
        self.native().code()
    }
}
