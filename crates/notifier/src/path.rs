//! Resolve a user-supplied path into the directory to watch and the file name
//! to filter on
//!
//! The canonicalization primitive writes into a caller-sized buffer. When the
//! buffer is too small it reports the size it needs, and the resolver grows the
//! buffer and tries exactly once more.

use crate::error::{Error, NativeError};
use crate::Result;
use nix::errno::Errno;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Initial buffer guess for the canonical path
pub const DEFAULT_CAPACITY: usize = 512;

/// Directory + file name pair derived from a watched path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    directory: PathBuf,
    file_name: OsString,
}

impl WatchTarget {
    /// Absolute, canonical directory containing the file
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Bare file name within `directory`
    pub fn file_name(&self) -> &OsStr {
        &self.file_name
    }

    /// Full canonical path of the watched file
    pub fn full_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Outcome of one canonicalization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// The buffer holds the canonical path in `buf[..len]`; the file name
    /// starts at `file_name_start`
    Complete { len: usize, file_name_start: usize },
    /// The buffer was too small; `required` bytes are needed
    Truncated { required: usize },
}

/// Canonicalization primitive
pub trait Canonicalize {
    /// Write the canonical absolute form of `path` into `buf`
    fn canonicalize_into(
        &self,
        path: &Path,
        buf: &mut [u8],
    ) -> std::result::Result<Fill, NativeError>;
}

/// Canonicalization through the OS
///
/// The parent directory must exist and is resolved with symlinks followed; the
/// file itself may not exist yet. Relative paths are taken against the current
/// working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCanonicalizer;

impl Canonicalize for SystemCanonicalizer {
    fn canonicalize_into(
        &self,
        path: &Path,
        buf: &mut [u8],
    ) -> std::result::Result<Fill, NativeError> {
        let canonical = match path.components().next_back() {
            Some(Component::Normal(name)) => {
                let parent = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent,
                    _ => Path::new("."),
                };
                std::fs::canonicalize(parent)?.join(name)
            }
            // `.`, `..` and friends only make sense once resolved
            Some(_) => std::fs::canonicalize(path)?,
            None => return Err(NativeError::from_code(Errno::ENOENT as i32)),
        };

        let name_len = match canonical.file_name() {
            Some(name) => name.len(),
            None => return Err(NativeError::from_code(Errno::EINVAL as i32)),
        };

        let bytes = canonical.as_os_str().as_bytes();
        // Leave room for a terminator, like the C primitives do
        let required = bytes.len() + 1;
        if buf.len() < required {
            return Ok(Fill::Truncated { required });
        }

        buf[..bytes.len()].copy_from_slice(bytes);
        buf[bytes.len()] = 0;
        Ok(Fill::Complete {
            len: bytes.len(),
            file_name_start: bytes.len() - name_len,
        })
    }
}

/// Splits watched paths into a [`WatchTarget`]
#[derive(Debug, Clone)]
pub struct PathResolver<C = SystemCanonicalizer> {
    canonicalizer: C,
    capacity: usize,
}

impl PathResolver<SystemCanonicalizer> {
    /// Resolver using the OS with the default buffer guess
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Resolver using the OS with a custom initial buffer size
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_canonicalizer(SystemCanonicalizer, capacity)
    }
}

impl Default for PathResolver<SystemCanonicalizer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Canonicalize> PathResolver<C> {
    /// Resolver over an arbitrary canonicalization primitive
    pub fn with_canonicalizer(canonicalizer: C, capacity: usize) -> Self {
        Self {
            canonicalizer,
            capacity,
        }
    }

    /// Resolve `path` into directory + file name
    pub fn resolve(&self, path: &Path) -> Result<WatchTarget> {
        let context = || format!("Failed to resolve {}", path.display());

        let mut buf = vec![0u8; self.capacity];
        let mut fill = self
            .canonicalizer
            .canonicalize_into(path, &mut buf)
            .map_err(|e| Error::path_resolution(context(), e))?;

        if let Fill::Truncated { required } = fill {
            debug!(
                "Canonical form of {} needs {} bytes (have {}), retrying",
                path.display(),
                required,
                buf.len()
            );
            buf.resize(required, 0);
            fill = self
                .canonicalizer
                .canonicalize_into(path, &mut buf)
                .map_err(|e| Error::path_resolution(context(), e))?;
        }

        let (len, file_name_start) = match fill {
            Fill::Complete {
                len,
                file_name_start,
            } if file_name_start < len && len <= buf.len() => (len, file_name_start),
            Fill::Complete { .. } => {
                return Err(Error::path_resolution(
                    context(),
                    NativeError::from_code(Errno::EINVAL as i32),
                ))
            }
            Fill::Truncated { .. } => {
                return Err(Error::path_resolution(
                    context(),
                    NativeError::from_code(Errno::ENAMETOOLONG as i32),
                ))
            }
        };

        let directory = Path::new(OsStr::from_bytes(&buf[..file_name_start]))
            .components()
            .collect::<PathBuf>();
        let file_name = OsStr::from_bytes(&buf[file_name_start..len]).to_os_string();

        Ok(WatchTarget {
            directory,
            file_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_absolute() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, b"hello").unwrap();

        let target = PathResolver::new().resolve(&file).unwrap();

        assert_eq!(target.directory(), fs::canonicalize(temp_dir.path()).unwrap());
        assert_eq!(target.file_name(), "a.txt");
        assert_eq!(target.full_path(), fs::canonicalize(&file).unwrap());
    }

    #[test]
    fn test_resolve_dot_segments() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, b"hello").unwrap();

        let winding = temp_dir.path().join("sub/./../sub/../a.txt");
        let target = PathResolver::new().resolve(&winding).unwrap();

        assert_eq!(target.full_path(), fs::canonicalize(&file).unwrap());
        assert_eq!(target.file_name(), "a.txt");
    }

    #[test]
    fn test_resolve_relative() {
        let cwd = std::env::current_dir().unwrap();
        let target = PathResolver::new().resolve(Path::new("Cargo.toml")).unwrap();

        assert_eq!(target.directory(), fs::canonicalize(&cwd).unwrap());
        assert_eq!(target.file_name(), "Cargo.toml");
    }

    #[test]
    fn test_resolve_file_not_yet_created() {
        let temp_dir = TempDir::new().unwrap();
        let target = PathResolver::new()
            .resolve(&temp_dir.path().join("later.log"))
            .unwrap();

        assert_eq!(target.file_name(), "later.log");
        assert_eq!(target.directory(), fs::canonicalize(temp_dir.path()).unwrap());
    }

    #[test]
    fn test_resolve_grows_buffer_once() {
        let temp_dir = TempDir::new().unwrap();
        let deep = temp_dir
            .path()
            .join("a-rather-long-directory-name")
            .join("and-another-one-just-as-long");
        fs::create_dir_all(&deep).unwrap();
        let file = deep.join("watched-file-with-a-long-name.txt");
        fs::write(&file, b"x").unwrap();

        // Far smaller than the canonical form
        let target = PathResolver::with_capacity(8).resolve(&file).unwrap();

        assert_eq!(target.directory(), fs::canonicalize(&deep).unwrap());
        assert_eq!(target.file_name(), "watched-file-with-a-long-name.txt");
    }

    #[test]
    fn test_resolve_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("no-such-dir/file.txt");

        let err = PathResolver::new().resolve(&missing).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PathResolution);
        assert_eq!(err.code(), Errno::ENOENT as i32);
        assert!(err.to_string().contains("Code 2 = "));
    }

    #[test]
    fn test_resolve_root_has_no_file_name() {
        let err = PathResolver::new().resolve(Path::new("/")).unwrap_err();
        assert_eq!(err.code(), Errno::EINVAL as i32);
    }

    /// Reports a growing requirement on every call
    struct AlwaysTooSmall {
        calls: RefCell<usize>,
    }

    impl Canonicalize for AlwaysTooSmall {
        fn canonicalize_into(
            &self,
            _path: &Path,
            buf: &mut [u8],
        ) -> std::result::Result<Fill, NativeError> {
            *self.calls.borrow_mut() += 1;
            Ok(Fill::Truncated {
                required: buf.len() * 2,
            })
        }
    }

    #[test]
    fn test_resolve_retries_only_once() {
        let canonicalizer = AlwaysTooSmall {
            calls: RefCell::new(0),
        };
        let resolver = PathResolver::with_canonicalizer(canonicalizer, 16);

        let err = resolver.resolve(Path::new("/whatever")).unwrap_err();

        assert_eq!(err.code(), Errno::ENAMETOOLONG as i32);
        assert_eq!(*resolver.canonicalizer.calls.borrow(), 2);
    }

    /// Splits at a marker the separators would not suggest
    struct FixedSplit;

    impl Canonicalize for FixedSplit {
        fn canonicalize_into(
            &self,
            _path: &Path,
            buf: &mut [u8],
        ) -> std::result::Result<Fill, NativeError> {
            let canonical = b"/srv/data/report.tar.gz";
            buf[..canonical.len()].copy_from_slice(canonical);
            Ok(Fill::Complete {
                len: canonical.len(),
                file_name_start: 10,
            })
        }
    }

    #[test]
    fn test_split_uses_primitive_marker() {
        let resolver = PathResolver::with_canonicalizer(FixedSplit, 64);
        let target = resolver.resolve(Path::new("ignored")).unwrap();

        assert_eq!(target.directory(), Path::new("/srv/data"));
        assert_eq!(target.file_name(), "report.tar.gz");
    }
}
