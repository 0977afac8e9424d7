//! File storage collaborator used by the contact registry and media slots.
//!
//! [`FileStore`] is the narrow seam between the core and the filesystem:
//! read, full-overwrite write, copy, existence check, and best-effort delete.
//! [`DiskStore`] is the production implementation over `std::fs`.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{trace, warn};

/// Errors from the file store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading the file failed for a reason other than absence.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Writing the file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The file that could not be written.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Copying a file into place failed.
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        /// The source file.
        from: String,
        /// The destination file.
        to: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Deleting the file failed.
    #[error("failed to delete {path}: {source}")]
    Delete {
        /// The file that could not be deleted.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Synchronous text-file storage.
///
/// Implementations must be safe to share across threads; callers serialize
/// their own writes to a given path.
pub trait FileStore: Send + Sync {
    /// Read a whole file as text, replacing invalid UTF-8 sequences.
    /// `Ok(None)` when the file does not exist.
    fn read_text(&self, path: &Path) -> Result<Option<String>, StoreError>;

    /// Replace the file's content entirely, creating it if needed.
    fn write_text(&self, path: &Path, content: &str) -> Result<(), StoreError>;

    /// Copy `from` to `to`, creating missing parent directories of `to`.
    fn copy(&self, from: &Path, to: &Path) -> Result<(), StoreError>;

    /// Whether a file currently exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete(&self, path: &Path) -> Result<(), StoreError>;
}

/// [`FileStore`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStore;

impl FileStore for DiskStore {
    fn read_text(&self, path: &Path) -> Result<Option<String>, StoreError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        match String::from_utf8(bytes) {
            Ok(content) => Ok(Some(content)),
            Err(e) => {
                // One stray byte must not hide the number lines around it.
                warn!(path = %path.display(), "file is not valid UTF-8, decoding lossily");
                Ok(Some(String::from_utf8_lossy(e.as_bytes()).into_owned()))
            }
        }
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        let to_err = |source| StoreError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(to_err)?;
            }
        }
        std::fs::write(path, content).map_err(to_err)?;
        trace!(path = %path.display(), bytes = content.len(), "file written");
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
        let to_err = |source| StoreError::Copy {
            from: from.display().to_string(),
            to: to.display().to_string(),
            source,
        };
        if let Some(parent) = to.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(to_err)?;
            }
        }
        let bytes = std::fs::copy(from, to).map_err(to_err)?;
        trace!(from = %from.display(), to = %to.display(), bytes, "file copied");
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn delete(&self, path: &Path) -> Result<(), StoreError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Delete {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}
