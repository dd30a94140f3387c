//! Storage backends for uploads.
//!
//! A [`StorageBackend`] opens a [`Destination`] for each upload. The
//! destination is an `AsyncWrite` that advertises which shutdown
//! primitives it supports, since backends differ: a local file can be
//! synced and closed, an in-memory buffer is committed on close, a remote
//! object may only support being dropped.

mod backend;
mod destination;
mod fs;
mod memory;
mod validation;

pub use backend::{NormalizedDestination, OpenedDestination, StorageBackend, WriteOptions};
pub use destination::{Capabilities, Destination};
pub use fs::{FsBackend, FsDestination};
pub use memory::{MemoryBackend, MemoryDestination, OpenRecord};
pub use validation::{normalize_client_path, validate_upload_path};

/// Errors produced by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("storage is read-only")]
    ReadOnly,
}

impl From<StorageError> for std::io::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => e,
            StorageError::InvalidPath(_) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
            }
            StorageError::ReadOnly => {
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, err.to_string())
            }
        }
    }
}
