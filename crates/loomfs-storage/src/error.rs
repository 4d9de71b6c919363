//! Storage-server error types.

use loomfs_common::Path;
use loomfs_transport::{ClientError, RemoteError};
use thiserror::Error;

/// Errors produced by storage-server operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The path does not name a regular file under the server's root.
    #[error("file not found: {0}")]
    NotFound(Path),

    /// A read range fell outside the file.
    #[error("range of {length} bytes at offset {offset} exceeds file size {size}")]
    OutOfBounds {
        /// Requested start offset.
        offset: u64,
        /// Requested length in bytes.
        length: u32,
        /// Actual file size.
        size: u64,
    },

    /// The local target file for a copy could not be created.
    #[error("failed to create local file for copy: {0}")]
    CreateFailed(Path),

    /// A call to a peer server failed.
    #[error("peer storage server failure: {0}")]
    Peer(String),

    /// A local filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ClientError> for StorageError {
    fn from(e: ClientError) -> Self {
        StorageError::Peer(e.to_string())
    }
}

impl From<StorageError> for RemoteError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(path) => RemoteError::NotFound(path),
            StorageError::OutOfBounds {
                offset,
                length,
                size,
            } => RemoteError::OutOfBounds {
                offset,
                length,
                size,
            },
            StorageError::CreateFailed(path) => {
                RemoteError::Io(format!("failed to create local file for copy: {path}"))
            }
            StorageError::Peer(msg) => RemoteError::Internal(msg),
            StorageError::Io(e) => RemoteError::Io(e.to_string()),
        }
    }
}
