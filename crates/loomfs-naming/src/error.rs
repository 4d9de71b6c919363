//! Naming-server error types.

use loomfs_common::Path;
use loomfs_transport::{ClientError, RemoteError};
use thiserror::Error;

/// Errors produced by naming-server operations.
#[derive(Debug, Error)]
pub enum NamingError {
    /// The target path, or a required ancestor, is not in the namespace.
    #[error("path not found: {0}")]
    NotFound(Path),

    /// An operation required a storage server but none is registered.
    #[error("no storage servers registered")]
    NoStorages,

    /// The endpoint pair is already registered.
    #[error("storage server already registered")]
    AlreadyRegistered,

    /// Unlock of a lock request that is not held.
    #[error("no matching lock request held for {0}")]
    BadUnlock(Path),

    /// An outbound call to a storage server failed.
    #[error("storage server unreachable: {0}")]
    Transport(String),

    /// A local socket or filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A broken invariant inside the server itself.
    #[error("internal naming server failure: {0}")]
    Internal(String),
}

impl From<ClientError> for NamingError {
    fn from(e: ClientError) -> Self {
        NamingError::Transport(e.to_string())
    }
}

impl From<NamingError> for RemoteError {
    fn from(e: NamingError) -> Self {
        match e {
            NamingError::NotFound(path) => RemoteError::NotFound(path),
            NamingError::NoStorages => RemoteError::NoStorages,
            NamingError::AlreadyRegistered => RemoteError::AlreadyRegistered,
            NamingError::BadUnlock(path) => RemoteError::BadUnlock(path),
            NamingError::Io(e) => RemoteError::Io(e.to_string()),
            NamingError::Transport(msg) | NamingError::Internal(msg) => {
                RemoteError::Internal(msg)
            }
        }
    }
}
