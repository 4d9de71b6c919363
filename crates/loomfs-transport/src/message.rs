//! Wire message types for the four remote interfaces.
//!
//! Requests and responses are bincode-encoded enums. A response payload is
//! always a `Result<_, RemoteError>` so application faults cross the wire
//! distinctly from transport failures.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use loomfs_common::{CommandEndpoint, Path, StorageEndpoint};

use crate::error::{Result, TransportError};
use crate::protocol::Opcode;

/// Serializes a message to its wire form.
pub fn serialize_message<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    bincode::serialize(msg).map_err(|e| TransportError::SerializationError(e.to_string()))
}

/// Deserializes a message from its wire form.
pub fn deserialize_message<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    bincode::deserialize(data).map_err(|e| TransportError::SerializationError(e.to_string()))
}

/// Application-level faults returned by a remote peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RemoteError {
    /// The target path, or a required ancestor, is not present.
    #[error("path not found: {0}")]
    NotFound(Path),

    /// A path string failed to parse.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// No storage server is registered and one is required.
    #[error("no storage servers registered")]
    NoStorages,

    /// The endpoint pair is already registered.
    #[error("storage server already registered")]
    AlreadyRegistered,

    /// Unlock of a lock request that is not held.
    #[error("no matching lock request held for {0}")]
    BadUnlock(Path),

    /// A read or write range fell outside the file.
    #[error("range of {length} bytes at offset {offset} exceeds file size {size}")]
    OutOfBounds {
        /// Requested start offset.
        offset: u64,
        /// Requested length in bytes.
        length: u32,
        /// Actual file size.
        size: u64,
    },

    /// An I/O failure on the remote server.
    #[error("remote I/O failure: {0}")]
    Io(String),

    /// Any other internal failure on the remote server.
    #[error("remote internal failure: {0}")]
    Internal(String),
}

// ============================================================================
// Service interface (naming server, client-facing)
// ============================================================================

/// Requests accepted by the naming server's service interface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ServiceRequest {
    /// Acquire a shared or exclusive lock on a path.
    Lock {
        /// Target path.
        path: Path,
        /// True for an exclusive (writer) lock.
        exclusive: bool,
    },
    /// Release a previously acquired lock.
    Unlock {
        /// Target path.
        path: Path,
        /// Mode of the lock being released.
        exclusive: bool,
    },
    /// Disambiguate file vs directory.
    IsDirectory {
        /// Target path.
        path: Path,
    },
    /// List the direct children of a directory.
    List {
        /// Directory to list.
        path: Path,
    },
    /// Create an empty file.
    CreateFile {
        /// Path of the new file.
        path: Path,
    },
    /// Create a directory marker.
    CreateDirectory {
        /// Path of the new directory.
        path: Path,
    },
    /// Delete a file or a directory subtree.
    Delete {
        /// Path to delete.
        path: Path,
    },
    /// Resolve the storage server hosting a file.
    GetStorage {
        /// File path to resolve.
        path: Path,
    },
}

impl ServiceRequest {
    /// The protocol opcode carrying this request.
    pub fn opcode(&self) -> Opcode {
        match self {
            ServiceRequest::Lock { .. } => Opcode::Lock,
            ServiceRequest::Unlock { .. } => Opcode::Unlock,
            ServiceRequest::IsDirectory { .. } => Opcode::IsDirectory,
            ServiceRequest::List { .. } => Opcode::List,
            ServiceRequest::CreateFile { .. } => Opcode::CreateFile,
            ServiceRequest::CreateDirectory { .. } => Opcode::CreateDirectory,
            ServiceRequest::Delete { .. } => Opcode::Delete,
            ServiceRequest::GetStorage { .. } => Opcode::GetStorage,
        }
    }
}

/// Responses from the naming server's service interface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ServiceResponse {
    /// Lock acquired.
    Locked,
    /// Lock released.
    Unlocked,
    /// Whether the path is a directory.
    IsDirectory(bool),
    /// Direct child names of the listed directory.
    List(Vec<String>),
    /// Whether the file was created.
    FileCreated(bool),
    /// Whether the directory was created.
    DirectoryCreated(bool),
    /// Whether the path was deleted.
    Deleted(bool),
    /// Storage server hosting the requested file.
    Storage(StorageEndpoint),
}

// ============================================================================
// Registration interface (naming server, storage-facing)
// ============================================================================

/// A storage server joining the namespace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Client-facing endpoint of the joining server.
    pub storage: StorageEndpoint,
    /// Command endpoint of the joining server.
    pub command: CommandEndpoint,
    /// Paths the server holds on local disk.
    pub files: Vec<Path>,
}

/// Reply to a registration: files the joining server must delete locally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Paths already owned by a peer.
    pub prune: Vec<Path>,
}

// ============================================================================
// Storage interface (storage server, client-facing)
// ============================================================================

/// Requests accepted by a storage server's client interface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StorageRequest {
    /// File length in bytes.
    Size {
        /// Target file.
        path: Path,
    },
    /// Read a byte range.
    Read {
        /// Target file.
        path: Path,
        /// Start offset.
        offset: u64,
        /// Number of bytes to read.
        length: u32,
    },
    /// Write a byte range, extending the file as needed.
    Write {
        /// Target file.
        path: Path,
        /// Start offset.
        offset: u64,
        /// Bytes to write.
        data: Vec<u8>,
    },
}

impl StorageRequest {
    /// The protocol opcode carrying this request.
    pub fn opcode(&self) -> Opcode {
        match self {
            StorageRequest::Size { .. } => Opcode::Size,
            StorageRequest::Read { .. } => Opcode::Read,
            StorageRequest::Write { .. } => Opcode::Write,
        }
    }
}

/// Responses from a storage server's client interface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StorageResponse {
    /// File length.
    Size(u64),
    /// Bytes read.
    Read(Vec<u8>),
    /// Write completed.
    Written,
}

// ============================================================================
// Command interface (storage server, naming-server-facing)
// ============================================================================

/// Control requests the naming server issues to a storage server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CommandRequest {
    /// Create an empty file, with parent directories as needed.
    Create {
        /// Path of the new file.
        path: Path,
    },
    /// Recursively delete a subtree.
    Delete {
        /// Root of the subtree to delete.
        path: Path,
    },
    /// Pull a file's contents from a peer storage server.
    Copy {
        /// File to copy.
        path: Path,
        /// Peer currently holding the file.
        peer: StorageEndpoint,
    },
}

impl CommandRequest {
    /// The protocol opcode carrying this request.
    pub fn opcode(&self) -> Opcode {
        match self {
            CommandRequest::Create { .. } => Opcode::CommandCreate,
            CommandRequest::Delete { .. } => Opcode::CommandDelete,
            CommandRequest::Copy { .. } => Opcode::CommandCopy,
        }
    }
}

/// Responses from a storage server's command interface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CommandResponse {
    /// Whether the file was created.
    Created(bool),
    /// Whether the subtree is absent after the call.
    Deleted(bool),
    /// Whether the copy completed.
    Copied(bool),
}
