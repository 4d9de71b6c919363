#![warn(missing_docs)]

//! LoomFS naming server: the directory tree for a fleet of storage servers.
//!
//! The naming server maps every path to the storage servers hosting it and
//! serializes metadata operations with a hierarchical path-range lock.
//! File contents never pass through here; clients are directed to storage
//! servers and talk to them directly.

pub mod error;
pub mod index;
pub mod locking;
pub mod namespace;
pub mod registration;
pub mod replication;
pub mod server;
pub mod service;

pub use error::NamingError;
pub use index::{RegisteredServer, TreeIndex};
pub use locking::{conflicts, LockQueue, LockRequest};
pub use namespace::{Namespace, NamespaceState};
pub use replication::{ReplicationController, REPLICATION_READ_INTERVAL};
pub use server::{NamingServer, NamingServerConfig};
pub use service::NamingService;
