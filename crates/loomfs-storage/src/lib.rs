#![warn(missing_docs)]

//! LoomFS storage server: hosts a subtree of file contents on local disk.
//!
//! A storage server exposes two interfaces over the shared RPC layer: the
//! storage interface clients use for file I/O, and the command interface
//! the naming server uses to create, delete, and replicate files. On start
//! it advertises its local files to the naming server and deletes whatever
//! the registration exchange prunes.

pub mod error;
pub mod server;
pub mod store;

pub use error::StorageError;
pub use server::{StorageServer, StorageServerConfig, DEFAULT_CLIENT_PORT, DEFAULT_COMMAND_PORT};
pub use store::{LocalStore, COPY_CHUNK_SIZE};
