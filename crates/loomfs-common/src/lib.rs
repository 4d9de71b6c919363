#![warn(missing_docs)]

//! LoomFS shared types: hierarchical paths, server endpoints, well-known ports.
//!
//! Everything in this crate is pure data. The naming server, the storage
//! servers, and the transport layer all speak in terms of these types.

pub mod endpoint;
pub mod path;

pub use endpoint::{CommandEndpoint, StorageEndpoint, REGISTRATION_PORT, SERVICE_PORT};
pub use path::{Components, Path, PathError};
