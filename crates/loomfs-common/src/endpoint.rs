//! Remote endpoints for the two storage-server interfaces.
//!
//! Each storage server is reachable at two addresses: the client-facing
//! storage interface (file I/O) and the naming-server-facing command
//! interface (create/delete/copy). The naming server records both per path.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Well-known port of the naming server's client-facing service interface.
pub const SERVICE_PORT: u16 = 6000;

/// Well-known port of the naming server's registration interface.
pub const REGISTRATION_PORT: u16 = 6001;

/// Address of a storage server's client-facing file I/O interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageEndpoint(SocketAddr);

impl StorageEndpoint {
    /// Wraps a socket address as a storage endpoint.
    pub fn new(addr: SocketAddr) -> Self {
        StorageEndpoint(addr)
    }

    /// The underlying socket address.
    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl fmt::Display for StorageEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage://{}", self.0)
    }
}

/// Address of a storage server's command interface, used only by the
/// naming server.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandEndpoint(SocketAddr);

impl CommandEndpoint {
    /// Wraps a socket address as a command endpoint.
    pub fn new(addr: SocketAddr) -> Self {
        CommandEndpoint(addr)
    }

    /// The underlying socket address.
    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl fmt::Display for CommandEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command://{}", self.0)
    }
}
