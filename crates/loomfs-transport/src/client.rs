//! Typed clients for the four remote interfaces.
//!
//! Each client wraps an [`RpcClient`] over a dedicated connection and
//! exposes the interface's operations as plain async methods. Application
//! faults returned by the peer surface as [`ClientError::Remote`].

use std::net::SocketAddr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use loomfs_common::{CommandEndpoint, Path, StorageEndpoint};

use crate::error::TransportError;
use crate::message::{
    deserialize_message, serialize_message, CommandRequest, CommandResponse, RegisterRequest,
    RegisterResponse, RemoteError, ServiceRequest, ServiceResponse, StorageRequest,
    StorageResponse,
};
use crate::protocol::Opcode;
use crate::rpc::{RpcClient, RpcClientConfig};
use crate::tcp::{TcpTransport, TcpTransportConfig};

/// Errors surfaced by typed interface clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport failed before a response arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The peer answered with an application fault.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

async fn connect_rpc(addr: SocketAddr) -> Result<RpcClient, ClientError> {
    let transport = TcpTransport::new(TcpTransportConfig::default());
    let conn = transport.connect(&addr.to_string()).await?;
    Ok(RpcClient::new(Arc::new(conn), RpcClientConfig::default()))
}

async fn call_typed<Req, Resp>(
    rpc: &RpcClient,
    opcode: Opcode,
    request: &Req,
) -> Result<Resp, ClientError>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let payload = serialize_message(request)?;
    let frame = rpc.call(opcode, payload).await?;
    let result: std::result::Result<Resp, RemoteError> = deserialize_message(&frame.payload)?;
    Ok(result?)
}

fn unexpected(operation: &str) -> ClientError {
    ClientError::Transport(TransportError::SerializationError(format!(
        "unexpected response variant for {operation}"
    )))
}

/// Client for the naming server's service interface.
pub struct ServiceClient {
    rpc: RpcClient,
}

impl ServiceClient {
    /// Connects to a naming server's service port.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Ok(Self {
            rpc: connect_rpc(addr).await?,
        })
    }

    /// Acquires a shared or exclusive lock on `path`.
    pub async fn lock(&self, path: &Path, exclusive: bool) -> Result<(), ClientError> {
        let request = ServiceRequest::Lock {
            path: path.clone(),
            exclusive,
        };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            ServiceResponse::Locked => Ok(()),
            _ => Err(unexpected("lock")),
        }
    }

    /// Releases a previously acquired lock on `path`.
    pub async fn unlock(&self, path: &Path, exclusive: bool) -> Result<(), ClientError> {
        let request = ServiceRequest::Unlock {
            path: path.clone(),
            exclusive,
        };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            ServiceResponse::Unlocked => Ok(()),
            _ => Err(unexpected("unlock")),
        }
    }

    /// Returns true iff `path` names a directory.
    pub async fn is_directory(&self, path: &Path) -> Result<bool, ClientError> {
        let request = ServiceRequest::IsDirectory { path: path.clone() };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            ServiceResponse::IsDirectory(b) => Ok(b),
            _ => Err(unexpected("is_directory")),
        }
    }

    /// Lists the direct children of `path`.
    pub async fn list(&self, path: &Path) -> Result<Vec<String>, ClientError> {
        let request = ServiceRequest::List { path: path.clone() };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            ServiceResponse::List(names) => Ok(names),
            _ => Err(unexpected("list")),
        }
    }

    /// Creates an empty file at `path`.
    pub async fn create_file(&self, path: &Path) -> Result<bool, ClientError> {
        let request = ServiceRequest::CreateFile { path: path.clone() };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            ServiceResponse::FileCreated(b) => Ok(b),
            _ => Err(unexpected("create_file")),
        }
    }

    /// Creates a directory at `path`.
    pub async fn create_directory(&self, path: &Path) -> Result<bool, ClientError> {
        let request = ServiceRequest::CreateDirectory { path: path.clone() };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            ServiceResponse::DirectoryCreated(b) => Ok(b),
            _ => Err(unexpected("create_directory")),
        }
    }

    /// Deletes the file or directory subtree at `path`.
    pub async fn delete(&self, path: &Path) -> Result<bool, ClientError> {
        let request = ServiceRequest::Delete { path: path.clone() };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            ServiceResponse::Deleted(b) => Ok(b),
            _ => Err(unexpected("delete")),
        }
    }

    /// Resolves the storage server hosting the file at `path`.
    pub async fn get_storage(&self, path: &Path) -> Result<StorageEndpoint, ClientError> {
        let request = ServiceRequest::GetStorage { path: path.clone() };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            ServiceResponse::Storage(endpoint) => Ok(endpoint),
            _ => Err(unexpected("get_storage")),
        }
    }
}

/// Client for the naming server's registration interface.
pub struct RegistrationClient {
    rpc: RpcClient,
}

impl RegistrationClient {
    /// Connects to a naming server's registration port.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Ok(Self {
            rpc: connect_rpc(addr).await?,
        })
    }

    /// Registers a storage server. Returns the paths the caller must
    /// delete locally because a peer already owns them.
    pub async fn register(
        &self,
        storage: StorageEndpoint,
        command: CommandEndpoint,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, ClientError> {
        let request = RegisterRequest {
            storage,
            command,
            files,
        };
        let response: RegisterResponse =
            call_typed(&self.rpc, Opcode::Register, &request).await?;
        Ok(response.prune)
    }
}

/// Client for a storage server's client-facing file I/O interface.
pub struct StorageClient {
    rpc: RpcClient,
}

impl StorageClient {
    /// Connects to a storage server's client port.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Ok(Self {
            rpc: connect_rpc(addr).await?,
        })
    }

    /// Returns the length of the file at `path`.
    pub async fn size(&self, path: &Path) -> Result<u64, ClientError> {
        let request = StorageRequest::Size { path: path.clone() };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            StorageResponse::Size(n) => Ok(n),
            _ => Err(unexpected("size")),
        }
    }

    /// Reads exactly `length` bytes starting at `offset`.
    pub async fn read(&self, path: &Path, offset: u64, length: u32) -> Result<Vec<u8>, ClientError> {
        let request = StorageRequest::Read {
            path: path.clone(),
            offset,
            length,
        };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            StorageResponse::Read(data) => Ok(data),
            _ => Err(unexpected("read")),
        }
    }

    /// Writes `data` at `offset`, extending the file as needed.
    pub async fn write(&self, path: &Path, offset: u64, data: Vec<u8>) -> Result<(), ClientError> {
        let request = StorageRequest::Write {
            path: path.clone(),
            offset,
            data,
        };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            StorageResponse::Written => Ok(()),
            _ => Err(unexpected("write")),
        }
    }
}

/// Client for a storage server's command interface.
pub struct CommandClient {
    rpc: RpcClient,
}

impl CommandClient {
    /// Connects to a storage server's command port.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Ok(Self {
            rpc: connect_rpc(addr).await?,
        })
    }

    /// Creates an empty file at `path`, with parent directories as needed.
    pub async fn create(&self, path: &Path) -> Result<bool, ClientError> {
        let request = CommandRequest::Create { path: path.clone() };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            CommandResponse::Created(b) => Ok(b),
            _ => Err(unexpected("create")),
        }
    }

    /// Recursively deletes the subtree at `path`.
    pub async fn delete(&self, path: &Path) -> Result<bool, ClientError> {
        let request = CommandRequest::Delete { path: path.clone() };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            CommandResponse::Deleted(b) => Ok(b),
            _ => Err(unexpected("delete")),
        }
    }

    /// Instructs the server to pull `path` from `peer`.
    pub async fn copy(&self, path: &Path, peer: StorageEndpoint) -> Result<bool, ClientError> {
        let request = CommandRequest::Copy {
            path: path.clone(),
            peer,
        };
        match call_typed(&self.rpc, request.opcode(), &request).await? {
            CommandResponse::Copied(b) => Ok(b),
            _ => Err(unexpected("copy")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Frame;
    use crate::rpc::{RpcHandler, RpcServer};
    use std::future::Future;
    use std::pin::Pin;

    struct FixedCommandHandler;

    impl RpcHandler for FixedCommandHandler {
        fn handle(
            &self,
            request: Frame,
        ) -> Pin<Box<dyn Future<Output = crate::error::Result<Vec<u8>>> + Send + '_>> {
            Box::pin(async move {
                let decoded: CommandRequest = deserialize_message(&request.payload)?;
                let response: std::result::Result<CommandResponse, RemoteError> = match decoded {
                    CommandRequest::Create { .. } => Ok(CommandResponse::Created(true)),
                    CommandRequest::Delete { path } => Err(RemoteError::NotFound(path)),
                    CommandRequest::Copy { .. } => Ok(CommandResponse::Copied(false)),
                };
                serialize_message(&response)
            })
        }
    }

    #[tokio::test]
    async fn test_command_client_roundtrip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = RpcServer::serve(listener, Arc::new(FixedCommandHandler)).await;
        });

        let client = CommandClient::connect(addr).await.unwrap();
        let path = Path::parse("/a").unwrap();

        assert!(client.create(&path).await.unwrap());
        assert!(!client
            .copy(&path, StorageEndpoint::new("127.0.0.1:8801".parse().unwrap()))
            .await
            .unwrap());

        match client.delete(&path).await {
            Err(ClientError::Remote(RemoteError::NotFound(p))) => assert_eq!(p, path),
            other => panic!("expected remote NotFound, got {:?}", other),
        }
    }
}
