//! Storage server assembly: the storage and command interfaces plus the
//! registration exchange with the naming server.
//!
//! On start the server walks its root directory, advertises what it found,
//! and deletes whatever the naming server prunes because a peer already
//! owns it. Requests are serialized through one mutex over the local
//! store, so each storage operation sees a quiescent local tree.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use loomfs_common::{CommandEndpoint, Path, StorageEndpoint, REGISTRATION_PORT};
use loomfs_transport::{
    deserialize_message, serialize_message, CommandRequest, CommandResponse, Frame,
    RegistrationClient, RemoteError, RpcHandler, RpcServer, StorageRequest, StorageResponse,
};

use crate::error::StorageError;
use crate::store::LocalStore;

/// Default port of the client-facing storage interface.
pub const DEFAULT_CLIENT_PORT: u16 = 8801;

/// Default port of the command interface.
pub const DEFAULT_COMMAND_PORT: u16 = 8802;

/// Storage server configuration.
#[derive(Debug, Clone)]
pub struct StorageServerConfig {
    /// Local directory whose contents the server hosts.
    pub root: std::path::PathBuf,
    /// Externally visible address the listeners bind on.
    pub host: IpAddr,
    /// Client interface port; 0 lets the OS choose.
    pub client_port: u16,
    /// Command interface port; 0 lets the OS choose.
    pub command_port: u16,
    /// Registration address of the naming server.
    pub naming: SocketAddr,
}

impl StorageServerConfig {
    /// Configuration with default ports against a local naming server.
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: root.into(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            client_port: DEFAULT_CLIENT_PORT,
            command_port: DEFAULT_COMMAND_PORT,
            naming: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), REGISTRATION_PORT),
        }
    }
}

/// A running storage server, registered with its naming server.
pub struct StorageServer {
    storage_endpoint: StorageEndpoint,
    command_endpoint: CommandEndpoint,
    tasks: Vec<JoinHandle<()>>,
}

impl StorageServer {
    /// Starts both interfaces, registers with the naming server, and
    /// deletes the files the naming server pruned. The server cannot be
    /// restarted after [`StorageServer::stop`].
    pub async fn start(config: StorageServerConfig) -> Result<Self, StorageError> {
        let meta = std::fs::metadata(&config.root)?;
        if !meta.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("storage root is not a directory: {}", config.root.display()),
            )));
        }

        let store = LocalStore::new(&config.root);
        let files = store.files()?;
        let store = Arc::new(Mutex::new(store));

        let client_listener =
            tokio::net::TcpListener::bind((config.host, config.client_port)).await?;
        let command_listener =
            tokio::net::TcpListener::bind((config.host, config.command_port)).await?;
        let storage_endpoint =
            StorageEndpoint::new(SocketAddr::new(config.host, client_listener.local_addr()?.port()));
        let command_endpoint =
            CommandEndpoint::new(SocketAddr::new(config.host, command_listener.local_addr()?.port()));

        let mut tasks = Vec::new();
        let storage_handler: Arc<dyn RpcHandler> = Arc::new(StorageHandler {
            store: store.clone(),
        });
        tasks.push(tokio::spawn(async move {
            if let Err(e) = RpcServer::serve(client_listener, storage_handler).await {
                tracing::error!(error = %e, "storage listener failed");
            }
        }));
        let command_handler: Arc<dyn RpcHandler> = Arc::new(CommandHandler {
            store: store.clone(),
        });
        tasks.push(tokio::spawn(async move {
            if let Err(e) = RpcServer::serve(command_listener, command_handler).await {
                tracing::error!(error = %e, "command listener failed");
            }
        }));

        let mut advertised = vec![Path::root()];
        advertised.extend(files);
        let registration = RegistrationClient::connect(config.naming).await?;
        let prune = registration
            .register(storage_endpoint, command_endpoint, advertised)
            .await?;
        {
            let store = store.lock().await;
            for path in &prune {
                store.delete(path);
            }
        }

        info!(
            storage = %storage_endpoint,
            command = %command_endpoint,
            root = %config.root.display(),
            pruned = prune.len(),
            "storage server registered"
        );
        Ok(StorageServer {
            storage_endpoint,
            command_endpoint,
            tasks,
        })
    }

    /// The client-facing endpoint this server registered under.
    pub fn storage_endpoint(&self) -> StorageEndpoint {
        self.storage_endpoint
    }

    /// The command endpoint this server registered under.
    pub fn command_endpoint(&self) -> CommandEndpoint {
        self.command_endpoint
    }

    /// Stops both interfaces.
    pub fn stop(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("storage server stopped");
    }
}

struct StorageHandler {
    store: Arc<Mutex<LocalStore>>,
}

impl StorageHandler {
    async fn dispatch(&self, request: StorageRequest) -> Result<StorageResponse, RemoteError> {
        let store = self.store.lock().await;
        let response = match request {
            StorageRequest::Size { path } => StorageResponse::Size(store.size(&path)?),
            StorageRequest::Read {
                path,
                offset,
                length,
            } => StorageResponse::Read(store.read(&path, offset, length)?),
            StorageRequest::Write { path, offset, data } => {
                store.write(&path, offset, &data)?;
                StorageResponse::Written
            }
        };
        Ok(response)
    }
}

impl RpcHandler for StorageHandler {
    fn handle(
        &self,
        request: Frame,
    ) -> Pin<Box<dyn Future<Output = loomfs_transport::Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let decoded: StorageRequest = deserialize_message(&request.payload)?;
            let response = self.dispatch(decoded).await;
            serialize_message(&response)
        })
    }
}

struct CommandHandler {
    store: Arc<Mutex<LocalStore>>,
}

impl CommandHandler {
    async fn dispatch(&self, request: CommandRequest) -> Result<CommandResponse, RemoteError> {
        let store = self.store.lock().await;
        let response = match request {
            CommandRequest::Create { path } => CommandResponse::Created(store.create(&path)),
            CommandRequest::Delete { path } => CommandResponse::Deleted(store.delete(&path)),
            CommandRequest::Copy { path, peer } => {
                store.copy(&path, peer).await?;
                CommandResponse::Copied(true)
            }
        };
        Ok(response)
    }
}

impl RpcHandler for CommandHandler {
    fn handle(
        &self,
        request: Frame,
    ) -> Pin<Box<dyn Future<Output = loomfs_transport::Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let decoded: CommandRequest = deserialize_message(&request.payload)?;
            let response = self.dispatch(decoded).await;
            serialize_message(&response)
        })
    }
}
