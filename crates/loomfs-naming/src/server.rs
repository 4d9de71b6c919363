//! Naming server assembly: listeners, RPC handlers, replication worker.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use loomfs_common::{REGISTRATION_PORT, SERVICE_PORT};
use loomfs_transport::{
    deserialize_message, serialize_message, Frame, RegisterRequest, RegisterResponse, RemoteError,
    RpcHandler, RpcServer, ServiceRequest, ServiceResponse,
};

use crate::error::NamingError;
use crate::namespace::Namespace;
use crate::replication::ReplicationController;
use crate::service::NamingService;

/// Naming server configuration.
#[derive(Debug, Clone)]
pub struct NamingServerConfig {
    /// Address to bind both listeners on.
    pub host: IpAddr,
    /// Service (client-facing) port; 0 lets the OS choose.
    pub service_port: u16,
    /// Registration (storage-facing) port; 0 lets the OS choose.
    pub registration_port: u16,
}

impl Default for NamingServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            service_port: SERVICE_PORT,
            registration_port: REGISTRATION_PORT,
        }
    }
}

/// A running naming server. The directory tree lives entirely in memory;
/// after a restart every storage server must register again.
pub struct NamingServer {
    service_addr: SocketAddr,
    registration_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl NamingServer {
    /// Binds both interfaces and starts serving. The server cannot be
    /// restarted after [`NamingServer::stop`].
    pub async fn start(config: NamingServerConfig) -> Result<Self, NamingError> {
        let (namespace, replication_rx) = Namespace::new();
        let namespace = Arc::new(namespace);
        let service = NamingService::new(namespace.clone());

        let service_listener =
            tokio::net::TcpListener::bind((config.host, config.service_port)).await?;
        let registration_listener =
            tokio::net::TcpListener::bind((config.host, config.registration_port)).await?;
        let service_addr = service_listener.local_addr()?;
        let registration_addr = registration_listener.local_addr()?;

        let controller = ReplicationController::new(namespace, replication_rx);

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(controller.run()));
        let service_handler: Arc<dyn RpcHandler> = Arc::new(ServiceHandler {
            service: service.clone(),
        });
        tasks.push(tokio::spawn(async move {
            if let Err(e) = RpcServer::serve(service_listener, service_handler).await {
                tracing::error!(error = %e, "service listener failed");
            }
        }));
        let registration_handler: Arc<dyn RpcHandler> = Arc::new(RegistrationHandler { service });
        tasks.push(tokio::spawn(async move {
            if let Err(e) = RpcServer::serve(registration_listener, registration_handler).await {
                tracing::error!(error = %e, "registration listener failed");
            }
        }));

        info!(service = %service_addr, registration = %registration_addr, "naming server started");
        Ok(NamingServer {
            service_addr,
            registration_addr,
            tasks,
        })
    }

    /// Address of the client-facing service interface.
    pub fn service_addr(&self) -> SocketAddr {
        self.service_addr
    }

    /// Address of the storage-facing registration interface.
    pub fn registration_addr(&self) -> SocketAddr {
        self.registration_addr
    }

    /// Stops both interfaces and the replication worker.
    pub fn stop(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("naming server stopped");
    }
}

struct ServiceHandler {
    service: NamingService,
}

impl ServiceHandler {
    async fn dispatch(&self, request: ServiceRequest) -> Result<ServiceResponse, RemoteError> {
        let response = match request {
            ServiceRequest::Lock { path, exclusive } => {
                self.service.lock(path, exclusive).await?;
                ServiceResponse::Locked
            }
            ServiceRequest::Unlock { path, exclusive } => {
                self.service.unlock(&path, exclusive)?;
                ServiceResponse::Unlocked
            }
            ServiceRequest::IsDirectory { path } => {
                ServiceResponse::IsDirectory(self.service.is_directory(path).await?)
            }
            ServiceRequest::List { path } => ServiceResponse::List(self.service.list(path).await?),
            ServiceRequest::CreateFile { path } => {
                ServiceResponse::FileCreated(self.service.create_file(path).await?)
            }
            ServiceRequest::CreateDirectory { path } => {
                ServiceResponse::DirectoryCreated(self.service.create_directory(path).await?)
            }
            ServiceRequest::Delete { path } => {
                ServiceResponse::Deleted(self.service.delete(path).await?)
            }
            ServiceRequest::GetStorage { path } => {
                ServiceResponse::Storage(self.service.get_storage(path).await?)
            }
        };
        Ok(response)
    }
}

impl RpcHandler for ServiceHandler {
    fn handle(
        &self,
        request: Frame,
    ) -> Pin<Box<dyn Future<Output = loomfs_transport::Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let decoded: ServiceRequest = deserialize_message(&request.payload)?;
            let response = self.dispatch(decoded).await;
            serialize_message(&response)
        })
    }
}

struct RegistrationHandler {
    service: NamingService,
}

impl RpcHandler for RegistrationHandler {
    fn handle(
        &self,
        request: Frame,
    ) -> Pin<Box<dyn Future<Output = loomfs_transport::Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let decoded: RegisterRequest = deserialize_message(&request.payload)?;
            let response: Result<RegisterResponse, RemoteError> = self
                .service
                .register(decoded.storage, decoded.command, &decoded.files)
                .map(|prune| RegisterResponse { prune })
                .map_err(RemoteError::from);
            serialize_message(&response)
        })
    }
}
