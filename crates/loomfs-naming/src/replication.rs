//! Read-driven replication.
//!
//! Every [`REPLICATION_READ_INTERVAL`]-th shared-lock admission on a path
//! submits it here. The controller takes an exclusive lock on the path,
//! picks a registered server that does not yet hold a replica, instructs it
//! to pull the file from the current first replica, and records the new
//! replica in the index. With no candidate server the submission is a
//! no-op.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use loomfs_common::Path;
use loomfs_transport::CommandClient;

use crate::error::NamingError;
use crate::namespace::Namespace;

/// Shared-lock admissions between replication triggers on a path.
pub const REPLICATION_READ_INTERVAL: u64 = 20;

/// Asynchronous worker draining replication submissions.
pub struct ReplicationController {
    namespace: Arc<Namespace>,
    requests: mpsc::UnboundedReceiver<Path>,
}

impl ReplicationController {
    /// Pairs a controller with the namespace whose submissions it drains.
    pub fn new(namespace: Arc<Namespace>, requests: mpsc::UnboundedReceiver<Path>) -> Self {
        Self {
            namespace,
            requests,
        }
    }

    /// Runs until the submission channel closes.
    pub async fn run(mut self) {
        while let Some(path) = self.requests.recv().await {
            match self.replicate(&path).await {
                Ok(true) => info!(path = %path, "added replica"),
                Ok(false) => debug!(path = %path, "no replication performed"),
                Err(e) => warn!(path = %path, error = %e, "replication failed"),
            }
        }
    }

    async fn replicate(&self, path: &Path) -> Result<bool, NamingError> {
        let namespace = self.namespace.clone();
        let target = path.clone();
        let locked = tokio::task::spawn_blocking(move || namespace.lock(&target, true))
            .await
            .map_err(|e| NamingError::Internal(e.to_string()))?;
        match locked {
            // Deleted between trigger and replication; nothing to do.
            Err(NamingError::NotFound(_)) => return Ok(false),
            other => other?,
        }
        let outcome = self.copy_to_candidate(path).await;
        self.namespace.unlock(path, true)?;
        outcome
    }

    async fn copy_to_candidate(&self, path: &Path) -> Result<bool, NamingError> {
        let (source, candidate) = self.namespace.with_state(|state| {
            let replicas = state.index.replicas(path);
            let source = replicas.first().copied();
            let candidate = state
                .index
                .servers()
                .iter()
                .find(|server| !replicas.contains(&server.storage))
                .copied();
            (source, candidate)
        })?;
        let (Some(source), Some(candidate)) = (source, candidate) else {
            return Ok(false);
        };

        // The monitor is released here; only the path lock is held across
        // the outbound copy.
        let client = CommandClient::connect(candidate.command.addr()).await?;
        if !client.copy(path, source).await? {
            return Ok(false);
        }

        self.namespace.with_state(|state| {
            state
                .index
                .add_replica(path, candidate.storage, candidate.command);
        })?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use loomfs_common::{CommandEndpoint, StorageEndpoint};
    use loomfs_transport::{
        deserialize_message, serialize_message, CommandRequest, CommandResponse, Frame,
        RemoteError, RpcHandler, RpcServer,
    };

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    struct CopyCountingHandler {
        copies: Arc<AtomicUsize>,
    }

    impl RpcHandler for CopyCountingHandler {
        fn handle(
            &self,
            request: Frame,
        ) -> Pin<Box<dyn Future<Output = loomfs_transport::Result<Vec<u8>>> + Send + '_>> {
            Box::pin(async move {
                let decoded: CommandRequest = deserialize_message(&request.payload)?;
                let response: Result<CommandResponse, RemoteError> = match decoded {
                    CommandRequest::Copy { .. } => {
                        self.copies.fetch_add(1, Ordering::SeqCst);
                        Ok(CommandResponse::Copied(true))
                    }
                    _ => Err(RemoteError::Internal("unexpected command".into())),
                };
                serialize_message(&response)
            })
        }
    }

    async fn spawn_command_stub(copies: Arc<AtomicUsize>) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = RpcServer::serve(listener, Arc::new(CopyCountingHandler { copies })).await;
        });
        addr
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replication_adds_replica_on_spare_server() {
        let copies = Arc::new(AtomicUsize::new(0));
        let command_addr = spawn_command_stub(copies.clone()).await;

        let (namespace, rx) = Namespace::new();
        let namespace = Arc::new(namespace);

        let holder = StorageEndpoint::new("127.0.0.1:8801".parse().unwrap());
        let holder_cmd = CommandEndpoint::new("127.0.0.1:8802".parse().unwrap());
        let spare = StorageEndpoint::new("127.0.0.1:8901".parse().unwrap());
        let spare_cmd = CommandEndpoint::new(command_addr);

        namespace
            .with_state(|state| {
                state.index.admit_server(holder, holder_cmd).unwrap();
                state.index.admit_server(spare, spare_cmd).unwrap();
                state.index.add_replica(&p("/hot"), holder, holder_cmd);
            })
            .unwrap();

        tokio::spawn(ReplicationController::new(namespace.clone(), rx).run());

        for _ in 0..REPLICATION_READ_INTERVAL {
            namespace.lock(&p("/hot"), false).unwrap();
            namespace.unlock(&p("/hot"), false).unwrap();
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let replicas = namespace
                .with_state(|state| state.index.replicas(&p("/hot")))
                .unwrap();
            if replicas.len() == 2 {
                assert_eq!(replicas, vec![holder, spare]);
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "replica never appeared"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(copies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replication_noop_without_candidate() {
        let (namespace, rx) = Namespace::new();
        let namespace = Arc::new(namespace);

        let holder = StorageEndpoint::new("127.0.0.1:8801".parse().unwrap());
        let holder_cmd = CommandEndpoint::new("127.0.0.1:8802".parse().unwrap());
        namespace
            .with_state(|state| {
                state.index.admit_server(holder, holder_cmd).unwrap();
                state.index.add_replica(&p("/hot"), holder, holder_cmd);
            })
            .unwrap();

        tokio::spawn(ReplicationController::new(namespace.clone(), rx).run());

        for _ in 0..REPLICATION_READ_INTERVAL {
            namespace.lock(&p("/hot"), false).unwrap();
            namespace.unlock(&p("/hot"), false).unwrap();
        }

        // Give the controller a moment, then confirm nothing changed and
        // the path is lockable again (the exclusive lock was released).
        tokio::time::sleep(Duration::from_millis(200)).await;
        let replicas = namespace
            .with_state(|state| state.index.replicas(&p("/hot")))
            .unwrap();
        assert_eq!(replicas, vec![holder]);
        namespace.lock(&p("/hot"), true).unwrap();
        namespace.unlock(&p("/hot"), true).unwrap();
    }
}
