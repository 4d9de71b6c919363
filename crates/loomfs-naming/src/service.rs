//! The naming server's client-facing operations.
//!
//! Each operation validates against the tree index under the namespace
//! monitor, issues at most one command to a storage server with the
//! monitor released, then reacquires the monitor to record the outcome.
//! Blocking lock acquisitions run on the blocking thread pool so they
//! never stall the async runtime.

use std::sync::Arc;

use loomfs_common::{CommandEndpoint, Path, StorageEndpoint};
use loomfs_transport::CommandClient;

use crate::error::NamingError;
use crate::namespace::Namespace;

/// Dispatcher for the service and registration interfaces.
#[derive(Clone)]
pub struct NamingService {
    namespace: Arc<Namespace>,
}

impl NamingService {
    /// Wraps a namespace in the service dispatcher.
    pub fn new(namespace: Arc<Namespace>) -> Self {
        Self { namespace }
    }

    /// The namespace this service operates on.
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Acquires a shared or exclusive lock on `path` on behalf of a client.
    pub async fn lock(&self, path: Path, exclusive: bool) -> Result<(), NamingError> {
        let namespace = self.namespace.clone();
        tokio::task::spawn_blocking(move || namespace.lock(&path, exclusive))
            .await
            .map_err(|e| NamingError::Internal(e.to_string()))?
    }

    /// Releases a client-held lock on `path`.
    pub fn unlock(&self, path: &Path, exclusive: bool) -> Result<(), NamingError> {
        self.namespace.unlock(path, exclusive)
    }

    /// Returns true iff `path` names a directory. Takes (and releases) a
    /// shared lock on the path, so the answer reflects a quiescent tree.
    pub async fn is_directory(&self, path: Path) -> Result<bool, NamingError> {
        if path.is_root() {
            return Ok(true);
        }
        let namespace = self.namespace.clone();
        tokio::task::spawn_blocking(move || {
            namespace.lock(&path, false)?;
            let verdict = namespace.with_state(|state| state.index.is_directory(&path))?;
            namespace.unlock(&path, false)?;
            verdict
        })
        .await
        .map_err(|e| NamingError::Internal(e.to_string()))?
    }

    /// Lists the direct children of the directory at `path`.
    pub async fn list(&self, path: Path) -> Result<Vec<String>, NamingError> {
        self.namespace
            .with_state(|state| state.index.list(&path))?
    }

    /// Creates an empty file at `path`. Returns false if the path already
    /// exists (or is root); fails if the parent is missing or is a file.
    ///
    /// The hosting server is borrowed from the parent directory's subtree
    /// and told to create the file before the index records it.
    pub async fn create_file(&self, path: Path) -> Result<bool, NamingError> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        let prepared = self.namespace.with_state(
            |state| -> Result<Option<(StorageEndpoint, CommandEndpoint)>, NamingError> {
                if state.index.contains(&path) {
                    return Ok(None);
                }
                if !state.index.is_directory(&parent)? {
                    return Err(NamingError::NotFound(parent.clone()));
                }
                if state.index.servers().is_empty() {
                    return Err(NamingError::NoStorages);
                }
                let storage = state
                    .index
                    .storage_under(&parent)
                    .ok_or_else(|| NamingError::NotFound(parent.clone()))?;
                let command = state
                    .index
                    .command_under(&parent)
                    .ok_or_else(|| NamingError::NotFound(parent.clone()))?;
                Ok(Some((storage, command)))
            },
        )??;
        let Some((storage, command)) = prepared else {
            return Ok(false);
        };

        let client = CommandClient::connect(command.addr()).await?;
        if !client.create(&path).await? {
            return Ok(false);
        }

        self.namespace
            .with_state(|state| state.index.add_replica(&path, storage, command))?;
        Ok(true)
    }

    /// Creates a directory at `path`. Returns false if the path already
    /// exists (or is root).
    ///
    /// The directory borrows its endpoints from the parent's subtree but
    /// no storage server is contacted: directories materialize on disk
    /// only when files are created beneath them.
    pub async fn create_directory(&self, path: Path) -> Result<bool, NamingError> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        self.namespace
            .with_state(|state| -> Result<bool, NamingError> {
                if !state.index.is_directory(&parent)? {
                    return Err(NamingError::NotFound(parent.clone()));
                }
                if state.index.contains(&path) {
                    return Ok(false);
                }
                let storage = state
                    .index
                    .storage_under(&parent)
                    .ok_or_else(|| NamingError::NotFound(parent.clone()))?;
                let command = state
                    .index
                    .command_under(&parent)
                    .ok_or_else(|| NamingError::NotFound(parent.clone()))?;
                state.index.add_replica(&path, storage, command);
                state.index.mark_directory(&path);
                Ok(true)
            })?
    }

    /// Deletes the file or directory subtree at `path`. One command
    /// endpoint found in the target's subtree is instructed to delete; on
    /// success the subtree disappears from the index.
    pub async fn delete(&self, path: Path) -> Result<bool, NamingError> {
        if path.is_root() {
            return Ok(false);
        }
        let command = self
            .namespace
            .with_state(|state| -> Result<CommandEndpoint, NamingError> {
                if !state.index.contains(&path) {
                    return Err(NamingError::NotFound(path.clone()));
                }
                state
                    .index
                    .command_under(&path)
                    .ok_or_else(|| NamingError::NotFound(path.clone()))
            })??;

        let client = CommandClient::connect(command.addr()).await?;
        if !client.delete(&path).await? {
            return Ok(false);
        }

        self.namespace
            .with_state(|state| state.index.remove_subtree(&path))?;
        Ok(true)
    }

    /// Resolves the storage server hosting the file at `path`.
    pub async fn get_storage(&self, path: Path) -> Result<StorageEndpoint, NamingError> {
        self.namespace.with_state(|state| {
            state
                .index
                .storage_for(&path)
                .ok_or_else(|| NamingError::NotFound(path.clone()))
        })?
    }

    /// Registers a storage server's endpoint pair and advertised files.
    pub fn register(
        &self,
        storage: StorageEndpoint,
        command: CommandEndpoint,
        files: &[Path],
    ) -> Result<Vec<Path>, NamingError> {
        self.namespace.register(storage, command, files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use loomfs_transport::{
        deserialize_message, serialize_message, CommandRequest, CommandResponse, Frame,
        RemoteError, RpcHandler, RpcServer,
    };

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    struct StubCommandServer {
        creates: Arc<AtomicUsize>,
        deletes: Arc<AtomicUsize>,
    }

    impl RpcHandler for StubCommandServer {
        fn handle(
            &self,
            request: Frame,
        ) -> Pin<Box<dyn Future<Output = loomfs_transport::Result<Vec<u8>>> + Send + '_>> {
            Box::pin(async move {
                let decoded: CommandRequest = deserialize_message(&request.payload)?;
                let response: Result<CommandResponse, RemoteError> = match decoded {
                    CommandRequest::Create { .. } => {
                        self.creates.fetch_add(1, Ordering::SeqCst);
                        Ok(CommandResponse::Created(true))
                    }
                    CommandRequest::Delete { .. } => {
                        self.deletes.fetch_add(1, Ordering::SeqCst);
                        Ok(CommandResponse::Deleted(true))
                    }
                    CommandRequest::Copy { .. } => Ok(CommandResponse::Copied(false)),
                };
                serialize_message(&response)
            })
        }
    }

    struct Fixture {
        service: NamingService,
        creates: Arc<AtomicUsize>,
        deletes: Arc<AtomicUsize>,
    }

    /// A service whose single registered server answers commands from an
    /// in-process stub.
    async fn fixture_with(files: &[&str]) -> Fixture {
        let creates = Arc::new(AtomicUsize::new(0));
        let deletes = Arc::new(AtomicUsize::new(0));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let command_addr = listener.local_addr().unwrap();
        let handler = StubCommandServer {
            creates: creates.clone(),
            deletes: deletes.clone(),
        };
        tokio::spawn(async move {
            let _ = RpcServer::serve(listener, Arc::new(handler)).await;
        });

        let (namespace, _rx) = Namespace::new();
        let namespace = Arc::new(namespace);
        let service = NamingService::new(namespace);

        let storage = StorageEndpoint::new("127.0.0.1:8801".parse().unwrap());
        let command = CommandEndpoint::new(command_addr);
        let advertised: Vec<Path> = files.iter().map(|f| p(f)).collect();
        service.register(storage, command, &advertised).unwrap();

        Fixture {
            service,
            creates,
            deletes,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_directory_then_file() {
        // Creating a directory succeeds once, and a file created beneath
        // it shows up in its listing.
        let fx = fixture_with(&["/seed"]).await;

        assert!(fx.service.create_directory(p("/x")).await.unwrap());
        assert!(!fx.service.create_directory(p("/x")).await.unwrap());

        assert!(fx.service.create_file(p("/x/y")).await.unwrap());
        assert_eq!(fx.creates.load(Ordering::SeqCst), 1);

        assert!(fx.service.is_directory(p("/x")).await.unwrap());
        assert_eq!(fx.service.list(p("/x")).await.unwrap(), vec!["y"]);
        assert!(!fx.service.is_directory(p("/x/y")).await.unwrap());
        fx.service.get_storage(p("/x/y")).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_file_existing_returns_false_without_rpc() {
        let fx = fixture_with(&["/a"]).await;
        assert!(!fx.service.create_file(p("/a")).await.unwrap());
        assert_eq!(fx.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_file_under_file_parent_fails() {
        let fx = fixture_with(&["/a"]).await;
        assert!(matches!(
            fx.service.create_file(p("/a/b")).await,
            Err(NamingError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_in_root_of_empty_namespace_requires_storage() {
        let (namespace, _rx) = Namespace::new();
        let service = NamingService::new(Arc::new(namespace));
        assert!(matches!(
            service.create_file(p("/a")).await,
            Err(NamingError::NoStorages)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_first_file_in_empty_namespace() {
        // A server that advertised only its root can still host the first
        // file ever created.
        let fx = fixture_with(&["/"]).await;
        assert!(fx.service.create_file(p("/first")).await.unwrap());
        assert_eq!(fx.creates.load(Ordering::SeqCst), 1);
        assert_eq!(fx.service.list(Path::root()).await.unwrap(), vec!["first"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_root_operations_return_false() {
        let fx = fixture_with(&["/a"]).await;
        assert!(!fx.service.create_file(Path::root()).await.unwrap());
        assert!(!fx.service.create_directory(Path::root()).await.unwrap());
        assert!(!fx.service.delete(Path::root()).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_subtree() {
        // Deleting a directory removes every descendant from the tree.
        let fx = fixture_with(&["/a/b", "/a/b/sub/c", "/keep"]).await;

        assert!(fx.service.delete(p("/a")).await.unwrap());
        assert_eq!(fx.deletes.load(Ordering::SeqCst), 1);

        for gone in ["/a", "/a/b", "/a/b/sub/c"] {
            assert!(matches!(
                fx.service.is_directory(p(gone)).await,
                Err(NamingError::NotFound(_))
            ));
        }
        assert_eq!(fx.service.list(Path::root()).await.unwrap(), vec!["keep"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_missing_path_fails() {
        let fx = fixture_with(&["/a"]).await;
        assert!(matches!(
            fx.service.delete(p("/missing")).await,
            Err(NamingError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_storage_requires_exact_entry() {
        let fx = fixture_with(&["/dir/file"]).await;
        fx.service.get_storage(p("/dir/file")).await.unwrap();
        // The inferred directory /dir has no entry of its own.
        assert!(matches!(
            fx.service.get_storage(p("/dir")).await,
            Err(NamingError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_is_directory_nonexistent_fails() {
        // Files and inferred directories disambiguate; unknown paths
        // surface NotFound.
        let fx = fixture_with(&["/a", "/b/c"]).await;
        assert!(!fx.service.is_directory(p("/a")).await.unwrap());
        assert!(fx.service.is_directory(p("/b")).await.unwrap());
        assert!(!fx.service.is_directory(p("/b/c")).await.unwrap());
        assert!(matches!(
            fx.service.is_directory(p("/nonexistent")).await,
            Err(NamingError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lock_unlock_via_service() {
        let fx = fixture_with(&["/a"]).await;
        fx.service.lock(p("/a"), false).await.unwrap();
        fx.service.unlock(&p("/a"), false).unwrap();
        assert!(matches!(
            fx.service.unlock(&p("/a"), false),
            Err(NamingError::BadUnlock(_))
        ));
    }
}
