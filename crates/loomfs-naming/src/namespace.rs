//! The namespace monitor: one mutex guarding the tree index and the lock
//! queue, with a condition variable for lock waiters.
//!
//! Every metadata operation works through this monitor. Lock admission is
//! the only place a thread suspends while holding its queue slot; all other
//! operations hold the mutex briefly and never across an outbound RPC. The
//! discipline for operations that call out to a storage server is: take the
//! monitor, decide the remote call, drop the monitor, perform the call,
//! reacquire, mutate the index.

use std::sync::{Condvar, Mutex, MutexGuard};

use tokio::sync::mpsc;

use loomfs_common::{CommandEndpoint, Path, StorageEndpoint};

use crate::error::NamingError;
use crate::index::TreeIndex;
use crate::locking::{LockQueue, LockRequest};
use crate::registration;
use crate::replication::REPLICATION_READ_INTERVAL;

/// State guarded by the namespace monitor.
#[derive(Debug, Default)]
pub struct NamespaceState {
    /// Directory tree index.
    pub index: TreeIndex,
    /// Global FIFO lock queue.
    pub queue: LockQueue,
}

/// The naming server's shared mutable core.
pub struct Namespace {
    state: Mutex<NamespaceState>,
    released: Condvar,
    replication: mpsc::UnboundedSender<Path>,
}

impl Namespace {
    /// Creates an empty namespace. The returned receiver yields paths
    /// whose read count crossed the replication interval; hand it to a
    /// `ReplicationController`.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Path>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let namespace = Namespace {
            state: Mutex::new(NamespaceState::default()),
            released: Condvar::new(),
            replication: tx,
        };
        (namespace, rx)
    }

    fn guard(&self) -> Result<MutexGuard<'_, NamespaceState>, NamingError> {
        self.state
            .lock()
            .map_err(|e| NamingError::Internal(format!("namespace monitor poisoned: {e}")))
    }

    /// Runs `f` under the monitor.
    pub fn with_state<T>(
        &self,
        f: impl FnOnce(&mut NamespaceState) -> T,
    ) -> Result<T, NamingError> {
        let mut state = self.guard()?;
        Ok(f(&mut state))
    }

    /// Acquires a shared or exclusive lock on `path`, blocking the calling
    /// thread until every earlier conflicting request has been released.
    ///
    /// Fails with [`NamingError::NotFound`] if the path is absent from the
    /// namespace at any admission attempt; the queue slot is released
    /// before the error surfaces. A shared admission bumps the path's read
    /// count and, every [`REPLICATION_READ_INTERVAL`] reads, submits the
    /// path for replication without blocking.
    pub fn lock(&self, path: &Path, exclusive: bool) -> Result<(), NamingError> {
        let request = LockRequest {
            path: path.clone(),
            exclusive,
        };
        let mut state = self.guard()?;
        let ticket = state.queue.enqueue(request);
        loop {
            if !path.is_root() && !state.index.contains(path) {
                state.queue.abandon(ticket);
                drop(state);
                // The abandoned slot may have been the only obstacle for a
                // later request.
                self.released.notify_all();
                return Err(NamingError::NotFound(path.clone()));
            }
            if !state.queue.blocked(ticket) {
                if !exclusive {
                    let count = state.index.note_read_access(path);
                    if count % REPLICATION_READ_INTERVAL == 0 {
                        let _ = self.replication.send(path.clone());
                    }
                }
                return Ok(());
            }
            state = self
                .released
                .wait(state)
                .map_err(|e| NamingError::Internal(format!("namespace monitor poisoned: {e}")))?;
        }
    }

    /// Releases the first queued request matching `(path, exclusive)` and
    /// wakes all waiters so they re-evaluate admission.
    pub fn unlock(&self, path: &Path, exclusive: bool) -> Result<(), NamingError> {
        let request = LockRequest {
            path: path.clone(),
            exclusive,
        };
        let mut state = self.guard()?;
        if !state.queue.release(&request) {
            return Err(NamingError::BadUnlock(path.clone()));
        }
        drop(state);
        self.released.notify_all();
        Ok(())
    }

    /// Registers a storage server, reconciling its advertised files with
    /// the namespace. Serialized with all service operations.
    pub fn register(
        &self,
        storage: StorageEndpoint,
        command: CommandEndpoint,
        files: &[Path],
    ) -> Result<Vec<Path>, NamingError> {
        let mut state = self.guard()?;
        registration::reconcile(&mut state.index, storage, command, files)
    }
}
