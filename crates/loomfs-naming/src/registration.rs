//! Reconciliation of a joining storage server's file list with the
//! existing namespace.
//!
//! The joining server advertises every file under its local root. Files a
//! peer already owns are returned to the caller for local deletion; the
//! rest are admitted into the index as the new server's stubs. Ancestor
//! directories are never inserted: they exist by implication through
//! containment checks.

use loomfs_common::{CommandEndpoint, Path, StorageEndpoint};

use crate::error::NamingError;
use crate::index::TreeIndex;

/// Merges a storage server's advertised `files` into the index.
///
/// Fails with [`NamingError::AlreadyRegistered`] before touching the index
/// if either endpoint is already known. Returns the paths the caller must
/// delete locally. An advertised root is never pruned; it is recorded so
/// that an otherwise empty namespace still resolves to a server when the
/// first file is created.
pub fn reconcile(
    index: &mut TreeIndex,
    storage: StorageEndpoint,
    command: CommandEndpoint,
    files: &[Path],
) -> Result<Vec<Path>, NamingError> {
    index.admit_server(storage, command)?;
    let mut prune = Vec::new();
    for file in files {
        if index.contains(file) && !file.is_root() {
            prune.push(file.clone());
        } else {
            index.add_replica(file, storage, command);
        }
    }
    tracing::info!(
        storage = %storage,
        command = %command,
        advertised = files.len(),
        pruned = prune.len(),
        "storage server registered"
    );
    Ok(prune)
}
