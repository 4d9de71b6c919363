//! Local file hosting beneath a configured root directory.
//!
//! Paths from the namespace map onto the local filesystem by appending
//! their components to the root. Plain operations are synchronous and
//! short; only [`LocalStore::copy`] awaits, because it streams chunks from
//! a peer server.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

use loomfs_common::{Path, StorageEndpoint};
use loomfs_transport::StorageClient;

use crate::error::StorageError;

/// Chunk size for pulling a file from a peer during [`LocalStore::copy`].
pub const COPY_CHUNK_SIZE: u32 = 1024;

/// File operations rooted at a local directory.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `root`. The directory must already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    /// The local root directory.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        path.to_local(&self.root)
    }

    /// Every regular file beneath the root, as namespace paths. Directories
    /// are traversed but not reported; they exist in the namespace through
    /// the files they contain.
    pub fn files(&self) -> Result<Vec<Path>, StorageError> {
        let mut files = Vec::new();
        self.scan(&self.root, &Path::root(), &mut files)?;
        Ok(files)
    }

    fn scan(
        &self,
        dir: &std::path::Path,
        logical: &Path,
        out: &mut Vec<Path>,
    ) -> Result<(), StorageError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(name = ?entry.file_name(), "skipping non-UTF-8 file name");
                continue;
            };
            let child = match logical.child(name) {
                Ok(child) => child,
                Err(e) => {
                    warn!(name, error = %e, "skipping unrepresentable file name");
                    continue;
                }
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.scan(&entry.path(), &child, out)?;
            } else if file_type.is_file() {
                out.push(child);
            }
        }
        Ok(())
    }

    /// Length of the regular file at `path`. Directories and missing
    /// paths both report not-found.
    pub fn size(&self, path: &Path) -> Result<u64, StorageError> {
        let local = self.resolve(path);
        match fs::metadata(&local) {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(StorageError::NotFound(path.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads exactly `length` bytes starting at `offset`. The whole range
    /// must lie within the file.
    pub fn read(&self, path: &Path, offset: u64, length: u32) -> Result<Vec<u8>, StorageError> {
        let size = self.size(path)?;
        match offset.checked_add(u64::from(length)) {
            Some(end) if end <= size => {}
            _ => {
                return Err(StorageError::OutOfBounds {
                    offset,
                    length,
                    size,
                })
            }
        }

        let mut file = fs::File::open(self.resolve(path))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; length as usize];
        file.read_exact(&mut data)?;
        Ok(data)
    }

    /// Writes `data` at `offset`, extending the file as needed. The file
    /// must already exist as a regular file.
    pub fn write(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        // Reject directories and missing files up front.
        self.size(path)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .open(self.resolve(path))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Creates an empty regular file at `path`, creating parent
    /// directories as needed. Returns false if the file already exists or
    /// creation fails; never creates the root.
    pub fn create(&self, path: &Path) -> bool {
        if path.is_root() {
            return false;
        }
        let local = self.resolve(path);
        if let Some(parent) = local.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                debug!(path = %path, error = %e, "could not create parent directories");
                return false;
            }
        }
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&local)
        {
            Ok(_) => true,
            Err(e) => {
                debug!(path = %path, error = %e, "create failed");
                false
            }
        }
    }

    /// Recursively deletes the subtree at `path`. Refuses the root.
    /// Returns true iff nothing remains at `path` afterwards.
    pub fn delete(&self, path: &Path) -> bool {
        if path.is_root() {
            return false;
        }
        let local = self.resolve(path);
        let meta = match fs::symlink_metadata(&local) {
            Ok(meta) => meta,
            // Nothing there: the subtree is already absent.
            Err(_) => return true,
        };
        let result = if meta.is_dir() {
            fs::remove_dir_all(&local)
        } else {
            fs::remove_file(&local)
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path, error = %e, "delete failed");
                false
            }
        }
    }

    /// Pulls the file at `path` from `peer` in [`COPY_CHUNK_SIZE`] chunks.
    /// On any failure after the local file was created, the partial file is
    /// deleted before the error propagates.
    pub async fn copy(&self, path: &Path, peer: StorageEndpoint) -> Result<(), StorageError> {
        let client = StorageClient::connect(peer.addr()).await?;
        let total = client.size(path).await?;
        if !self.create(path) {
            return Err(StorageError::CreateFailed(path.clone()));
        }
        if let Err(e) = self.pull(&client, path, total).await {
            self.delete(path);
            return Err(e);
        }
        Ok(())
    }

    async fn pull(
        &self,
        client: &StorageClient,
        path: &Path,
        total: u64,
    ) -> Result<(), StorageError> {
        let mut offset = 0u64;
        while offset < total {
            let chunk = (total - offset).min(u64::from(COPY_CHUNK_SIZE)) as u32;
            let data = client.read(path, offset, chunk).await?;
            self.write(path, offset, &data)?;
            offset += u64::from(chunk);
        }
        Ok(())
    }
}
