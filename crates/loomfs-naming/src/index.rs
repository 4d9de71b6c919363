//! In-memory directory tree index.
//!
//! The index maps every known path to the storage servers holding it and
//! their command endpoints. Directories mostly exist by implication: a path
//! is a directory when some file lives beneath it. Directories created
//! explicitly through the service interface are recorded in a marker set so
//! they remain distinguishable from nonexistent paths while empty.
//!
//! All methods assume the caller holds the namespace monitor; the index
//! itself performs no locking.

use std::collections::{BTreeSet, HashMap, HashSet};

use loomfs_common::{CommandEndpoint, Path, StorageEndpoint};

use crate::error::NamingError;

/// A registered storage server: the pair of endpoints admitted together.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisteredServer {
    /// Client-facing file I/O endpoint.
    pub storage: StorageEndpoint,
    /// Naming-server-facing command endpoint.
    pub command: CommandEndpoint,
}

/// The naming server's directory tree state.
#[derive(Debug, Default)]
pub struct TreeIndex {
    storage_map: HashMap<Path, Vec<StorageEndpoint>>,
    command_map: HashMap<Path, Vec<CommandEndpoint>>,
    created_dirs: HashSet<Path>,
    access_count: HashMap<Path, u64>,
    servers: Vec<RegisteredServer>,
}

impl TreeIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true iff `path` is present: it is root, an explicitly
    /// created directory, a file key, or an ancestor of a file key.
    pub fn contains(&self, path: &Path) -> bool {
        if path.is_root() || self.created_dirs.contains(path) {
            return true;
        }
        self.storage_map.keys().any(|key| key.starts_with(path))
    }

    /// Returns true iff `path` names a directory. Root is always a
    /// directory; an explicitly created directory is one; otherwise a path
    /// is a directory exactly when some key lies strictly beneath it.
    pub fn is_directory(&self, path: &Path) -> Result<bool, NamingError> {
        if path.is_root() {
            return Ok(true);
        }
        if !self.contains(path) {
            return Err(NamingError::NotFound(path.clone()));
        }
        if self.created_dirs.contains(path) {
            return Ok(true);
        }
        Ok(self
            .storage_map
            .keys()
            .any(|key| key != path && key.starts_with(path)))
    }

    /// Returns the direct child names under `dir`, deduplicated and sorted.
    pub fn list(&self, dir: &Path) -> Result<Vec<String>, NamingError> {
        if !self.is_directory(dir)? {
            return Err(NamingError::NotFound(dir.clone()));
        }
        let names: BTreeSet<&str> = self
            .storage_map
            .keys()
            .filter_map(|key| key.direct_child(dir))
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    /// Appends a replica to the endpoint lists for `path`, creating the
    /// key if absent.
    pub fn add_replica(&mut self, path: &Path, storage: StorageEndpoint, command: CommandEndpoint) {
        self.storage_map
            .entry(path.clone())
            .or_default()
            .push(storage);
        self.command_map
            .entry(path.clone())
            .or_default()
            .push(command);
    }

    /// Records `path` as an explicitly created directory.
    pub fn mark_directory(&mut self, path: &Path) {
        self.created_dirs.insert(path.clone());
    }

    /// Removes `path` and every key beneath it from all maps and from the
    /// directory marker set.
    pub fn remove_subtree(&mut self, path: &Path) {
        self.storage_map.retain(|key, _| !key.starts_with(path));
        self.command_map.retain(|key, _| !key.starts_with(path));
        self.created_dirs.retain(|key| !key.starts_with(path));
        self.access_count.retain(|key, _| !key.starts_with(path));
    }

    /// The first storage endpoint recorded for exactly `path`.
    pub fn storage_for(&self, path: &Path) -> Option<StorageEndpoint> {
        self.storage_map.get(path).and_then(|list| list.first()).copied()
    }

    /// The first command endpoint recorded for exactly `path`.
    pub fn command_for(&self, path: &Path) -> Option<CommandEndpoint> {
        self.command_map.get(path).and_then(|list| list.first()).copied()
    }

    /// The first storage endpoint recorded for any key at or beneath
    /// `dir`. This is how directories without an entry of their own (the
    /// root, and directories inferred from their contents) resolve to a
    /// server.
    pub fn storage_under(&self, dir: &Path) -> Option<StorageEndpoint> {
        self.storage_map
            .iter()
            .find(|(key, _)| key.starts_with(dir))
            .and_then(|(_, list)| list.first())
            .copied()
    }

    /// The first command endpoint recorded for any key at or beneath `dir`.
    pub fn command_under(&self, dir: &Path) -> Option<CommandEndpoint> {
        self.command_map
            .iter()
            .find(|(key, _)| key.starts_with(dir))
            .and_then(|(_, list)| list.first())
            .copied()
    }

    /// All storage endpoints currently recorded for `path`.
    pub fn replicas(&self, path: &Path) -> Vec<StorageEndpoint> {
        self.storage_map.get(path).cloned().unwrap_or_default()
    }

    /// Bumps the read-access counter for `path` and returns the new count.
    pub fn note_read_access(&mut self, path: &Path) -> u64 {
        let count = self.access_count.entry(path.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Admits a server's endpoint pair. Fails if either endpoint is
    /// already registered.
    pub fn admit_server(
        &mut self,
        storage: StorageEndpoint,
        command: CommandEndpoint,
    ) -> Result<(), NamingError> {
        if self
            .servers
            .iter()
            .any(|s| s.storage == storage || s.command == command)
        {
            return Err(NamingError::AlreadyRegistered);
        }
        self.servers.push(RegisteredServer { storage, command });
        Ok(())
    }

    /// The registered servers, in registration order.
    pub fn servers(&self) -> &[RegisteredServer] {
        &self.servers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn server(port: u16) -> RegisteredServer {
        RegisteredServer {
            storage: StorageEndpoint::new(format!("127.0.0.1:{port}").parse().unwrap()),
            command: CommandEndpoint::new(format!("127.0.0.1:{}", port + 1).parse().unwrap()),
        }
    }

    fn index_with(files: &[&str], srv: RegisteredServer) -> TreeIndex {
        let mut index = TreeIndex::new();
        index.admit_server(srv.storage, srv.command).unwrap();
        for file in files {
            index.add_replica(&p(file), srv.storage, srv.command);
        }
        index
    }

    #[test]
    fn test_contains_files_and_ancestors() {
        let index = index_with(&["/a", "/b/c"], server(8801));
        assert!(index.contains(&Path::root()));
        assert!(index.contains(&p("/a")));
        assert!(index.contains(&p("/b")));
        assert!(index.contains(&p("/b/c")));
        assert!(!index.contains(&p("/b/c/d")));
        assert!(!index.contains(&p("/nonexistent")));
    }

    #[test]
    fn test_is_directory_disambiguation() {
        let index = index_with(&["/a", "/b/c"], server(8801));
        assert!(index.is_directory(&Path::root()).unwrap());
        assert!(!index.is_directory(&p("/a")).unwrap());
        assert!(index.is_directory(&p("/b")).unwrap());
        assert!(!index.is_directory(&p("/b/c")).unwrap());
        assert!(matches!(
            index.is_directory(&p("/nonexistent")),
            Err(NamingError::NotFound(_))
        ));
    }

    #[test]
    fn test_created_directory_is_directory_while_empty() {
        let srv = server(8801);
        let mut index = index_with(&["/a"], srv);
        index.add_replica(&p("/x"), srv.storage, srv.command);
        index.mark_directory(&p("/x"));
        assert!(index.is_directory(&p("/x")).unwrap());
        assert_eq!(index.list(&p("/x")).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_list_direct_children_deduplicated() {
        let index = index_with(&["/a", "/b/c", "/b/d", "/b/d2/e"], server(8801));
        assert_eq!(index.list(&Path::root()).unwrap(), vec!["a", "b"]);
        assert_eq!(index.list(&p("/b")).unwrap(), vec!["c", "d", "d2"]);
    }

    #[test]
    fn test_list_of_file_fails() {
        let index = index_with(&["/a"], server(8801));
        assert!(matches!(
            index.list(&p("/a")),
            Err(NamingError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_subtree() {
        let mut index = index_with(&["/a/b", "/a/d", "/e"], server(8801));
        index.remove_subtree(&p("/a"));
        assert!(!index.contains(&p("/a")));
        assert!(!index.contains(&p("/a/b")));
        assert!(!index.contains(&p("/a/d")));
        assert!(index.contains(&p("/e")));
        assert_eq!(index.list(&Path::root()).unwrap(), vec!["e"]);
    }

    #[test]
    fn test_remove_subtree_does_not_clip_siblings_by_name_prefix() {
        let mut index = index_with(&["/ab", "/a"], server(8801));
        index.remove_subtree(&p("/a"));
        assert!(index.contains(&p("/ab")));
        assert!(!index.contains(&p("/a")));
    }

    #[test]
    fn test_storage_under_finds_subtree_entry() {
        let srv = server(8801);
        let index = index_with(&["/b/c"], srv);
        // The inferred directory /b has no entry of its own.
        assert_eq!(index.storage_for(&p("/b")), None);
        assert_eq!(index.storage_under(&p("/b")), Some(srv.storage));
        assert_eq!(index.storage_under(&Path::root()), Some(srv.storage));
        assert_eq!(index.storage_under(&p("/z")), None);
    }

    #[test]
    fn test_replica_order_is_insertion_order() {
        let first = server(8801);
        let second = server(9901);
        let mut index = index_with(&["/a"], first);
        index.admit_server(second.storage, second.command).unwrap();
        index.add_replica(&p("/a"), second.storage, second.command);
        assert_eq!(index.storage_for(&p("/a")), Some(first.storage));
        assert_eq!(
            index.replicas(&p("/a")),
            vec![first.storage, second.storage]
        );
    }

    #[test]
    fn test_admit_server_rejects_duplicates() {
        let srv = server(8801);
        let mut index = TreeIndex::new();
        index.admit_server(srv.storage, srv.command).unwrap();
        assert!(matches!(
            index.admit_server(srv.storage, srv.command),
            Err(NamingError::AlreadyRegistered)
        ));
        // A duplicate on either endpoint alone is enough.
        let other = server(9901);
        assert!(matches!(
            index.admit_server(srv.storage, other.command),
            Err(NamingError::AlreadyRegistered)
        ));
        assert!(matches!(
            index.admit_server(other.storage, srv.command),
            Err(NamingError::AlreadyRegistered)
        ));
    }

    #[test]
    fn test_note_read_access_counts_per_path() {
        let mut index = index_with(&["/a", "/b"], server(8801));
        assert_eq!(index.note_read_access(&p("/a")), 1);
        assert_eq!(index.note_read_access(&p("/a")), 2);
        assert_eq!(index.note_read_access(&p("/b")), 1);
    }
}
