//! Absolute hierarchical paths in the LoomFS namespace.
//!
//! A [`Path`] is an ordered sequence of non-empty components; the empty
//! sequence is the filesystem root. Paths are pure values with no relation
//! to the local filesystem except through [`Path::to_local`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separator character in the canonical string form.
pub const SEPARATOR: char = '/';

/// Errors produced when parsing or extending a path.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The string form did not begin with the separator.
    #[error("path is not absolute: {0:?}")]
    NotAbsolute(String),

    /// A component was empty or contained the separator.
    #[error("invalid path component: {0:?}")]
    InvalidComponent(String),
}

/// An absolute path in the namespace.
///
/// Two paths are equal iff their component sequences are equal. Ordering is
/// lexicographic by component, so a directory sorts immediately before its
/// contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    /// The root path, which has no components.
    pub fn root() -> Self {
        Path { components: Vec::new() }
    }

    /// Parses the canonical string form: `/` followed by components joined
    /// by `/`. Empty components are rejected, so `"/a//b"` and `"/a/"` are
    /// both invalid.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let rest = s
            .strip_prefix(SEPARATOR)
            .ok_or_else(|| PathError::NotAbsolute(s.to_string()))?;
        if rest.is_empty() {
            return Ok(Path::root());
        }
        let mut components = Vec::new();
        for component in rest.split(SEPARATOR) {
            if component.is_empty() {
                return Err(PathError::InvalidComponent(s.to_string()));
            }
            components.push(component.to_string());
        }
        Ok(Path { components })
    }

    /// Returns true iff this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of components between the root and this path.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Iterates over the components from root to leaf.
    pub fn components(&self) -> Components<'_> {
        Components {
            inner: self.components.iter(),
        }
    }

    /// The path with the final component removed, or `None` for root.
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(Path {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// The final component, or `None` for root.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Extends this path by one component. The component must be non-empty
    /// and must not contain the separator.
    pub fn child(&self, name: &str) -> Result<Path, PathError> {
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(PathError::InvalidComponent(name.to_string()));
        }
        let mut components = self.components.clone();
        components.push(name.to_string());
        Ok(Path { components })
    }

    /// Returns true iff this path lies at or beneath `ancestor`, i.e.
    /// `ancestor`'s component sequence is a prefix of this path's. Every
    /// path starts with itself and with root.
    pub fn starts_with(&self, ancestor: &Path) -> bool {
        self.components.len() >= ancestor.components.len()
            && self.components[..ancestor.components.len()] == ancestor.components[..]
    }

    /// The component of this path one level below `ancestor`: the first
    /// step from `ancestor` toward this path. `None` unless this path lies
    /// strictly beneath `ancestor`.
    pub fn direct_child(&self, ancestor: &Path) -> Option<&str> {
        if self == ancestor || !self.starts_with(ancestor) {
            return None;
        }
        Some(self.components[ancestor.components.len()].as_str())
    }

    /// Maps this path onto the local filesystem beneath `root`. Used only
    /// on the storage side.
    pub fn to_local(&self, root: &std::path::Path) -> PathBuf {
        let mut local = root.to_path_buf();
        for component in &self.components {
            local.push(component);
        }
        local
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "{}", SEPARATOR);
        }
        for component in &self.components {
            write!(f, "{}{}", SEPARATOR, component)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

// Paths travel on the wire in canonical string form.
impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Path::parse(&s).map_err(D::Error::custom)
    }
}

/// Read-only iterator over a path's components, root to leaf.
#[derive(Clone, Debug)]
pub struct Components<'a> {
    inner: std::slice::Iter<'a, String>,
}

impl<'a> Iterator for Components<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.inner.next().map(String::as_str)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> ExactSizeIterator for Components<'a> {}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a str;
    type IntoIter = Components<'a>;

    fn into_iter(self) -> Components<'a> {
        self.components()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_parse_root() {
        let root = p("/");
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root, Path::root());
    }

    #[test]
    fn test_parse_components() {
        let path = p("/a/b/c");
        assert_eq!(path.components().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(path.depth(), 3);
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(matches!(Path::parse("a/b"), Err(PathError::NotAbsolute(_))));
        assert!(matches!(Path::parse(""), Err(PathError::NotAbsolute(_))));
    }

    #[test]
    fn test_parse_rejects_empty_components() {
        assert!(matches!(
            Path::parse("/a//b"),
            Err(PathError::InvalidComponent(_))
        ));
        assert!(matches!(
            Path::parse("/a/"),
            Err(PathError::InvalidComponent(_))
        ));
        assert!(matches!(
            Path::parse("//"),
            Err(PathError::InvalidComponent(_))
        ));
    }

    #[test]
    fn test_parent() {
        assert_eq!(p("/a/b").parent(), Some(p("/a")));
        assert_eq!(p("/a").parent(), Some(Path::root()));
        assert_eq!(Path::root().parent(), None);
    }

    #[test]
    fn test_last() {
        assert_eq!(p("/a/b").last(), Some("b"));
        assert_eq!(Path::root().last(), None);
    }

    #[test]
    fn test_child() {
        assert_eq!(Path::root().child("a").unwrap(), p("/a"));
        assert_eq!(p("/a").child("b").unwrap(), p("/a/b"));
        assert!(p("/a").child("").is_err());
        assert!(p("/a").child("b/c").is_err());
    }

    #[test]
    fn test_starts_with() {
        assert!(p("/a/b/c").starts_with(&p("/a/b")));
        assert!(p("/a/b").starts_with(&p("/a/b")));
        assert!(p("/a/b").starts_with(&Path::root()));
        assert!(!p("/a").starts_with(&p("/a/b")));
        assert!(!p("/ab").starts_with(&p("/a")));
    }

    #[test]
    fn test_direct_child() {
        assert_eq!(p("/a/b/c").direct_child(&p("/a")), Some("b"));
        assert_eq!(p("/a/b").direct_child(&p("/a")), Some("b"));
        assert_eq!(p("/a").direct_child(&Path::root()), Some("a"));
        assert_eq!(p("/a").direct_child(&p("/a")), None);
        assert_eq!(p("/a").direct_child(&p("/b")), None);
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["/", "/a", "/a/b/c", "/with space/x"] {
            assert_eq!(p(s).to_string(), s);
        }
    }

    #[test]
    fn test_ordering_is_lexicographic_by_component() {
        let mut paths = vec![p("/b"), p("/a/c"), p("/a"), p("/"), p("/a/b")];
        paths.sort();
        assert_eq!(
            paths,
            vec![p("/"), p("/a"), p("/a/b"), p("/a/c"), p("/b")]
        );
    }

    #[test]
    fn test_to_local() {
        let local = p("/a/b").to_local(std::path::Path::new("/tmp/root"));
        assert_eq!(local, PathBuf::from("/tmp/root/a/b"));
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let path = p("/a/b");
        let encoded = bincode::serialize(&path).unwrap();
        let as_string: String = bincode::deserialize(&encoded).unwrap();
        assert_eq!(as_string, "/a/b");
        let decoded: Path = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded, path);
    }

    #[test]
    fn test_components_restartable() {
        let path = p("/a/b");
        assert_eq!(path.components().count(), 2);
        assert_eq!(path.components().count(), 2);
    }

    proptest! {
        #[test]
        fn prop_display_parse_roundtrip(parts in prop::collection::vec("[a-zA-Z0-9._-]{1,8}", 0..6)) {
            let mut path = Path::root();
            for part in &parts {
                path = path.child(part).unwrap();
            }
            let reparsed = Path::parse(&path.to_string()).unwrap();
            prop_assert_eq!(reparsed, path);
        }

        #[test]
        fn prop_child_starts_with_parent(parts in prop::collection::vec("[a-z]{1,4}", 1..5)) {
            let mut path = Path::root();
            for part in &parts {
                let next = path.child(part).unwrap();
                prop_assert!(next.starts_with(&path));
                prop_assert!(!path.starts_with(&next));
                prop_assert_eq!(next.parent().unwrap(), path);
                path = next;
            }
            prop_assert!(path.starts_with(&Path::root()));
        }
    }
}
