#![forbid(unsafe_code)]

//! Tree addressing: keys, paths, and branch names.
//!
//! A [`Path`] is an ordered sequence of [`Key`]s walked from the root of a
//! [`Tree`](crate::Tree). The first key of a non-root path names the
//! *branch* the path belongs to; branches are the unit of dependency
//! tracking, so everything below the first segment is invisible to watchers.
//!
//! # Invariants
//!
//! 1. The root path has no keys and no branch.
//! 2. `branch()` of a non-root path is the display form of its first key
//!    (`Key::Index(3)` becomes `"3"`).
//! 3. Paths compare and hash by their key sequence only.

use std::fmt;

use smallvec::SmallVec;

/// One segment of a [`Path`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Mapping key.
    Name(String),
    /// Sequence index.
    Index(usize),
}

impl Key {
    /// The mapping key, if this is a [`Key::Name`].
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Index(_) => None,
        }
    }

    /// The sequence index, if this is a [`Key::Index`].
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Name(_) => None,
            Self::Index(index) => Some(*index),
        }
    }

    /// Name used when this key is the first segment of a path.
    #[must_use]
    pub fn branch_name(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Index(index) => index.to_string(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An address in the tree, walked from the root.
///
/// ```
/// use arbor_tree::Path;
///
/// let path = Path::from(["todos"]).child(2usize).child("title");
/// assert_eq!(path.to_string(), "todos[2].title");
/// assert_eq!(path.branch().as_deref(), Some("todos"));
/// assert!(Path::root().branch().is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    keys: SmallVec<[Key; 4]>,
}

impl Path {
    /// The empty path addressing the whole tree.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from any sequence of key-like values.
    pub fn new<K: Into<Key>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the path has no segments (same as [`is_root`](Self::is_root)).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The segments of this path.
    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// The first segment, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Key> {
        self.keys.first()
    }

    /// Name of the top-level branch this path lives in.
    #[must_use]
    pub fn branch(&self) -> Option<String> {
        self.keys.first().map(Key::branch_name)
    }

    /// A new path with `key` appended.
    #[must_use]
    pub fn child(&self, key: impl Into<Key>) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key.into());
        Self { keys }
    }

    /// A new path with every segment of `other` appended.
    #[must_use]
    pub fn join(&self, other: &Path) -> Self {
        let mut keys = self.keys.clone();
        keys.extend(other.keys.iter().cloned());
        Self { keys }
    }

    /// The path without its last segment. `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.keys.split_last()?;
        Some(Self {
            keys: init.iter().cloned().collect(),
        })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keys.is_empty() {
            return f.write_str("/");
        }
        for (i, key) in self.keys.iter().enumerate() {
            match key {
                Key::Name(name) if i > 0 => write!(f, ".{name}")?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl<K: Into<Key>> FromIterator<K> for Path {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Key> for Path {
    fn from(key: Key) -> Self {
        Self::new([key])
    }
}

impl From<&str> for Path {
    fn from(name: &str) -> Self {
        Self::new([name])
    }
}

impl From<String> for Path {
    fn from(name: String) -> Self {
        Self::new([name])
    }
}

impl From<usize> for Path {
    fn from(index: usize) -> Self {
        Self::new([index])
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl<K: Into<Key>, const N: usize> From<[K; N]> for Path {
    fn from(keys: [K; N]) -> Self {
        Self::new(keys)
    }
}

impl<K: Into<Key>> From<Vec<K>> for Path {
    fn from(keys: Vec<K>) -> Self {
        Self::new(keys)
    }
}

impl From<&[&str]> for Path {
    fn from(keys: &[&str]) -> Self {
        Self::new(keys.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_no_branch() {
        let root = Path::root();
        assert!(root.is_root());
        assert_eq!(root.len(), 0);
        assert_eq!(root.branch(), None);
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn branch_is_first_segment() {
        let path = Path::from(["fruit", "color"]);
        assert_eq!(path.branch().as_deref(), Some("fruit"));
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn index_branch_uses_decimal_name() {
        let path = Path::new([Key::Index(3), Key::from("x")]);
        assert_eq!(path.branch().as_deref(), Some("3"));
        assert_eq!(path.to_string(), "[3].x");
    }

    #[test]
    fn join_and_child() {
        let base = Path::from("todos");
        let joined = base.join(&Path::new([Key::Index(1), Key::from("done")]));
        assert_eq!(joined.to_string(), "todos[1].done");
        assert_eq!(base.child("count").to_string(), "todos.count");
        assert_eq!(joined.parent().map(|p| p.to_string()).as_deref(), Some("todos[1]"));
        assert_eq!(Path::root().parent(), None);
    }

    #[test]
    fn conversions_agree() {
        let a = Path::from(vec!["a", "b"]);
        let b: Path = ["a", "b"].into();
        let c: Path = ["a", "b"].iter().copied().collect();
        let keys: &[&str] = &["a", "b"];
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, Path::from(keys));
    }

    #[test]
    fn key_accessors() {
        assert_eq!(Key::from("a").as_name(), Some("a"));
        assert_eq!(Key::from("a").as_index(), None);
        assert_eq!(Key::from(7usize).as_index(), Some(7));
        assert_eq!(Key::from(7usize).as_name(), None);
    }
}
