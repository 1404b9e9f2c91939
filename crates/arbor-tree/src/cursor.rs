#![forbid(unsafe_code)]

//! Path-addressed handles for reading and staging writes.
//!
//! A [`Cursor`] is a relation, not a copy: it holds a path and a `Weak`
//! reference to the tree's state. It never keeps the tree alive, and a
//! cursor that outlives its tree reads as absent and ignores writes.
//!
//! Writes are staged into the tree's in-flight batch, which is shared by
//! every cursor of the same tree. [`Cursor::commit`] applies the whole batch,
//! not just the writes made through this cursor.

use std::cell::RefCell;
use std::rc::Weak;

use serde_json::Value;

use crate::path::Path;
use crate::tree::{Tree, TreeInner};

/// A path into a [`Tree`] that can stage writes.
///
/// ```
/// use arbor_tree::{Tree, json};
///
/// let tree = Tree::new();
/// let todos = tree.cursor("todos");
/// todos.set(json!([])).set_at(0usize, json!({"title": "water plants"}));
/// todos.select(0usize).set_at("done", false);
/// assert_eq!(todos.commit(), Some(1));
/// assert_eq!(
///     tree.get(["todos"]),
///     Some(json!([{"title": "water plants", "done": false}]))
/// );
/// ```
#[derive(Clone)]
pub struct Cursor {
    tree: Weak<RefCell<TreeInner>>,
    path: Path,
}

impl Cursor {
    pub(crate) fn new(tree: Weak<RefCell<TreeInner>>, path: Path) -> Self {
        Self { tree, path }
    }

    /// The path this cursor addresses.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A handle to the tree, if it is still alive.
    #[must_use]
    pub fn tree(&self) -> Option<Tree> {
        self.tree.upgrade().map(Tree::from_inner)
    }

    /// Whether the tree this cursor points into has been dropped.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.tree.strong_count() == 0
    }

    /// A cursor at `sub` below this one.
    #[must_use]
    pub fn select(&self, sub: impl Into<Path>) -> Cursor {
        Cursor {
            tree: Weak::clone(&self.tree),
            path: self.path.join(&sub.into()),
        }
    }

    /// Committed value at this cursor.
    #[must_use]
    pub fn get(&self) -> Option<Value> {
        self.tree()?.get(&self.path)
    }

    /// Whether a committed value exists at this cursor.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.get().is_some()
    }

    /// Stage `value` at this cursor's path.
    pub fn set(&self, value: impl Into<Value>) -> &Self {
        self.stage(&self.path, Some(value.into()));
        self
    }

    /// Stage `value` at `sub` below this cursor's path.
    pub fn set_at(&self, sub: impl Into<Path>, value: impl Into<Value>) -> &Self {
        let path = self.path.join(&sub.into());
        self.stage(&path, Some(value.into()));
        self
    }

    /// Stage removal of the value at this cursor's path.
    pub fn unset(&self) -> &Self {
        self.stage(&self.path, None);
        self
    }

    /// Stage removal of the value at `sub` below this cursor's path.
    pub fn unset_at(&self, sub: impl Into<Path>) -> &Self {
        let path = self.path.join(&sub.into());
        self.stage(&path, None);
        self
    }

    /// Apply every write staged on the tree since the last commit.
    ///
    /// Returns the new revision, or `None` if nothing was staged (or the
    /// tree is gone).
    pub fn commit(&self) -> Option<u64> {
        self.tree()?.commit()
    }

    fn stage(&self, path: &Path, value: Option<Value>) {
        match self.tree() {
            Some(tree) => tree.stage(path, value),
            None => tracing::warn!(path = %path, "write through detached cursor ignored"),
        }
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("path", &self.path)
            .field("detached", &self.is_detached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cursor_reads_committed_view() {
        let tree = Tree::with_root(json!({"fruit": {"name": "orange"}}));
        let name = tree.cursor(["fruit", "name"]);
        assert_eq!(name.get(), Some(json!("orange")));

        name.set("apple");
        assert_eq!(name.get(), Some(json!("orange")));
        name.commit();
        assert_eq!(name.get(), Some(json!("apple")));
    }

    #[test]
    fn select_extends_path() {
        let tree = Tree::new();
        let fruit = tree.cursor("fruit");
        let color = fruit.select("color");
        assert_eq!(color.path(), &Path::from(["fruit", "color"]));
        color.set("red").commit();
        assert_eq!(tree.get("fruit"), Some(json!({"color": "red"})));
    }

    #[test]
    fn unset_removes_value() {
        let tree = Tree::with_root(json!({"fruit": "orange", "animal": "sheep"}));
        tree.root().unset_at("fruit").commit();
        assert_eq!(tree.snapshot(), json!({"animal": "sheep"}));
        assert!(!tree.cursor("fruit").exists());
    }

    #[test]
    fn unset_root_clears_tree() {
        let tree = Tree::with_root(json!({"fruit": "orange"}));
        tree.root().unset().commit();
        assert_eq!(tree.snapshot(), json!({}));
    }

    #[test]
    fn cursor_does_not_keep_tree_alive() {
        let tree = Tree::new();
        let cursor = tree.cursor("fruit");
        assert!(!cursor.is_detached());
        drop(tree);

        assert!(cursor.is_detached());
        assert_eq!(cursor.get(), None);
        assert_eq!(cursor.set("apple").commit(), None);
    }

    #[test]
    fn commit_from_any_cursor_applies_whole_batch() {
        let tree = Tree::new();
        tree.cursor("fruit").set("apple");
        tree.cursor("animal").set("sloth");
        assert_eq!(tree.cursor(["unrelated", "path"]).commit(), Some(1));
        assert_eq!(tree.snapshot(), json!({"fruit": "apple", "animal": "sloth"}));
    }
}
