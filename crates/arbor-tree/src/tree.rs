#![forbid(unsafe_code)]

//! The shared state tree and its staged-write/commit protocol.
//!
//! # Design
//!
//! [`Tree`] wraps a committed `serde_json::Value` root in shared,
//! reference-counted storage (`Rc<RefCell<..>>`). Writes go through a
//! [`Cursor`]: the first write of a batch clones the committed root into a
//! working copy, every further write of the batch lands in that copy, and
//! [`Cursor::commit`] swaps the copy in as the new committed root.
//!
//! # Invariants
//!
//! 1. Readers only ever see the committed root; a batch is visible in full
//!    or not at all.
//! 2. Each `set`/`unset` emits exactly one [`ChangeEvent`], synchronously.
//! 3. Each commit with at least one staged write bumps the revision by 1 and
//!    emits exactly one [`CommitEvent`]; an empty commit does neither.
//! 4. Listeners run in registration order, outside any internal borrow, so
//!    they may stage and commit further writes.
//!
//! # Failure Modes
//!
//! - **Runaway listener**: a commit listener that commits unconditionally
//!   recurses until the stack overflows. Bound re-entrancy at the consumer.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::cursor::Cursor;
use crate::event::{ChangeEvent, ChangeKind, CommitEvent};
use crate::node;
use crate::path::Path;
use crate::subscription::{Listeners, Subscription};

pub(crate) struct TreeInner {
    committed: Value,
    /// Working copy of the in-flight batch; `None` when nothing is staged.
    staged: Option<Value>,
    writes: usize,
    touched: Vec<String>,
    revision: u64,
    on_change: Listeners<ChangeEvent>,
    on_commit: Listeners<CommitEvent>,
}

/// Shared hierarchical state addressed by [`Path`].
///
/// Cloning a `Tree` creates a new handle to the **same** state.
///
/// ```
/// use arbor_tree::{Tree, json};
///
/// let tree = Tree::new();
/// tree.root().set(json!({"fruit": "orange", "animal": "sheep"})).commit();
/// assert_eq!(tree.get("fruit"), Some(json!("orange")));
///
/// tree.root().set_at("fruit", "apple");
/// assert_eq!(tree.get("fruit"), Some(json!("orange")));
/// tree.root().commit();
/// assert_eq!(tree.get("fruit"), Some(json!("apple")));
/// ```
#[derive(Clone)]
pub struct Tree {
    inner: Rc<RefCell<TreeInner>>,
}

impl Tree {
    /// An empty tree (root is an empty mapping) at revision 0.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(Value::Object(Map::new()))
    }

    /// A tree whose committed root is `root`. No events are emitted.
    #[must_use]
    pub fn with_root(root: Value) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TreeInner {
                committed: root,
                staged: None,
                writes: 0,
                touched: Vec::new(),
                revision: 0,
                on_change: Listeners::new(),
                on_commit: Listeners::new(),
            })),
        }
    }

    pub(crate) fn from_inner(inner: Rc<RefCell<TreeInner>>) -> Self {
        Self { inner }
    }

    /// A cursor at the root.
    #[must_use]
    pub fn root(&self) -> Cursor {
        self.cursor(Path::root())
    }

    /// A cursor addressed at `path`. The path does not have to exist.
    #[must_use]
    pub fn cursor(&self, path: impl Into<Path>) -> Cursor {
        Cursor::new(Rc::downgrade(&self.inner), path.into())
    }

    /// Committed value at `path`, or `None` if nothing is there.
    #[must_use]
    pub fn get(&self, path: impl Into<Path>) -> Option<Value> {
        let path = path.into();
        node::read_at(&self.inner.borrow().committed, path.keys()).cloned()
    }

    /// Access the committed root by reference without cloning.
    ///
    /// Reads through any handle are fine inside `f`.
    ///
    /// # Panics
    ///
    /// The root stays borrowed while `f` runs, so staging or committing on
    /// this tree from inside `f` panics. Use [`snapshot`](Self::snapshot)
    /// when the closure needs to write.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.inner.borrow().committed)
    }

    /// A clone of the committed root.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.inner.borrow().committed.clone()
    }

    /// Number of non-empty commits so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.borrow().revision
    }

    /// Whether a batch is in flight.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.borrow().staged.is_some()
    }

    /// Writes staged since the last commit.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.inner.borrow().writes
    }

    /// Register a listener for staged writes.
    pub fn on_change(&self, listener: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.inner.borrow_mut().on_change.add(listener)
    }

    /// Register a listener for commits.
    pub fn on_commit(&self, listener: impl Fn(&CommitEvent) + 'static) -> Subscription {
        self.inner.borrow_mut().on_commit.add(listener)
    }

    /// Registered (change, commit) listener entries, including dead ones not
    /// yet pruned.
    #[must_use]
    pub fn listener_count(&self) -> (usize, usize) {
        let inner = self.inner.borrow();
        (inner.on_change.len(), inner.on_commit.len())
    }

    /// Whether two handles share the same state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Tree) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stage a write (`Some`) or removal (`None`) at `path` and emit its
    /// change event.
    ///
    /// A write whose sequence index is out of reach (see
    /// [`MAX_INDEX_GAP`](crate::MAX_INDEX_GAP)) is dropped with a warning
    /// and emits nothing.
    pub(crate) fn stage(&self, path: &Path, value: Option<Value>) {
        let kind = if value.is_some() {
            ChangeKind::Set
        } else {
            ChangeKind::Unset
        };
        let (event, listeners) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            if value.is_some() {
                let base = inner.staged.as_ref().unwrap_or(&inner.committed);
                if !node::can_write(base, path.keys()) {
                    tracing::warn!(path = %path, "write to out-of-reach index ignored");
                    return;
                }
            }
            let working = inner
                .staged
                .get_or_insert_with(|| inner.committed.clone());
            let branches = match path.branch() {
                Some(branch) => vec![branch],
                None => node::root_branches(working, value.as_ref()),
            };
            match value {
                Some(value) => {
                    node::write_at(working, path.keys(), value);
                }
                None => {
                    node::remove_at(working, path.keys());
                }
            }
            inner.writes += 1;
            for branch in &branches {
                if !inner.touched.contains(branch) {
                    inner.touched.push(branch.clone());
                }
            }
            let event = ChangeEvent {
                path: path.clone(),
                branches,
                kind,
            };
            (event, inner.on_change.live())
        };
        tracing::trace!(path = %event.path, branches = ?event.branches, kind = ?event.kind, "staged tree write");
        for listener in &listeners {
            listener(&event);
        }
    }

    /// Apply the in-flight batch. Returns the new revision, or `None` when
    /// nothing was staged.
    pub(crate) fn commit(&self) -> Option<u64> {
        let (event, listeners) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let staged = inner.staged.take()?;
            inner.committed = staged;
            inner.revision += 1;
            let event = CommitEvent {
                revision: inner.revision,
                writes: mem::take(&mut inner.writes),
                branches: mem::take(&mut inner.touched),
            };
            (event, inner.on_commit.live())
        };
        tracing::debug!(
            revision = event.revision,
            writes = event.writes,
            branches = event.branches.len(),
            "tree commit"
        );
        for listener in &listeners {
            listener(&event);
        }
        Some(event.revision)
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Tree")
            .field("revision", &inner.revision)
            .field("pending_writes", &inner.writes)
            .field("root", &inner.committed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn new_tree_is_empty_mapping() {
        let tree = Tree::new();
        assert_eq!(tree.snapshot(), json!({}));
        assert_eq!(tree.revision(), 0);
        assert!(!tree.has_pending());
        assert_eq!(tree.get("anything"), None);
    }

    #[test]
    fn staged_writes_invisible_until_commit() {
        let tree = Tree::new();
        tree.root().set_at("fruit", "orange").set_at("animal", "sheep");
        assert!(tree.has_pending());
        assert_eq!(tree.pending_writes(), 2);
        assert_eq!(tree.snapshot(), json!({}));

        assert_eq!(tree.root().commit(), Some(1));
        assert_eq!(tree.snapshot(), json!({"fruit": "orange", "animal": "sheep"}));
        assert_eq!(tree.pending_writes(), 0);
    }

    #[test]
    fn empty_commit_is_noop() {
        let tree = Tree::new();
        let commits = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&commits);
        let _sub = tree.on_commit(move |_| c.set(c.get() + 1));

        assert_eq!(tree.root().commit(), None);
        assert_eq!(tree.revision(), 0);
        assert_eq!(commits.get(), 0);
    }

    #[test]
    fn last_write_to_same_path_wins() {
        let tree = Tree::new();
        tree.root()
            .set_at("fruit", "orange")
            .set_at("fruit", "apple")
            .commit();
        assert_eq!(tree.get("fruit"), Some(json!("apple")));
    }

    #[test]
    fn change_events_fire_per_set_in_order() {
        let tree = Tree::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = tree.on_change(move |e| s.borrow_mut().push(e.branches.clone()));

        tree.root().set_at(["fruit", "color"], "red").set_at("animal", "sheep");
        assert_eq!(
            *seen.borrow(),
            vec![vec!["fruit".to_string()], vec!["animal".to_string()]]
        );
    }

    #[test]
    fn root_write_touches_old_and_new_branches() {
        let tree = Tree::with_root(json!({"fruit": "orange", "animal": "sheep"}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = tree.on_commit(move |e| s.borrow_mut().push(e.clone()));

        tree.root().set(json!({"animal": "sloth", "color": "green"})).commit();
        let events = seen.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].branches, vec!["fruit", "animal", "color"]);
        assert_eq!(events[0].writes, 1);
    }

    #[test]
    fn commit_event_lists_distinct_branches() {
        let tree = Tree::new();
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        let _sub = tree.on_commit(move |e| *s.borrow_mut() = Some(e.clone()));

        tree.root()
            .set_at(["fruit", "a"], 1)
            .set_at(["fruit", "b"], 2)
            .set_at("animal", "sheep")
            .commit();
        let event = seen.borrow().clone().expect("commit event");
        assert_eq!(event.revision, 1);
        assert_eq!(event.writes, 3);
        assert_eq!(event.branches, vec!["fruit", "animal"]);
    }

    #[test]
    fn commit_listener_sees_committed_state() {
        let tree = Tree::new();
        let reader = tree.clone();
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        let _sub = tree.on_commit(move |_| *s.borrow_mut() = reader.get("fruit"));

        tree.root().set_at("fruit", "apple").commit();
        assert_eq!(*seen.borrow(), Some(json!("apple")));
    }

    #[test]
    fn listener_may_commit_reentrantly() {
        let tree = Tree::new();
        let writer = tree.clone();
        let _sub = tree.on_commit(move |e| {
            if e.branches.iter().any(|b| b == "fruit") {
                writer.root().set_at("derived", e.revision).commit();
            }
        });

        tree.root().set_at("fruit", "apple").commit();
        assert_eq!(tree.revision(), 2);
        assert_eq!(tree.get("derived"), Some(json!(1)));
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let tree = Tree::new();
        let hits = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hits);
        let sub = tree.on_change(move |_| h.set(h.get() + 1));

        tree.root().set_at("a", 1);
        drop(sub);
        tree.root().set_at("b", 2).commit();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn independent_trees_do_not_cross_talk() {
        let a = Tree::new();
        let b = Tree::new();
        let hits = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hits);
        let _sub = b.on_commit(move |_| h.set(h.get() + 1));

        a.root().set_at("x", 1).commit();
        assert_eq!(hits.get(), 0);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn out_of_reach_index_write_is_ignored() {
        let tree = Tree::with_root(json!({"list": []}));
        let events = Rc::new(Cell::new(0u32));
        let e = Rc::clone(&events);
        let _sub = tree.on_change(move |_| e.set(e.get() + 1));

        let list = Path::from("list");
        tree.root()
            .set_at(list.child(usize::MAX), 1)
            .set_at(list.child(1usize << 40), 2);

        assert_eq!(events.get(), 0);
        assert!(!tree.has_pending());
        assert_eq!(tree.root().commit(), None);
        assert_eq!(tree.snapshot(), json!({"list": []}));
    }

    #[test]
    fn out_of_reach_write_keeps_rest_of_batch() {
        let tree = Tree::with_root(json!({"list": []}));
        tree.root()
            .set_at("fruit", "apple")
            .set_at(Path::from("list").child(usize::MAX), 1);

        assert_eq!(tree.pending_writes(), 1);
        assert_eq!(tree.root().commit(), Some(1));
        assert_eq!(tree.snapshot(), json!({"list": [], "fruit": "apple"}));
    }

    #[test]
    fn with_allows_nested_reads() {
        let tree = Tree::with_root(json!({"fruit": "orange"}));
        let handle = tree.clone();
        let fruit = tree.with(|_| handle.get("fruit"));
        assert_eq!(fruit, Some(json!("orange")));
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn with_rejects_writes() {
        let tree = Tree::new();
        let handle = tree.clone();
        tree.with(|_| {
            handle.root().set_at("fruit", "apple");
        });
    }
}
