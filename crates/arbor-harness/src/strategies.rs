#![forbid(unsafe_code)]

//! Proptest strategies for tree write batches.
//!
//! Branch names are drawn from a small fixed pool so that batches collide
//! often and watchers overlap.

use arbor_tree::{Path, Tree, Value, json};
use proptest::prelude::*;

/// Branch names used by every strategy here.
pub const BRANCHES: [&str; 5] = ["fruit", "animal", "color", "count", "todos"];

/// One staged write.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// `set_at(path, value)`.
    Set(Vec<String>, Value),
    /// `unset_at(path)`.
    Unset(Vec<String>),
}

impl Op {
    /// Top-level branch this op touches.
    #[must_use]
    pub fn branch(&self) -> &str {
        match self {
            Self::Set(path, _) | Self::Unset(path) => path.first().map_or("", String::as_str),
        }
    }

    /// Stage this op through the root cursor of `tree`.
    pub fn stage(&self, tree: &Tree) {
        let root = tree.root();
        match self {
            Self::Set(path, value) => {
                root.set_at(to_path(path), value.clone());
            }
            Self::Unset(path) => {
                root.unset_at(to_path(path));
            }
        }
    }
}

fn to_path(keys: &[String]) -> Path {
    keys.iter().map(String::as_str).collect()
}

/// A branch name from [`BRANCHES`].
pub fn branch() -> impl Strategy<Value = String> {
    prop::sample::select(BRANCHES.to_vec()).prop_map(str::to_owned)
}

/// A non-empty set of branch names, as a watcher would declare.
pub fn interest() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(BRANCHES.to_vec(), 1..=BRANCHES.len())
        .prop_map(|names| names.into_iter().map(str::to_owned).collect())
}

/// A small JSON leaf.
pub fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-100i64..100).prop_map(Value::from),
        "[a-z]{1,6}".prop_map(Value::from),
        Just(json!({"nested": true})),
    ]
}

/// A path one or two levels deep.
pub fn path() -> impl Strategy<Value = Vec<String>> {
    (branch(), prop::option::of(prop_oneof![Just("a"), Just("b")])).prop_map(
        |(branch, field)| {
            let mut keys = vec![branch];
            keys.extend(field.map(str::to_owned));
            keys
        },
    )
}

/// A single write, mostly sets.
pub fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (path(), leaf()).prop_map(|(p, v)| Op::Set(p, v)),
        1 => path().prop_map(Op::Unset),
    ]
}

/// A batch of one to seven writes.
pub fn batch() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 1..8)
}

/// A sequence of batches, each committed on its own.
pub fn commits() -> impl Strategy<Value = Vec<Vec<Op>>> {
    prop::collection::vec(batch(), 1..6)
}

/// Stage `batch` on `tree` and commit it.
pub fn apply(tree: &Tree, batch: &[Op]) -> Option<u64> {
    for op in batch {
        op.stage(tree);
    }
    tree.root().commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn ops_touch_known_branches(op in op()) {
            prop_assert!(BRANCHES.contains(&op.branch()));
        }

        #[test]
        fn interest_is_never_empty(names in interest()) {
            prop_assert!(!names.is_empty());
        }

        #[test]
        fn apply_bumps_revision_once(batch in batch()) {
            let tree = Tree::new();
            prop_assert_eq!(apply(&tree, &batch), Some(1));
            prop_assert!(!tree.has_pending());
        }
    }
}
