#![forbid(unsafe_code)]

//! Path-addressed reads and writes over `serde_json::Value` nodes.
//!
//! Writes create missing containers on the way down: a [`Key::Name`]
//! segment turns a non-mapping node into an empty mapping, a
//! [`Key::Index`] segment addresses a sequence (padding with `null` up to the
//! index) unless the node is already a mapping, in which case the index is
//! used as a decimal key.
//!
//! Padding is bounded: an index more than [`MAX_INDEX_GAP`] past the end of
//! its sequence is out of reach, and [`can_write`] rejects the whole write.

use serde_json::{Map, Value};

use crate::path::Key;

/// How far past the end of a sequence an index write may pad.
pub const MAX_INDEX_GAP: usize = 1 << 16;

/// Read the node at `keys`, or `None` when any segment is missing.
pub(crate) fn read_at<'a>(node: &'a Value, keys: &[Key]) -> Option<&'a Value> {
    keys.iter().try_fold(node, |node, key| match (node, key) {
        (Value::Object(map), Key::Name(name)) => map.get(name),
        (Value::Object(map), Key::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), Key::Index(index)) => items.get(*index),
        _ => None,
    })
}

/// Whether a write at `keys` can be materialised without padding a sequence
/// beyond [`MAX_INDEX_GAP`].
pub(crate) fn can_write(node: &Value, keys: &[Key]) -> bool {
    let mut current = Some(node);
    for key in keys {
        current = match (current, key) {
            (Some(Value::Object(map)), Key::Name(name)) => map.get(name),
            (Some(Value::Object(map)), Key::Index(index)) => map.get(&index.to_string()),
            (_, Key::Name(_)) => None,
            (Some(Value::Array(items)), Key::Index(index)) => {
                if !within_reach(items.len(), *index) {
                    return false;
                }
                items.get(*index)
            }
            (_, Key::Index(index)) => {
                if !within_reach(0, *index) {
                    return false;
                }
                None
            }
        };
    }
    true
}

fn within_reach(len: usize, index: usize) -> bool {
    index < len || index - len < MAX_INDEX_GAP
}

/// Write `value` at `keys`, creating intermediate containers.
///
/// Returns `false`, leaving `node` untouched, when [`can_write`] rejects the
/// path.
pub(crate) fn write_at(node: &mut Value, keys: &[Key], value: Value) -> bool {
    if !can_write(node, keys) {
        return false;
    }
    let mut slot = node;
    for key in keys {
        slot = child_slot(slot, key);
    }
    *slot = value;
    true
}

/// Remove the node at `keys`. Removing the root leaves an empty mapping.
///
/// Sequence elements are spliced out, so later indexes shift down.
pub(crate) fn remove_at(node: &mut Value, keys: &[Key]) -> Option<Value> {
    let Some((last, init)) = keys.split_last() else {
        return Some(std::mem::replace(node, Value::Object(Map::new())));
    };
    let parent = init.iter().try_fold(node, |node, key| match (node, key) {
        (Value::Object(map), Key::Name(name)) => map.get_mut(name),
        (Value::Object(map), Key::Index(index)) => map.get_mut(&index.to_string()),
        (Value::Array(items), Key::Index(index)) => items.get_mut(*index),
        _ => None,
    })?;
    match (parent, last) {
        (Value::Object(map), Key::Name(name)) => map.shift_remove(name),
        (Value::Object(map), Key::Index(index)) => map.shift_remove(&index.to_string()),
        (Value::Array(items), Key::Index(index)) if *index < items.len() => {
            Some(items.remove(*index))
        }
        _ => None,
    }
}

/// Top-level keys of a node, in order. Scalars have none.
pub(crate) fn top_level_keys(node: &Value) -> Vec<String> {
    match node {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Branches touched by replacing the whole root: every key that exists
/// before or after the write.
pub(crate) fn root_branches(before: &Value, after: Option<&Value>) -> Vec<String> {
    let mut branches = top_level_keys(before);
    if let Some(after) = after {
        for key in top_level_keys(after) {
            if !branches.contains(&key) {
                branches.push(key);
            }
        }
    }
    branches
}

fn child_slot<'a>(node: &'a mut Value, key: &Key) -> &'a mut Value {
    match key {
        Key::Name(name) => object_mut(node)
            .entry(name.clone())
            .or_insert(Value::Null),
        Key::Index(index) if node.is_object() => object_mut(node)
            .entry(index.to_string())
            .or_insert(Value::Null),
        Key::Index(index) => {
            let items = array_mut(node);
            if items.len() <= *index {
                items.resize(index.saturating_add(1), Value::Null);
            }
            &mut items[*index]
        }
    }
}

fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by a mapping"),
    }
}

fn array_mut(node: &mut Value) -> &mut Vec<Value> {
    if !node.is_array() {
        *node = Value::Array(Vec::new());
    }
    match node {
        Value::Array(items) => items,
        _ => unreachable!("node was just replaced by a sequence"),
    }
}
