#![no_main]
#![forbid(unsafe_code)]

//! Arbitrary set/unset/commit sequences against a tree wired to a tracker.
//!
//! Checks that readers never see a partial batch, that every commit leaves
//! the dirty set empty, and that no path panics.

use std::cell::Cell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use arbor_runtime::App;
use arbor_tree::{Key, Path, Value};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Step {
    Set { path: Vec<KeyInput>, value: LeafInput },
    Unset { path: Vec<KeyInput> },
    Commit,
}

#[derive(Arbitrary, Debug)]
enum KeyInput {
    Name(u8),
    Index(u8),
}

#[derive(Arbitrary, Debug)]
enum LeafInput {
    Null,
    Bool(bool),
    Int(i32),
    Text(String),
}

impl KeyInput {
    fn key(&self) -> Key {
        match self {
            Self::Name(n) => Key::Name(format!("k{}", n % 6)),
            Self::Index(i) => Key::Index(usize::from(i % 8)),
        }
    }
}

impl LeafInput {
    fn value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::from(*b),
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

fn to_path(keys: &[KeyInput]) -> Path {
    keys.iter().take(4).map(KeyInput::key).collect()
}

fuzz_target!(|steps: Vec<Step>| {
    let app = App::new();
    let fired = Rc::new(Cell::new(0u32));
    let f = Rc::clone(&fired);
    let _w = app.watch_all(move |_| f.set(f.get() + 1));

    let tree = app.tree();
    let mut committed = tree.snapshot();
    for step in steps.iter().take(64) {
        match step {
            Step::Set { path, value } => {
                tree.root().set_at(to_path(path), value.value());
            }
            Step::Unset { path } => {
                tree.root().unset_at(to_path(path));
            }
            Step::Commit => {
                fired.set(0);
                let had_pending = tree.has_pending();
                let revision = tree.root().commit();
                assert_eq!(revision.is_some(), had_pending);
                committed = tree.snapshot();
                assert!(fired.get() <= 1);
                assert!(app.tracker().dirty_branches().is_empty());
            }
        }
        assert_eq!(tree.snapshot(), committed, "staged writes leaked");
    }
});
