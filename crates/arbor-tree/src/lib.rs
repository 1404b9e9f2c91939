#![forbid(unsafe_code)]

//! Hierarchical state tree for Arbor.
//!
//! - [`Tree`]: shared, path-addressed `serde_json::Value` state with a
//!   committed view and an in-flight batch.
//! - [`Cursor`]: a non-owning path handle that stages writes and commits.
//! - [`ChangeEvent`] / [`CommitEvent`]: synchronous notifications, one per
//!   staged write and one per non-empty commit.
//! - [`Subscription`]: RAII guard for tree listeners.
//!
//! # Architecture
//!
//! The tree uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Listeners are stored as `Weak` callbacks and pruned lazily. No internal
//! borrow is held while listeners run, so a listener may read, stage and
//! commit.
//!
//! Top-level keys of the root are *branches*, the unit of change tracking
//! used by `arbor-runtime`.

pub mod cursor;
pub mod event;
mod node;
pub mod path;
pub mod subscription;
pub mod tree;

pub use cursor::Cursor;
pub use event::{ChangeEvent, ChangeKind, CommitEvent};
pub use node::MAX_INDEX_GAP;
pub use path::{Key, Path};
pub use serde_json::{Value, json};
pub use subscription::Subscription;
pub use tree::Tree;
