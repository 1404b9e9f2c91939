#![forbid(unsafe_code)]

//! Arbor public facade.
//!
//! Re-exports the state tree (`arbor-tree`) and, with the default `runtime`
//! feature, the change-propagation runtime (`arbor-runtime`).
//!
//! ```
//! use std::rc::Rc;
//! use arbor::prelude::*;
//!
//! struct Quiet;
//! impl Host for Quiet {
//!     fn request_update(&self, _: ComponentId) {}
//! }
//!
//! let app = App::new();
//! app.tree().root().set(json!({"fruit": "orange"})).commit();
//! let fruit = app.bind(FromTree::new(["fruit"], |tree: &Tree| {
//!     DerivedState::new().with("theFruit", tree.get("fruit"))
//! }));
//! fruit.mount(Rc::new(Quiet)).unwrap();
//!
//! app.tree().root().set_at("fruit", "orange").commit();
//! assert_eq!(fruit.should_update().unwrap(), Decision::Skip);
//! ```

pub use arbor_tree as tree;
pub use arbor_tree::{
    ChangeEvent, ChangeKind, CommitEvent, Cursor, Key, Path, Subscription, Tree, Value, json,
};

#[cfg(feature = "runtime")]
pub use arbor_runtime as runtime;
#[cfg(feature = "runtime")]
pub use arbor_runtime::{
    ActionError, Actions, App, BindingError, CompareMode, Component, ComponentBinding,
    ComponentId, ConfigError, Decision, DerivedState, DirtyTracker, Dispatch, Field, FromTree,
    Host, Interest, Lifecycle, RuntimeConfig, TrackerError,
};

/// Everything needed to build and bind components.
pub mod prelude {
    pub use arbor_tree::{Cursor, Path, Tree, Value, json};

    #[cfg(feature = "runtime")]
    pub use arbor_runtime::{
        App, Component, ComponentBinding, ComponentId, Decision, DerivedState, Dispatch, Field,
        FromTree, Host, Interest, Lifecycle,
    };
}
