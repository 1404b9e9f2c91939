#![forbid(unsafe_code)]

//! Change propagation from an Arbor [`Tree`](arbor_tree::Tree) to UI
//! components.
//!
//! - [`DirtyTracker`]: collects dirty branches and notifies interested
//!   watchers at most once per pass.
//! - [`ComponentBinding`]: per-component lifecycle with shallow-compared
//!   derived state, scoped watches and action forwarding.
//! - [`Actions`]: named action handlers behind the [`Dispatch`] seam.
//! - [`App`]: wires a tree, a tracker and a dispatcher together.
//!
//! # Architecture
//!
//! Everything is single-threaded: shared state lives in `Rc<RefCell<..>>`,
//! registries hold `Weak` callbacks, and no borrow is held while user code
//! runs. A staged tree write marks branches dirty; a commit runs one tracker
//! pass; each notified binding recomputes its state and asks its
//! [`Host`] for an update decision.
//!
//! # Feature Flags
//!
//! - `policy-config`: load [`RuntimeConfig`] from TOML or JSON files.
//! - `hamt`: [`Equals`] for `im::Vector` and `im::OrdMap`, so persistent
//!   collections compare by identity first.

pub mod actions;
pub mod app;
pub mod binding;
pub mod component;
pub mod config;
pub mod dirty;
pub mod error;
pub mod shallow;

pub use actions::{ActionResult, Actions, Dispatch};
pub use app::App;
pub use binding::{ComponentBinding, WatchScope};
pub use component::{
    BindingStats, Component, ComponentId, Decision, FromTree, Host, Lifecycle,
};
pub use config::RuntimeConfig;
pub use dirty::{DEFAULT_MAX_PASS_DEPTH, DirtyTracker, Interest, PassReport, WatchHandle, WatchId};
pub use error::{ActionError, BindingError, ConfigError, TrackerError};
pub use shallow::{CompareMode, DerivedState, Equals, Field, shallow_equal};
