#![forbid(unsafe_code)]

//! Named action dispatch.
//!
//! Components never mutate the tree in response to user input directly;
//! they call `action(name, payload)` on their binding, which forwards to a
//! [`Dispatch`] implementation. [`Actions`] is the default one: a registry of
//! named handlers that receive the tree and the payload.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown name | No handler registered | `ActionError::UnknownAction` |
//! | Handler error | Handler returned `Err` | Returned to the caller unchanged |
//! | Handler panic | Bug in handler | Unwinds through `dispatch` |

use std::cell::RefCell;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use arbor_tree::{Tree, Value};

use crate::error::ActionError;

/// Result of running an action.
pub type ActionResult = Result<(), Box<dyn Error>>;

type Handler = Rc<dyn Fn(&Tree, &Value) -> ActionResult>;

/// Something that can run a named action.
pub trait Dispatch {
    /// Run the action `name` with `payload`.
    ///
    /// # Errors
    ///
    /// Whatever the action reports; the binding layer passes it through.
    fn dispatch(&self, name: &str, payload: Value) -> ActionResult;
}

/// Registry of named action handlers bound to one tree.
///
/// ```
/// use arbor_runtime::actions::{Actions, Dispatch};
/// use arbor_tree::{Tree, json};
///
/// let tree = Tree::new();
/// let actions = Actions::new(tree.clone());
/// actions.register("pick", |tree, payload| {
///     tree.root().set_at("fruit", payload.clone()).commit();
///     Ok(())
/// });
///
/// actions.dispatch("pick", json!("kiwi")).unwrap();
/// assert_eq!(tree.get("fruit"), Some(json!("kiwi")));
/// assert!(actions.dispatch("juggle", json!(null)).is_err());
/// ```
pub struct Actions {
    tree: Tree,
    handlers: RefCell<AHashMap<String, Handler>>,
}

impl Actions {
    /// An empty registry whose handlers operate on `tree`.
    #[must_use]
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            handlers: RefCell::new(AHashMap::new()),
        }
    }

    /// Register `handler` under `name`, replacing any previous handler.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&Tree, &Value) -> ActionResult + 'static,
    ) {
        let name = name.into();
        tracing::trace!(action = %name, "action registered");
        self.handlers.borrow_mut().insert(name, Rc::new(handler));
    }

    /// Remove the handler under `name`. Returns whether one existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.handlers.borrow_mut().remove(name).is_some()
    }

    /// Whether a handler is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.borrow().contains_key(name)
    }

    /// Registered action names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// The tree handlers operate on.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }
}

impl Dispatch for Actions {
    fn dispatch(&self, name: &str, payload: Value) -> ActionResult {
        // Released before the call so handlers may (un)register actions.
        let handler = self.handlers.borrow().get(name).cloned();
        let Some(handler) = handler else {
            tracing::debug!(action = name, "unknown action");
            return Err(Box::new(ActionError::UnknownAction(name.to_owned())));
        };
        tracing::debug!(action = name, "dispatch action");
        handler(&self.tree, &payload)
    }
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actions")
            .field("actions", &self.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_tree::json;
    use std::cell::Cell;

    #[derive(Debug)]
    struct TooHigh(u64);

    impl fmt::Display for TooHigh {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "cannot jump {} high", self.0)
        }
    }

    impl Error for TooHigh {}

    #[test]
    fn dispatch_runs_handler_with_payload() {
        let actions = Actions::new(Tree::new());
        let seen = Rc::new(Cell::new(0u64));
        let s = Rc::clone(&seen);
        actions.register("jump", move |_, payload| {
            s.set(payload["height"].as_u64().unwrap_or_default());
            Ok(())
        });

        actions.dispatch("jump", json!({"height": 7})).unwrap();
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn unknown_action_is_reported() {
        let actions = Actions::new(Tree::new());
        let err = actions.dispatch("jump", json!(null)).unwrap_err();
        let err = err.downcast_ref::<ActionError>().expect("ActionError");
        assert_eq!(err, &ActionError::UnknownAction("jump".into()));
    }

    #[test]
    fn handler_errors_pass_through_unwrapped() {
        let actions = Actions::new(Tree::new());
        actions.register("jump", |_, payload| {
            Err(Box::new(TooHigh(payload.as_u64().unwrap_or_default())))
        });

        let err = actions.dispatch("jump", json!(9)).unwrap_err();
        assert_eq!(err.to_string(), "cannot jump 9 high");
        assert!(err.downcast_ref::<TooHigh>().is_some());
    }

    #[test]
    fn handler_may_register_actions() {
        let actions = Rc::new(Actions::new(Tree::new()));
        let inner = Rc::downgrade(&actions);
        actions.register("install", move |_, _| {
            if let Some(actions) = inner.upgrade() {
                actions.register("installed", |_, _| Ok(()));
            }
            Ok(())
        });

        actions.dispatch("install", json!(null)).unwrap();
        assert!(actions.contains("installed"));
        assert_eq!(actions.names(), vec!["install", "installed"]);
        assert!(actions.unregister("installed"));
        assert!(!actions.unregister("installed"));
    }
}
