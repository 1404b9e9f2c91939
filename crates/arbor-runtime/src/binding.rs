#![forbid(unsafe_code)]

//! Per-component bindings between the tree and the host framework.
//!
//! # Design
//!
//! A [`ComponentBinding`] owns one component, the handles it needs (tree,
//! tracker, dispatcher) and the component's last derived state. Mounting
//! derives the initial state and, for components that derive state,
//! registers a watch on the component's declared dependencies. The watch
//! callback recomputes state and asks the [`Host`] for an update; the host
//! answers by calling [`Lifecycle::should_update`], which compares the fresh
//! state with the stored one.
//!
//! The watch callback references the binding weakly, so a binding dropped
//! without `unmount` stops receiving notifications.
//!
//! # Invariants
//!
//! 1. A component that derives state renders at most once per commit that
//!    touches its dependencies, and only if its state changed.
//! 2. A component that does not derive state registers no watch, and its
//!    update decision is always `Update`.
//! 3. After `unmount` the component's watch and every watch in its
//!    [`WatchScope`] are released.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use arbor_tree::{Cursor, Path, Tree, Value};

use crate::actions::{ActionResult, Dispatch};
use crate::component::{BindingStats, Component, ComponentId, Decision, Host, Lifecycle};
use crate::dirty::{DirtyTracker, Interest, WatchHandle};
use crate::error::BindingError;
use crate::shallow::{CompareMode, DerivedState};

// ---------------------------------------------------------------------------
// WatchScope
// ---------------------------------------------------------------------------

/// Collects watch handles for one component.
///
/// Dropping or clearing the scope releases every held watch, most recent
/// first.
pub struct WatchScope {
    handles: Vec<WatchHandle>,
}

impl WatchScope {
    /// An empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Keep `handle` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, handle: WatchHandle) {
        self.handles.push(handle);
    }

    /// Number of held watches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release every held watch now.
    pub fn clear(&mut self) {
        while self.handles.pop().is_some() {}
    }
}

impl Drop for WatchScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl Default for WatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchScope")
            .field("watches", &self.handles.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentBinding
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BindingState {
    mounted: bool,
    derives: bool,
    derived: Option<DerivedState>,
    /// State recomputed by the last notification, consumed by the next
    /// update decision.
    pending: Option<Option<DerivedState>>,
    watch: Option<WatchHandle>,
    scope: WatchScope,
    host: Option<Rc<dyn Host>>,
    stats: BindingStats,
}

struct Shared<C> {
    id: ComponentId,
    component: C,
    tree: Tree,
    tracker: DirtyTracker,
    dispatcher: Rc<dyn Dispatch>,
    compare: CompareMode,
    state: RefCell<BindingState>,
}

impl<C: Component> Shared<C> {
    fn on_notify(&self) {
        let host = {
            let mut state = self.state.borrow_mut();
            if !state.mounted {
                return;
            }
            state.stats.notifications += 1;
            state.host.clone()
        };
        let next = self.component.state_from_tree(&self.tree);
        self.state.borrow_mut().pending = Some(next);
        tracing::trace!(component = %self.id, "binding notified");
        if let Some(host) = host {
            host.request_update(self.id);
        }
    }

    fn not_mounted(&self, hook: &'static str) -> BindingError {
        BindingError::NotMounted {
            component: self.id,
            hook,
        }
    }
}

/// Connects one component to a tree, a dirty tracker and an action
/// dispatcher.
///
/// Created by [`App::bind`](crate::app::App::bind). Cloning a binding
/// creates a new handle to the **same** component.
pub struct ComponentBinding<C> {
    shared: Rc<Shared<C>>,
}

impl<C: Component> ComponentBinding<C> {
    pub(crate) fn new(
        id: ComponentId,
        component: C,
        tree: Tree,
        tracker: DirtyTracker,
        dispatcher: Rc<dyn Dispatch>,
        compare: CompareMode,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                id,
                component,
                tree,
                tracker,
                dispatcher,
                compare,
                state: RefCell::new(BindingState::default()),
            }),
        }
    }

    /// The bound component.
    #[must_use]
    pub fn component(&self) -> &C {
        &self.shared.component
    }

    /// The tree this component reads from.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.shared.tree
    }

    /// A cursor into the tree.
    #[must_use]
    pub fn cursor(&self, path: impl Into<Path>) -> Cursor {
        self.shared.tree.cursor(path)
    }

    /// Forward a named action to the dispatcher.
    ///
    /// # Errors
    ///
    /// Whatever the dispatcher returns, unchanged.
    pub fn action(&self, name: &str, payload: impl Into<Value>) -> ActionResult {
        tracing::debug!(component = %self.shared.id, action = name, "component action");
        self.shared.dispatcher.dispatch(name, payload.into())
    }

    /// Watch `branches` for as long as the component stays mounted.
    ///
    /// # Errors
    ///
    /// [`BindingError::NotMounted`] outside mount/unmount, or
    /// [`BindingError::Watch`] for an empty branch list.
    pub fn watch<S: Into<String>>(
        &self,
        branches: impl IntoIterator<Item = S>,
        callback: impl Fn(&Tree) + 'static,
    ) -> Result<(), BindingError> {
        self.watch_interest(&Interest::branches(branches), callback)
    }

    /// Watch every branch for as long as the component stays mounted.
    ///
    /// # Errors
    ///
    /// [`BindingError::NotMounted`] outside mount/unmount.
    pub fn watch_all(&self, callback: impl Fn(&Tree) + 'static) -> Result<(), BindingError> {
        self.watch_interest(&Interest::All, callback)
    }

    fn watch_interest(
        &self,
        interest: &Interest,
        callback: impl Fn(&Tree) + 'static,
    ) -> Result<(), BindingError> {
        if !self.is_mounted() {
            return Err(self.shared.not_mounted("watch"));
        }
        let tree = self.shared.tree.clone();
        let handle = self
            .shared
            .tracker
            .watch_interest(interest, move || callback(&tree))?;
        self.shared.state.borrow_mut().scope.hold(handle);
        Ok(())
    }

    /// Number of component-scoped watches currently held.
    #[must_use]
    pub fn scoped_watch_count(&self) -> usize {
        self.shared.state.borrow().scope.len()
    }

    /// Whether this component derives state from the tree.
    #[must_use]
    pub fn derives_state(&self) -> bool {
        self.shared.state.borrow().derives
    }

    /// Run `f` against the current derived state without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(Option<&DerivedState>) -> R) -> R {
        f(self.shared.state.borrow().derived.as_ref())
    }

    /// Whether two handles refer to the same binding.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<C: Component> Lifecycle for ComponentBinding<C> {
    fn id(&self) -> ComponentId {
        self.shared.id
    }

    fn mount(&self, host: Rc<dyn Host>) -> Result<(), BindingError> {
        let shared = &self.shared;
        if shared.state.borrow().mounted {
            return Err(BindingError::AlreadyMounted {
                component: shared.id,
            });
        }
        let derived = shared.component.state_from_tree(&shared.tree);
        let watch = match derived {
            Some(_) => {
                let weak = Rc::downgrade(shared);
                let handle = shared.tracker.watch_interest(
                    &shared.component.dependencies(),
                    move || {
                        if let Some(shared) = weak.upgrade() {
                            shared.on_notify();
                        }
                    },
                )?;
                Some(handle)
            }
            None => None,
        };
        let derives = watch.is_some();
        let mut state = shared.state.borrow_mut();
        state.mounted = true;
        state.derives = derives;
        state.derived = derived;
        state.pending = None;
        state.watch = watch;
        state.host = Some(host);
        tracing::debug!(component = %shared.id, derives, "component mounted");
        Ok(())
    }

    fn should_update(&self) -> Result<Decision, BindingError> {
        let shared = &self.shared;
        let (derives, pending) = {
            let mut state = shared.state.borrow_mut();
            if !state.mounted {
                return Err(shared.not_mounted("should_update"));
            }
            state.stats.decisions += 1;
            (state.derives, state.pending.take())
        };
        if !derives {
            shared.state.borrow_mut().stats.updates += 1;
            return Ok(Decision::Update);
        }

        let next = match pending {
            Some(next) => next,
            None => shared.component.state_from_tree(&shared.tree),
        };
        let mut state = shared.state.borrow_mut();
        let unchanged = match (&state.derived, &next) {
            (Some(prev), Some(next)) => prev.shallow_eq(next, shared.compare),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            tracing::trace!(component = %shared.id, "derived state unchanged, skip");
            return Ok(Decision::Skip);
        }
        state.derived = next;
        state.stats.updates += 1;
        tracing::trace!(component = %shared.id, "derived state changed, update");
        Ok(Decision::Update)
    }

    fn unmount(&self) -> Result<(), BindingError> {
        let shared = &self.shared;
        let released = {
            let mut state = shared.state.borrow_mut();
            if !state.mounted {
                return Err(shared.not_mounted("unmount"));
            }
            state.mounted = false;
            state.derived = None;
            state.pending = None;
            (
                state.watch.take(),
                std::mem::take(&mut state.scope),
                state.host.take(),
            )
        };
        drop(released);
        tracing::debug!(component = %shared.id, "component unmounted");
        Ok(())
    }

    fn derived_state(&self) -> Option<DerivedState> {
        self.shared.state.borrow().derived.clone()
    }

    fn is_mounted(&self) -> bool {
        self.shared.state.borrow().mounted
    }

    fn stats(&self) -> BindingStats {
        self.shared.state.borrow().stats
    }
}

impl<C> Clone for ComponentBinding<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<C> fmt::Debug for ComponentBinding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("ComponentBinding")
            .field("id", &self.shared.id)
            .field("mounted", &state.mounted)
            .field("derives", &state.derives)
            .field("stats", &state.stats)
            .finish_non_exhaustive()
    }
}
