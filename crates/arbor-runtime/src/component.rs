#![forbid(unsafe_code)]

//! The component capability interface and the host-facing lifecycle.
//!
//! A component opts into tree-derived state by implementing [`Component`].
//! The host framework never talks to the component directly; it drives the
//! [`Lifecycle`] of the component's [`ComponentBinding`](crate::binding::ComponentBinding)
//! and receives update requests through [`Host`].

use std::fmt;
use std::rc::Rc;

use arbor_tree::Tree;

use crate::dirty::Interest;
use crate::error::BindingError;
use crate::shallow::DerivedState;

/// Identifier assigned to a component when it is bound to an app.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u64);

impl ComponentId {
    /// Raw numeric id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a component can tell the binding layer about itself.
///
/// Both methods have defaults: a component that does not derive state gets
/// no automatic watch, and a component that derives state without narrowing
/// its dependencies is notified on every commit.
pub trait Component: 'static {
    /// Derive local state from the committed tree.
    ///
    /// Returning `None` at mount means the component does not derive state.
    /// Must be a pure function of the tree.
    fn state_from_tree(&self, _tree: &Tree) -> Option<DerivedState> {
        None
    }

    /// Branches whose changes can affect [`state_from_tree`](Self::state_from_tree).
    fn dependencies(&self) -> Interest {
        Interest::All
    }
}

/// A component with no derived state.
impl Component for () {}

/// A component built from a derivation closure and a dependency list.
///
/// ```
/// use arbor_runtime::component::{Component, FromTree};
/// use arbor_runtime::shallow::DerivedState;
/// use arbor_tree::{Tree, json};
///
/// let fruit = FromTree::new(["fruit"], |tree: &Tree| {
///     DerivedState::new().with("theFruit", tree.get("fruit"))
/// });
/// let tree = Tree::with_root(json!({"fruit": "orange"}));
/// let state = fruit.state_from_tree(&tree).unwrap();
/// assert_eq!(state.get("theFruit").and_then(|f| f.as_str()), Some("orange"));
/// ```
pub struct FromTree<F> {
    interest: Interest,
    derive: F,
}

impl<F> FromTree<F>
where
    F: Fn(&Tree) -> DerivedState + 'static,
{
    /// Derive with `derive`, depending on `branches`.
    pub fn new<S: Into<String>>(branches: impl IntoIterator<Item = S>, derive: F) -> Self {
        Self {
            interest: Interest::branches(branches),
            derive,
        }
    }

    /// Derive with `derive`, depending on every branch.
    pub fn all(derive: F) -> Self {
        Self {
            interest: Interest::All,
            derive,
        }
    }
}

impl<F> Component for FromTree<F>
where
    F: Fn(&Tree) -> DerivedState + 'static,
{
    fn state_from_tree(&self, tree: &Tree) -> Option<DerivedState> {
        Some((self.derive)(tree))
    }

    fn dependencies(&self) -> Interest {
        self.interest.clone()
    }
}

impl<F> fmt::Debug for FromTree<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromTree")
            .field("interest", &self.interest)
            .finish_non_exhaustive()
    }
}

/// Outcome of the update-decision hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Derived state changed (or is not tracked); the host should render.
    Update,
    /// Derived state is shallow-equal to the last one; skip the render.
    Skip,
}

impl Decision {
    /// Whether the host should render.
    #[must_use]
    pub fn needs_update(self) -> bool {
        matches!(self, Self::Update)
    }
}

/// Per-binding counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BindingStats {
    /// Watch callbacks received.
    pub notifications: u64,
    /// Calls to the update-decision hook.
    pub decisions: u64,
    /// Decisions that returned [`Decision::Update`].
    pub updates: u64,
}

/// The host framework, as seen from a binding.
///
/// Implementations should reference their own state weakly: the host
/// usually owns the bindings that hold it.
pub trait Host {
    /// The component's watched branches changed; run its update-decision
    /// hook when convenient (synchronously is fine).
    fn request_update(&self, component: ComponentId);
}

/// Lifecycle hooks the host must call, in order: `mount`, any number of
/// `should_update`, `unmount`.
pub trait Lifecycle {
    /// The bound component's id.
    fn id(&self) -> ComponentId;

    /// Derive initial state and subscribe.
    ///
    /// # Errors
    ///
    /// [`BindingError::AlreadyMounted`], or [`BindingError::Watch`] for an
    /// empty dependency list.
    fn mount(&self, host: Rc<dyn Host>) -> Result<(), BindingError>;

    /// Decide whether the component must re-render.
    ///
    /// # Errors
    ///
    /// [`BindingError::NotMounted`] outside mount/unmount.
    fn should_update(&self) -> Result<Decision, BindingError>;

    /// Unsubscribe and drop derived state.
    ///
    /// # Errors
    ///
    /// [`BindingError::NotMounted`] if not mounted.
    fn unmount(&self) -> Result<(), BindingError>;

    /// The current derived state, if the component derives one.
    fn derived_state(&self) -> Option<DerivedState>;

    /// Whether `mount` has been called without a matching `unmount`.
    fn is_mounted(&self) -> bool;

    /// Counters for this binding.
    fn stats(&self) -> BindingStats;
}
