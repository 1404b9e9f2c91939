#![forbid(unsafe_code)]

//! Test support for Arbor.
//!
//! - [`TestHost`]: a reference host that keeps a component hierarchy,
//!   renders components to strings, and counts decisions and re-renders.
//! - [`init_tracing`]: installs a `RUST_LOG`-filtered subscriber once per
//!   test binary.
//! - [`strategies`]: proptest strategies for batches of tree writes.
//!
//! # Host Model
//!
//! The host answers every [`Host::request_update`] synchronously: it runs the
//! component's update decision and, on `Update`, re-renders the component
//! and then offers each child an update decision, the way a parent render
//! re-renders its subtree in a component framework. The initial render at
//! mount does not count as a re-render.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Once;

use arbor_runtime::{BindingError, ComponentId, DerivedState, Host, Lifecycle};

pub mod strategies;

/// Renders a component's derived state to text.
pub type View = Rc<dyn Fn(Option<&DerivedState>) -> String>;

struct Node {
    binding: Rc<dyn Lifecycle>,
    view: View,
    parent: Option<ComponentId>,
    children: Vec<ComponentId>,
    output: String,
    rerenders: u64,
    decisions: u64,
}

#[derive(Default)]
struct HostState {
    nodes: BTreeMap<ComponentId, Node>,
    /// Re-render order across all components, for ordering assertions.
    render_log: Vec<ComponentId>,
}

/// Reference host that records what it renders.
///
/// Cloning a `TestHost` creates a new handle to the **same** host.
#[derive(Clone, Default)]
pub struct TestHost {
    state: Rc<RefCell<HostState>>,
}

/// The [`Host`] given to bindings; holds the host weakly.
struct HostHandle {
    state: Weak<RefCell<HostState>>,
}

impl Host for HostHandle {
    fn request_update(&self, component: ComponentId) {
        if let Some(state) = self.state.upgrade() {
            run_update(&state, component);
        }
    }
}

/// Run the decision for `id` and re-render it (and offer its children an
/// update) if asked to. No host borrow is held while bindings run.
fn run_update(state: &Rc<RefCell<HostState>>, id: ComponentId) {
    let Some(binding) = state.borrow().nodes.get(&id).map(|n| Rc::clone(&n.binding)) else {
        tracing::trace!(component = %id, "update for unknown component ignored");
        return;
    };
    let decision = match binding.should_update() {
        Ok(decision) => decision,
        Err(err) => {
            tracing::warn!(component = %id, error = %err, "update decision failed");
            return;
        }
    };
    if let Some(node) = state.borrow_mut().nodes.get_mut(&id) {
        node.decisions += 1;
    }
    if decision.needs_update() {
        render(state, id, true);
    }
}

fn render(state: &Rc<RefCell<HostState>>, id: ComponentId, rerender: bool) {
    let Some((binding, view)) = state
        .borrow()
        .nodes
        .get(&id)
        .map(|n| (Rc::clone(&n.binding), Rc::clone(&n.view)))
    else {
        return;
    };
    let output = view(binding.derived_state().as_ref());
    let children = {
        let mut guard = state.borrow_mut();
        let Some(node) = guard.nodes.get_mut(&id) else {
            return;
        };
        node.output = output;
        if !rerender {
            return;
        }
        node.rerenders += 1;
        let children = node.children.clone();
        guard.render_log.push(id);
        children
    };
    tracing::trace!(component = %id, "component re-rendered");
    for child in children {
        run_update(state, child);
    }
}

impl TestHost {
    /// An empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self) -> Rc<dyn Host> {
        Rc::new(HostHandle {
            state: Rc::downgrade(&self.state),
        })
    }

    /// Mount `binding` under `parent` and render it once.
    ///
    /// # Errors
    ///
    /// Whatever [`Lifecycle::mount`] reports; the host is left unchanged.
    pub fn mount<L: Lifecycle + 'static>(
        &self,
        binding: L,
        view: impl Fn(Option<&DerivedState>) -> String + 'static,
        parent: Option<ComponentId>,
    ) -> Result<ComponentId, BindingError> {
        let binding: Rc<dyn Lifecycle> = Rc::new(binding);
        let id = binding.id();
        binding.mount(self.handle())?;
        {
            let mut state = self.state.borrow_mut();
            if let Some(parent) = parent.and_then(|p| state.nodes.get_mut(&p)) {
                parent.children.push(id);
            }
            state.nodes.insert(
                id,
                Node {
                    binding,
                    view: Rc::new(view),
                    parent,
                    children: Vec::new(),
                    output: String::new(),
                    rerenders: 0,
                    decisions: 0,
                },
            );
        }
        render(&self.state, id, false);
        tracing::debug!(component = %id, parent = ?parent, "component mounted by host");
        Ok(id)
    }

    /// Unmount `id` and its subtree, children first.
    ///
    /// # Errors
    ///
    /// The first [`Lifecycle::unmount`] failure; the rest of the subtree is
    /// still removed.
    pub fn unmount(&self, id: ComponentId) -> Result<(), BindingError> {
        let (binding, children, parent) = {
            let state = self.state.borrow();
            let Some(node) = state.nodes.get(&id) else {
                return Ok(());
            };
            (Rc::clone(&node.binding), node.children.clone(), node.parent)
        };
        let mut result = Ok(());
        for child in children {
            if let Err(err) = self.unmount(child) {
                result = result.and(Err(err));
            }
        }
        if let Err(err) = binding.unmount() {
            result = result.and(Err(err));
        }
        let mut state = self.state.borrow_mut();
        state.nodes.remove(&id);
        if let Some(parent) = parent.and_then(|p| state.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        result
    }

    /// Host-driven update of `id`, as if its parent re-rendered.
    pub fn update(&self, id: ComponentId) {
        run_update(&self.state, id);
    }

    /// Last rendered output of `id`.
    #[must_use]
    pub fn output(&self, id: ComponentId) -> Option<String> {
        self.state.borrow().nodes.get(&id).map(|n| n.output.clone())
    }

    /// Re-renders of `id` since mount or the last [`reset_counts`](Self::reset_counts).
    #[must_use]
    pub fn rerender_count(&self, id: ComponentId) -> u64 {
        self.state.borrow().nodes.get(&id).map_or(0, |n| n.rerenders)
    }

    /// Update decisions run for `id` since mount or the last reset.
    #[must_use]
    pub fn decision_count(&self, id: ComponentId) -> u64 {
        self.state.borrow().nodes.get(&id).map_or(0, |n| n.decisions)
    }

    /// Re-renders in the order they happened.
    #[must_use]
    pub fn render_log(&self) -> Vec<ComponentId> {
        self.state.borrow().render_log.clone()
    }

    /// Zero every counter and clear the render log.
    pub fn reset_counts(&self) {
        let mut state = self.state.borrow_mut();
        state.render_log.clear();
        for node in state.nodes.values_mut() {
            node.rerenders = 0;
            node.decisions = 0;
        }
    }

    /// Whether `id` is mounted in this host.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.state.borrow().nodes.contains_key(&id)
    }

    /// Mounted component ids, ascending.
    #[must_use]
    pub fn mounted(&self) -> Vec<ComponentId> {
        self.state.borrow().nodes.keys().copied().collect()
    }
}

impl fmt::Debug for TestHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TestHost")
            .field("mounted", &state.nodes.len())
            .field("rerenders", &state.render_log.len())
            .finish()
    }
}

/// A view that renders one field of the derived state, or `""`.
pub fn field_view(name: &'static str) -> impl Fn(Option<&DerivedState>) -> String + 'static {
    move |state| match state.and_then(|s| s.value(name)) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Assert the last rendered output of a component.
///
/// ```ignore
/// assert_output!(host, id, "orange");
/// ```
#[macro_export]
macro_rules! assert_output {
    ($host:expr, $id:expr, $expected:expr) => {{
        let actual = $host.output($id);
        assert_eq!(
            actual.as_deref(),
            Some($expected),
            "output of component {} differs",
            $id
        );
    }};
}

/// Install a `tracing` subscriber for tests, once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Output goes
/// through the test writer so it is captured per test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_runtime::{App, FromTree};
    use arbor_tree::{Tree, json};

    fn fruit_app() -> App {
        let app = App::new();
        app.tree()
            .root()
            .set(json!({"fruit": "orange", "animal": "sheep"}))
            .commit();
        app
    }

    fn fruit_reader(app: &App) -> arbor_runtime::ComponentBinding<impl arbor_runtime::Component> {
        app.bind(FromTree::new(["fruit"], |tree: &Tree| {
            DerivedState::new().with("theFruit", tree.get("fruit"))
        }))
    }

    #[test]
    fn mount_renders_without_counting() {
        init_tracing();
        let app = fruit_app();
        let host = TestHost::new();
        let id = host
            .mount(fruit_reader(&app), field_view("theFruit"), None)
            .unwrap();

        assert_output!(host, id, "orange");
        assert_eq!(host.rerender_count(id), 0);
        assert_eq!(host.decision_count(id), 0);
        assert_eq!(host.mounted(), vec![id]);
    }

    #[test]
    fn parent_render_offers_children_an_update() {
        let app = fruit_app();
        let host = TestHost::new();
        let parent = host.mount(fruit_reader(&app), field_view("theFruit"), None).unwrap();
        let child = host.mount(app.bind(()), |_| "static".into(), Some(parent)).unwrap();

        app.tree().root().set_at("fruit", "apple").commit();
        assert_eq!(host.rerender_count(parent), 1);
        assert_eq!(host.rerender_count(child), 1);
        assert_eq!(host.render_log(), vec![parent, child]);
    }

    #[test]
    fn unmount_removes_subtree() {
        let app = fruit_app();
        let host = TestHost::new();
        let parent = host.mount(fruit_reader(&app), field_view("theFruit"), None).unwrap();
        let child = host.mount(fruit_reader(&app), field_view("theFruit"), Some(parent)).unwrap();
        assert_eq!(app.tracker().watcher_count(), 2);

        host.unmount(parent).unwrap();
        assert!(!host.contains(parent));
        assert!(!host.contains(child));
        assert_eq!(app.tracker().watcher_count(), 0);
    }

    #[test]
    fn failed_mount_leaves_host_unchanged() {
        let app = fruit_app();
        let host = TestHost::new();
        let binding = fruit_reader(&app);
        host.mount(binding.clone(), field_view("theFruit"), None).unwrap();
        assert!(matches!(
            host.mount(binding, field_view("theFruit"), None),
            Err(BindingError::AlreadyMounted { .. })
        ));
        assert_eq!(host.mounted().len(), 1);
    }

    #[test]
    fn field_view_formats_non_strings() {
        let view = field_view("n");
        let state = DerivedState::new().with("n", json!(3));
        assert_eq!(view(Some(&state)), "3");
        assert_eq!(view(None), "");
    }
}
