#![forbid(unsafe_code)]

//! Wiring between one tree, one dirty tracker and an action dispatcher.
//!
//! [`App`] subscribes to its tree: every staged write marks the branches it
//! touched dirty, and every commit runs one tracker pass. Bindings created
//! by [`App::bind`] share the app's tree, tracker, dispatcher and config.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use arbor_tree::{Subscription, Tree};

use crate::actions::{Actions, Dispatch};
use crate::binding::ComponentBinding;
use crate::component::{Component, ComponentId};
use crate::config::RuntimeConfig;
use crate::dirty::{DirtyTracker, WatchHandle};
use crate::error::{ConfigError, TrackerError};

/// One tree with its tracker, actions and component bindings.
///
/// ```
/// use std::rc::Rc;
/// use arbor_runtime::app::App;
/// use arbor_runtime::component::{ComponentId, FromTree, Host, Lifecycle};
/// use arbor_runtime::shallow::DerivedState;
/// use arbor_tree::{Tree, json};
///
/// struct Quiet;
/// impl Host for Quiet {
///     fn request_update(&self, _: ComponentId) {}
/// }
///
/// let app = App::new();
/// app.tree().root().set(json!({"fruit": "orange"})).commit();
///
/// let binding = app.bind(FromTree::new(["fruit"], |tree: &Tree| {
///     DerivedState::new().with("theFruit", tree.get("fruit"))
/// }));
/// binding.mount(Rc::new(Quiet)).unwrap();
///
/// app.tree().root().set_at("fruit", "apple").commit();
/// assert!(binding.should_update().unwrap().needs_update());
/// ```
pub struct App {
    tree: Tree,
    tracker: DirtyTracker,
    actions: Rc<Actions>,
    dispatcher: Rc<dyn Dispatch>,
    config: RuntimeConfig,
    next_component: Cell<u64>,
    _on_change: Subscription,
    _on_commit: Subscription,
}

impl App {
    /// An app over an empty tree with the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::build(Tree::new(), RuntimeConfig::default())
    }

    /// An app over an existing tree.
    #[must_use]
    pub fn with_tree(tree: Tree) -> Self {
        Self::build(tree, RuntimeConfig::default())
    }

    /// An app over an empty tree with `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `config` fails validation.
    pub fn with_config(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(Tree::new(), config))
    }

    fn build(tree: Tree, config: RuntimeConfig) -> Self {
        let tracker = DirtyTracker::with_max_depth(config.max_pass_depth);

        let marks = tracker.clone();
        let on_change = tree.on_change(move |event| {
            for branch in &event.branches {
                marks.mark_branch_dirty(branch.as_str());
            }
        });
        let passes = tracker.clone();
        let on_commit = tree.on_commit(move |event| {
            let report = passes.clean_all_dirty();
            tracing::debug!(
                revision = event.revision,
                generation = report.generation,
                notified = report.notified,
                "commit flushed"
            );
        });

        let actions = Rc::new(Actions::new(tree.clone()));
        Self {
            dispatcher: actions.clone(),
            actions,
            tree,
            tracker,
            config,
            next_component: Cell::new(0),
            _on_change: on_change,
            _on_commit: on_commit,
        }
    }

    /// Route component actions to `dispatcher` instead of the built-in
    /// registry. Affects bindings created afterwards.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Rc<dyn Dispatch>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// The shared tree.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The dirty tracker driven by the tree.
    #[must_use]
    pub fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    /// The built-in action registry.
    #[must_use]
    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    /// The active config.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Watch `branches`; `callback` receives the tree after each commit that
    /// touched any of them.
    ///
    /// # Errors
    ///
    /// [`TrackerError::EmptyBranchSet`] if `branches` yields nothing.
    pub fn watch<S: Into<String>>(
        &self,
        branches: impl IntoIterator<Item = S>,
        callback: impl Fn(&Tree) + 'static,
    ) -> Result<WatchHandle, TrackerError> {
        let tree = self.tree.clone();
        self.tracker.watch(branches, move || callback(&tree))
    }

    /// Watch every branch.
    pub fn watch_all(&self, callback: impl Fn(&Tree) + 'static) -> WatchHandle {
        let tree = self.tree.clone();
        self.tracker.watch_all(move || callback(&tree))
    }

    /// Bind `component` to this app. The binding is inert until mounted.
    pub fn bind<C: Component>(&self, component: C) -> ComponentBinding<C> {
        let id = self.next_component.get() + 1;
        self.next_component.set(id);
        tracing::trace!(component = id, "component bound");
        ComponentBinding::new(
            ComponentId(id),
            component,
            self.tree.clone(),
            self.tracker.clone(),
            Rc::clone(&self.dispatcher),
            self.config.compare,
        )
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("tree", &self.tree)
            .field("tracker", &self.tracker)
            .field("actions", &self.actions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionResult;
    use crate::component::{Decision, FromTree, Host, Lifecycle};
    use crate::shallow::{CompareMode, DerivedState};
    use arbor_tree::{Value, json};
    use std::cell::RefCell;

    struct Quiet;

    impl Host for Quiet {
        fn request_update(&self, _: ComponentId) {}
    }

    #[test]
    fn commit_runs_one_pass_per_commit() {
        let app = App::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _w = app.watch(["fruit", "animal"], move |_| h.set(h.get() + 1)).unwrap();

        app.tree()
            .root()
            .set_at("fruit", "orange")
            .set_at("animal", "sheep")
            .commit();
        assert_eq!(hits.get(), 1);
        assert_eq!(app.tracker().generation(), 1);
        assert!(app.tracker().dirty_branches().is_empty());
    }

    #[test]
    fn root_write_dirties_old_and_new_keys() {
        let app = App::new();
        app.tree().root().set(json!({"fruit": "orange"})).commit();

        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _w = app.watch(["fruit"], move |_| h.set(h.get() + 1)).unwrap();

        app.tree().root().set(json!({"animal": "sheep"})).commit();
        assert_eq!(hits.get(), 1, "removed key counts as touched");
    }

    #[test]
    fn watch_callback_sees_committed_tree() {
        let app = App::new();
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        let _w = app.watch_all(move |tree| *s.borrow_mut() = tree.get("fruit"));

        app.tree().root().set_at("fruit", "pear").commit();
        assert_eq!(*seen.borrow(), Some(json!("pear")));
    }

    #[test]
    fn bind_assigns_distinct_ids() {
        let app = App::new();
        let a = app.bind(());
        let b = app.bind(());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().get(), 1);
    }

    #[test]
    fn config_selects_compare_mode() {
        let config = RuntimeConfig::default().with_compare(CompareMode::LeftKeys);
        let app = App::with_config(config).unwrap();
        app.tree().root().set(json!({"fruit": "orange"})).commit();

        // Starts without `animal`; gains it later.
        let binding = app.bind(FromTree::all(|tree: &Tree| {
            let mut state = DerivedState::new().with("theFruit", tree.get("fruit"));
            if let Some(animal) = tree.get("animal") {
                state.insert("theAnimal", animal);
            }
            state
        }));
        binding.mount(Rc::new(Quiet)).unwrap();

        app.tree().root().set_at("animal", "sheep").commit();
        assert_eq!(binding.should_update().unwrap(), Decision::Skip);
    }

    #[test]
    fn invalid_config_rejected() {
        let err = App::with_config(RuntimeConfig::default().with_max_pass_depth(0)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn custom_dispatcher_receives_actions() {
        struct Spy(RefCell<Vec<(String, Value)>>);

        impl Dispatch for Spy {
            fn dispatch(&self, name: &str, payload: Value) -> ActionResult {
                self.0.borrow_mut().push((name.to_owned(), payload));
                Ok(())
            }
        }

        let spy = Rc::new(Spy(RefCell::new(Vec::new())));
        let app = App::new().with_dispatcher(spy.clone());
        let binding = app.bind(());
        binding.action("jump", json!({"height": 2})).unwrap();

        assert_eq!(
            *spy.0.borrow(),
            vec![("jump".to_owned(), json!({"height": 2}))]
        );
        assert!(app.actions().names().is_empty());
    }

    #[test]
    fn dropping_app_detaches_tree() {
        let tree = Tree::new();
        let app = App::with_tree(tree.clone());
        assert_eq!(tree.listener_count(), (1, 1));
        drop(app);
        tree.root().set_at("fruit", "fig").commit();
        assert_eq!(tree.listener_count(), (0, 0));
    }
}
