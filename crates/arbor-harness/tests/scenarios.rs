#![forbid(unsafe_code)]

//! Integration tests: end-to-end update decisions for bound components.
//!
//! A "fruit reader" derives `{theFruit: tree.fruit}` and depends on the
//! `fruit` branch only.

use arbor_harness::{TestHost, assert_output, field_view, init_tracing};
use arbor_runtime::{App, Component, ComponentBinding, DerivedState, FromTree, Lifecycle};
use arbor_tree::{Tree, json};

fn fruit_reader(app: &App) -> ComponentBinding<impl Component> {
    app.bind(FromTree::new(["fruit"], |tree: &Tree| {
        DerivedState::new().with("theFruit", tree.get("fruit"))
    }))
}

/// An app whose tree holds `{fruit: orange, animal: sheep}`, committed from
/// an empty tree.
fn seeded_app() -> App {
    let app = App::new();
    app.tree()
        .root()
        .set(json!({"fruit": "orange", "animal": "sheep"}))
        .commit();
    app
}

// ============================================================================
// Single component
// ============================================================================

#[test]
fn renders_initial_tree_state() {
    init_tracing();
    let app = seeded_app();
    let host = TestHost::new();
    let id = host
        .mount(fruit_reader(&app), field_view("theFruit"), None)
        .unwrap();

    assert_output!(host, id, "orange");
    assert_eq!(app.tree().revision(), 1);
}

#[test]
fn watched_change_updates_once() {
    init_tracing();
    let app = seeded_app();
    let host = TestHost::new();
    let id = host
        .mount(fruit_reader(&app), field_view("theFruit"), None)
        .unwrap();

    app.tree().root().set_at("fruit", "apple").commit();

    assert_eq!(host.decision_count(id), 1);
    assert_eq!(host.rerender_count(id), 1);
    assert_output!(host, id, "apple");
}

#[test]
fn unwatched_change_is_not_seen() {
    init_tracing();
    let app = seeded_app();
    let host = TestHost::new();
    let binding = fruit_reader(&app);
    let id = host
        .mount(binding.clone(), field_view("theFruit"), None)
        .unwrap();

    app.tree().root().set_at("animal", "sloth").commit();

    assert_eq!(host.decision_count(id), 0);
    assert_eq!(host.rerender_count(id), 0);
    assert_eq!(binding.stats().notifications, 0);
    assert_eq!(app.tree().get("animal"), Some(json!("sloth")));
    assert_output!(host, id, "orange");
}

#[test]
fn equal_write_decides_without_rendering() {
    init_tracing();
    let app = seeded_app();
    let host = TestHost::new();
    let id = host
        .mount(fruit_reader(&app), field_view("theFruit"), None)
        .unwrap();

    app.tree().root().set_at("fruit", "orange").commit();

    assert_eq!(host.decision_count(id), 1);
    assert_eq!(host.rerender_count(id), 0);
}

// ============================================================================
// Hierarchy
// ============================================================================

#[test]
fn container_and_child_each_update_once() {
    init_tracing();
    let app = seeded_app();
    let host = TestHost::new();
    let container = fruit_reader(&app);
    let child = fruit_reader(&app);
    let container_id = host
        .mount(container.clone(), field_view("theFruit"), None)
        .unwrap();
    let child_id = host
        .mount(child.clone(), field_view("theFruit"), Some(container_id))
        .unwrap();

    app.tree().root().set_at("fruit", "apple").commit();

    assert_eq!(container.stats().notifications, 1);
    assert_eq!(child.stats().notifications, 1);
    assert_eq!(container.stats().updates, 1);
    assert_eq!(child.stats().updates, 1);
    assert_eq!(host.rerender_count(container_id), 1);
    assert_eq!(host.rerender_count(child_id), 1);
    assert_eq!(host.render_log(), vec![container_id, child_id]);
    assert_output!(host, child_id, "apple");
}

#[test]
fn stateless_child_follows_parent() {
    init_tracing();
    let app = seeded_app();
    let host = TestHost::new();
    let parent = host
        .mount(fruit_reader(&app), field_view("theFruit"), None)
        .unwrap();
    let label = host
        .mount(app.bind(()), |_| "label".to_owned(), Some(parent))
        .unwrap();

    app.tree().root().set_at("animal", "goat").commit();
    assert_eq!(host.rerender_count(label), 0);

    app.tree().root().set_at("fruit", "fig").commit();
    assert_eq!(host.rerender_count(label), 1);

    host.update(label);
    assert_eq!(host.rerender_count(label), 2, "host-driven update always renders");
}

#[test]
fn independent_apps_do_not_cross_talk() {
    init_tracing();
    let first = seeded_app();
    let second = seeded_app();
    let host = TestHost::new();
    let a = host
        .mount(fruit_reader(&first), field_view("theFruit"), None)
        .unwrap();
    // Ids are only unique per app, so the second app gets its own host.
    let other_host = TestHost::new();
    let b = other_host
        .mount(fruit_reader(&second), field_view("theFruit"), None)
        .unwrap();

    first.tree().root().set_at("fruit", "apple").commit();

    assert_eq!(host.rerender_count(a), 1);
    assert_eq!(other_host.rerender_count(b), 0);
    assert_output!(other_host, b, "orange");
}
