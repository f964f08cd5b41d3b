use crate::{MockOptions, MockSpec, MockStore, RawMock, FILE_NAMESPACE, ROOT_NAMESPACE};
use serde_json::json;
use sqlmock_core::{DataPacket, StepOptions, RESULT_STEP_NAME};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn root() -> MockOptions {
    MockOptions::default()
}

#[test]
fn test_add_then_get_reproduces_value() {
    let store = MockStore::new();
    store.add_mock("books", json!([{ "title": "Dune" }]), &root());

    let descriptor = store.get_mock("books", &root()).unwrap();
    assert_eq!(
        descriptor.produce("books", &StepOptions::new()).into_value(),
        json!([{ "title": "Dune" }])
    );
}

#[test]
fn test_add_then_get_invokes_callback() {
    let store = MockStore::new();
    store.add_mock(
        "guise",
        RawMock::callback(|_, options| {
            DataPacket::new(json!({ "echo": options.param("testval").cloned() }))
        }),
        &root(),
    );

    let options = StepOptions::procedure("guise").with_param("testval", json!("abc"));
    let value = store
        .get_mock("guise", &root())
        .unwrap()
        .produce("guise", &options)
        .into_value();
    assert_eq!(value, json!({ "echo": "abc" }));
}

#[test]
fn test_reserved_key_is_never_stored() {
    let store = MockStore::new();
    store.add_mock(RESULT_STEP_NAME, json!(1), &root());

    assert!(store.get_mock(RESULT_STEP_NAME, &root()).is_none());
    assert!(store.is_empty());
    assert_eq!(store.namespace_count(), 0);
}

#[test]
fn test_namespaces_are_independent() {
    let store = MockStore::new();
    store.add_mock("q", json!("root"), &root());
    store.add_mock("q", json!("custom"), &MockOptions::namespace("custom"));

    assert_eq!(
        store.get_mock("q", &MockOptions::namespace("custom")).unwrap().produce("q", &StepOptions::new()).into_value(),
        json!("custom")
    );
    assert!(store.get_mock("q", &MockOptions::namespace("missing")).is_none());
    assert_eq!(store.keys(ROOT_NAMESPACE), vec!["q".to_string()]);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_clear_single_key_and_everything() {
    let store = MockStore::new();
    store.add_mock("a", json!(1), &root());
    store.add_mock("b", json!(2), &root());
    store.add_mock("/sql/a.sql", json!(3), &MockOptions::file());

    store.clear_mock(Some("a"), &root());
    assert!(store.get_mock("a", &root()).is_none());
    assert!(store.get_mock("b", &root()).is_some());
    assert!(store.get_file_mock("file:///sql/a.sql").is_some());

    // misses are silent
    store.clear_mock(Some("nope"), &MockOptions::namespace("nowhere"));

    store.clear_mock(None, &root());
    assert!(store.is_empty());
    assert!(store.keys(FILE_NAMESPACE).is_empty());
}

#[test]
fn test_file_mock_lookup_and_clear() {
    let store = MockStore::new();
    store.add_mock(
        "/srv/app/userById.sql",
        MockSpec::new().result(json!([{ "id": 9 }])),
        &MockOptions::file(),
    );

    assert!(store.get_file_mock("file:///srv/app/userById.sql").is_some());
    assert!(store.get_file_mock("/srv/app/userById.sql").is_some());
    assert!(store.get_mock("/srv/app/userById.sql", &root()).is_none());

    store.clear_file_mock("file:///srv/app/userById.sql");
    assert!(store.get_file_mock("/srv/app/userById.sql").is_none());
}

#[test]
fn test_take_if_current_only_removes_same_descriptor() {
    let store = MockStore::new();
    store.add_mock("once", MockSpec::new().result(json!(1)).once(), &root());
    let first = store.get_mock("once", &root()).unwrap();

    // replaced before the first holder consumed it
    store.add_mock("once", MockSpec::new().result(json!(2)).once(), &root());
    assert!(!store.take_if_current(ROOT_NAMESPACE, "once", &first));

    let second = store.get_mock("once", &root()).unwrap();
    assert!(store.take_if_current(ROOT_NAMESPACE, "once", &second));
    assert!(!store.take_if_current(ROOT_NAMESPACE, "once", &second));
    assert!(store.get_mock("once", &root()).is_none());
}

#[test]
fn test_one_shot_taken_exactly_once_across_threads() {
    let store = Arc::new(MockStore::new());
    store.add_mock("once", MockSpec::new().result(json!("x")).once(), &root());
    let taken = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let taken = taken.clone();
            thread::spawn(move || {
                if let Some(descriptor) = store.get_mock("once", &MockOptions::default()) {
                    if store.take_if_current(ROOT_NAMESPACE, "once", &descriptor) {
                        taken.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(taken.load(Ordering::SeqCst), 1);
}
