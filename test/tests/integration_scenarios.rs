use futures::FutureExt;
use graft_client::shared::Store;
use graft_server::{AuthorityError, Listener};
use graft_shared::{Change, ContainerChangeType, EntityId, MemoryStore};
use graft_test::{fixtures, seed, stored, TestNetwork};
use serde_json::json;

fn id(value: &str) -> EntityId {
    EntityId::new(value)
}

#[test]
fn empty_storage_boots_default_root_for_dependents() {
    let mut network = TestNetwork::new();
    let index = network.add_shared_dependent();

    let future = network.dependent(index).get_entity(&id("Root"), -1).unwrap();
    let exchange = network.exchange();

    let root = future.now_or_never().unwrap().unwrap();
    assert_eq!(root.class_name(), "Root");
    assert!(network.dependent(index).graph().contains(&id("Screen")));
    assert!(exchange.authority_errors.is_empty());
    let key = network.test_dependent(index).key;
    let listeners = network.authority.listeners(&key).unwrap();
    assert!(listeners.contains(&Listener {
        entity_id: id("Root"),
        depth: -1
    }));
    assert!(listeners.contains(&Listener {
        entity_id: id("Screen"),
        depth: -1
    }));
}

#[test]
fn dependent_without_storage_fetches_from_authority() {
    let mut network = TestNetwork::seeded();
    let index = network.add_dependent(MemoryStore::new());

    let mut future = network
        .dependent(index)
        .get_entity(&id("Display-1"), -1)
        .unwrap();
    assert!((&mut future).now_or_never().is_none());
    let exchange = network.exchange();

    assert!(exchange.authority_errors.is_empty());
    let display = future.now_or_never().unwrap().unwrap();
    assert_eq!(display.value("width"), Some(&json!(1920.0)));
    let browser = network.dependent(index).entity(&id("Browser-1")).unwrap();
    assert_eq!(browser.value("x"), Some(&json!(0.25)));
    assert!(network.test_dependent(index).store.keys().unwrap().is_empty());
}

#[test]
fn property_change_is_applied_persisted_and_relayed() {
    let mut network = TestNetwork::seeded();
    let writer = network.add_shared_dependent();
    let reader = network.add_shared_dependent();
    for index in [writer, reader] {
        network.dependent(index).get_entity(&id("Root"), -1).unwrap();
    }
    network.exchange();

    let commit = network
        .dependent(writer)
        .set(&id("Browser-1"), "x", json!(0.3))
        .unwrap();
    assert!(commit.is_local());
    let exchange = network.exchange();

    assert_eq!(exchange.authority_changes.len(), 1);
    assert_eq!(
        exchange.authority_changes[0].0,
        network.test_dependent(writer).key
    );
    assert_eq!(
        network.authority.entity(&id("Browser-1")).unwrap().value("x"),
        Some(&json!(0.3))
    );
    assert_eq!(stored(&network.store, "Browser-1").unwrap()["x"], json!(0.3));

    assert!(exchange.dependent_changes[writer].is_empty());
    assert_eq!(exchange.dependent_changes[reader].len(), 1);
    assert_eq!(
        network.dependent(reader).entity(&id("Browser-1")).unwrap().value("x"),
        Some(&json!(0.3))
    );
}

#[test]
fn container_insert_is_constructed_everywhere() {
    let mut network = TestNetwork::seeded();
    let writer = network.add_shared_dependent();
    let reader = network.add_shared_dependent();
    for index in [writer, reader] {
        network.dependent(index).get_entity(&id("Root"), -1).unwrap();
    }
    network.exchange();

    let (key, _) = network
        .dependent(writer)
        .container_insert(
            &id("Browser-1"),
            "plugins",
            fixtures::clock("Plugin-7", "Browser-1", "#000000"),
        )
        .unwrap();
    assert_eq!(key, id("Plugin-7"));
    let exchange = network.exchange();

    assert!(exchange.authority_errors.is_empty());
    let clock = network.authority.entity(&id("Plugin-7")).unwrap();
    assert_eq!(clock.class_name(), "AnalogClock");
    assert_eq!(stored(&network.store, "Plugin-7").unwrap()["color"], json!("#000000"));
    assert_eq!(
        stored(&network.store, "Browser-1").unwrap()["plugins"],
        json!({ "Plugin-7": null })
    );

    match exchange.dependent_changes[reader].as_slice() {
        [Change::Container(change)] => {
            assert_eq!(change.kind, ContainerChangeType::Add);
            assert_eq!(change.key, id("Plugin-7"));
            assert_eq!(change.new_value.as_ref().unwrap()["className"], json!("AnalogClock"));
        }
        other => panic!("Expected one container change, got {:?}", other),
    }
    let copy = network.dependent(reader).entity(&id("Plugin-7")).unwrap();
    assert_eq!(copy.value("color"), Some(&json!("#000000")));
    let view = network.dependent(reader).plugin_view(&id("Plugin-7")).unwrap();
    assert_eq!(view.scaled_bounds.unwrap().x, 480.0);
}

#[test]
fn corrupt_screen_record_is_recreated() {
    let store = MemoryStore::new();
    seed(&store, &fixtures::tree());
    store.set("Screen", b"{ not json").unwrap();

    let network = TestNetwork::with_store(store);

    let screen = network.authority.entity(&id("Screen")).unwrap();
    assert!(screen.container("displays").unwrap().is_empty());
    let record = stored(&network.store, "Screen").unwrap();
    assert_eq!(record["className"], json!("Screen"));
    assert_eq!(record["displays"], json!({}));
}

#[test]
fn init_handshake_replaces_authority_tree() {
    let mut network = TestNetwork::new();
    let dependent_store = MemoryStore::new();
    seed(&dependent_store, &fixtures::tree());
    let owner = network.add_dependent(dependent_store);
    network.dependent(owner).get_entity(&id("Root"), -1).unwrap();

    network.dependent(owner).init_authority().unwrap();
    let exchange = network.exchange();

    assert!(exchange.authority_errors.is_empty());
    assert!(network.authority.is_initialized());
    assert!(network.authority.graph().contains(&id("Browser-1")));
    assert_eq!(stored(&network.store, "Browser-1").unwrap()["x"], json!(0.25));

    let intruder = network.add_shared_dependent();
    network.dependent(intruder).get_entity(&id("Root"), -1).unwrap();
    network.dependent(intruder).init_authority().unwrap();
    let exchange = network.exchange();

    match exchange.authority_errors.as_slice() {
        [AuthorityError::AlreadyInitialized { .. }] => {}
        other => panic!("Expected AlreadyInitialized error, got {:?}", other),
    }
}

#[test]
fn announced_schema_reaches_other_dependents() {
    let mut network = TestNetwork::seeded();
    let announcer = network.add_shared_dependent();
    let listener = network.add_shared_dependent();

    network
        .dependent(announcer)
        .add_schema(fixtures::ticker())
        .unwrap();
    network.exchange();

    assert!(network.authority.context().schemas.contains("Ticker"));
    assert!(network
        .dependent(listener)
        .context()
        .schemas
        .contains("Ticker"));
}

#[test]
fn closed_link_disconnects_dependent() {
    let mut network = TestNetwork::seeded();
    let index = network.add_shared_dependent();
    let key = network.test_dependent(index).key;

    network.test_dependent(index).link.disconnect();
    network.exchange();

    assert!(!network.authority.connection_keys().contains(&key));
}
