use graft_shared::{
    EntityId, FileStore, MemoryStore, PersistenceAdapter, PersistenceError, SchemaRegistry, Store,
};
use serde_json::{json, Value};

fn stored(store: &dyn Store, id: &str) -> Value {
    serde_json::from_slice(&store.get(id).unwrap().unwrap()).unwrap()
}

#[test]
fn test_persist_record_without_id() {
    let schemas = SchemaRegistry::with_core_model();
    let adapter = PersistenceAdapter::new(MemoryStore::new());

    let result = adapter.persist(&schemas, &json!({ "className": "Browser" }));

    assert!(matches!(result, Err(PersistenceError::MissingId { .. })));
}

#[test]
fn test_load_record_stored_under_the_wrong_key() {
    let schemas = SchemaRegistry::with_core_model();
    let store = MemoryStore::new();
    store
        .set(
            "Display-1",
            json!({ "id": "Display-2", "className": "Display" }).to_string().as_bytes(),
        )
        .unwrap();
    let adapter = PersistenceAdapter::new(store);

    match adapter.load(&schemas, &EntityId::new("Display-1")) {
        Err(PersistenceError::Invalid { id, .. }) => {
            assert_eq!(id, "Display-1");
        }
        _ => panic!("Expected Invalid error"),
    }
}

#[test]
fn test_load_record_of_unknown_class() {
    let schemas = SchemaRegistry::with_core_model();
    let store = MemoryStore::new();
    store
        .set(
            "Plugin-7",
            json!({ "id": "Plugin-7", "className": "AnalogClock" }).to_string().as_bytes(),
        )
        .unwrap();
    let adapter = PersistenceAdapter::new(store);

    assert!(matches!(
        adapter.load(&schemas, &EntityId::new("Plugin-7")),
        Err(PersistenceError::Invalid { .. })
    ));
}

#[test]
fn test_missing_linked_singleton_is_recreated() {
    let schemas = SchemaRegistry::with_core_model();
    let store = MemoryStore::new();
    let adapter = PersistenceAdapter::new(store.clone());
    let root = schemas.synthesize("Root", None, None, "").unwrap();
    adapter.persist(&schemas, &root).unwrap();
    store.remove("Screen").unwrap();

    let loaded = adapter.load(&schemas, &EntityId::new("Root")).unwrap().unwrap();

    assert_eq!(loaded["screen"]["id"], json!("Screen"));
    assert_eq!(stored(&store, "Screen")["displays"], json!({}));
}

#[test]
fn test_file_store_round_trip() {
    let schemas = SchemaRegistry::with_core_model();
    let dir = std::env::temp_dir().join(format!("graft-persistence-{}", fastrand::u64(..)));
    let store = FileStore::open(&dir).unwrap();
    let adapter = PersistenceAdapter::new(store.clone());
    let root = schemas.synthesize("Root", None, None, "").unwrap();

    adapter.persist(&schemas, &root).unwrap();
    let loaded = adapter.load(&schemas, &EntityId::new("Root")).unwrap().unwrap();

    assert_eq!(loaded, root);
    assert_eq!(store.keys().unwrap(), vec!["Root", "Screen"]);
    std::fs::remove_dir_all(&dir).unwrap();
}
