use futures::FutureExt;
use graft_shared::{
    Change, ChangeEffects, Coordinator, EntityError, EntityId, Graph, GraphContext,
    SyncError, SyncHandler,
};
use serde_json::{json, Value};

// Handler with nothing to load and nowhere to send
struct Isolated;

impl SyncHandler for Isolated {
    fn load(&mut self, _ctx: &GraphContext, _id: &EntityId) -> Result<Option<Value>, SyncError> {
        Ok(None)
    }

    fn propagate(&mut self, _graph: &Graph, _change: &Change) -> Result<(), SyncError> {
        Ok(())
    }

    fn persist(
        &mut self,
        _graph: &Graph,
        _ctx: &GraphContext,
        _change: &Change,
        _effects: &ChangeEffects,
    ) -> Result<(), SyncError> {
        Ok(())
    }
}

fn coordinator() -> Coordinator {
    let _ = env_logger::try_init();
    let mut ctx = GraphContext::default();
    ctx.add_schema(json!({
        "$id": "Ticker",
        "allOf": [{ "$ref": "Plugin" }],
        "properties": {
            "history": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["history"]
    }))
    .unwrap();
    let mut root = ctx.synthesize("Root", None, None, "").unwrap();
    root["screen"]["displays"] = json!({
        "Display-1": {
            "id": "Display-1", "parentId": "Screen", "parentProperty": "displays",
            "className": "Display", "width": 1920, "height": 1080,
            "browsers": {
                "Browser-1": {
                    "id": "Browser-1", "parentId": "Display-1", "parentProperty": "browsers",
                    "className": "Browser", "x": 0.25,
                    "plugins": {
                        "Plugin-1": {
                            "id": "Plugin-1", "parentId": "Browser-1",
                            "parentProperty": "plugins", "className": "Ticker",
                            "history": ["a", "b", "c"]
                        }
                    }
                }
            }
        }
    });
    let mut coordinator = Coordinator::new(ctx);
    coordinator.insert_record(root).unwrap();
    coordinator
}

fn id(value: &str) -> EntityId {
    EntityId::new(value)
}

#[test]
fn test_remote_change_for_unknown_target() {
    let mut coordinator = coordinator();
    let change = Change::item_update(&id("Browser-2"), "x", json!(0.5));

    let result = coordinator.apply_remote(&mut Isolated, &change);

    match result {
        Err(SyncError::MissingTarget { id }) => {
            assert_eq!(id, "Browser-2");
        }
        _ => panic!("Expected MissingTarget error"),
    }
}

#[test]
fn test_header_fields_are_immutable() {
    let mut coordinator = coordinator();
    let result = coordinator.set(&mut Isolated, &id("Browser-1"), "className", json!("Display"));

    assert!(matches!(result, Err(SyncError::ImmutableField { .. })));
    assert_eq!(
        coordinator.entity(&id("Browser-1")).unwrap().class_name(),
        "Browser"
    );
}

#[test]
fn test_invalid_scalar_is_rejected() {
    let mut coordinator = coordinator();
    let result = coordinator.set(&mut Isolated, &id("Browser-1"), "x", json!(4));

    match result {
        Err(SyncError::Entity(EntityError::Validation { errors, .. })) => {
            assert_eq!(errors[0].path, "/x");
            assert_eq!(errors[0].keyword, "maximum");
        }
        other => panic!("Expected Validation error, got {:?}", other),
    }
    assert_eq!(
        coordinator.entity(&id("Browser-1")).unwrap().value("x"),
        Some(&json!(0.25))
    );
}

#[test]
fn test_container_operation_on_a_scalar() {
    let mut coordinator = coordinator();
    let result = coordinator.container_remove(&mut Isolated, &id("Browser-1"), "x", &id("Plugin-1"));

    assert!(matches!(
        result,
        Err(SyncError::Entity(EntityError::WrongPropertyKind { .. }))
    ));
}

#[test]
fn test_container_delete_of_missing_key() {
    let mut coordinator = coordinator();
    let result =
        coordinator.container_remove(&mut Isolated, &id("Browser-1"), "plugins", &id("Plugin-9"));

    match result {
        Err(SyncError::Entity(EntityError::ContainerKeyNotFound { key, .. })) => {
            assert_eq!(key, "Plugin-9");
        }
        _ => panic!("Expected ContainerKeyNotFound error"),
    }
}

#[test]
fn test_list_update_out_of_bounds() {
    let mut coordinator = coordinator();
    let result = coordinator.list_update(&mut Isolated, &id("Plugin-1"), "history", 3, json!("d"));

    match result {
        Err(SyncError::Entity(EntityError::ListIndexOutOfBounds { index, len })) => {
            assert_eq!(index, 3);
            assert_eq!(len, 3);
        }
        _ => panic!("Expected ListIndexOutOfBounds error"),
    }
}

#[test]
fn test_list_splice_past_the_end() {
    let mut coordinator = coordinator();
    let result =
        coordinator.list_splice(&mut Isolated, &id("Plugin-1"), "history", 4, 0, vec![json!("d")]);

    assert!(matches!(
        result,
        Err(SyncError::Entity(EntityError::ListIndexOutOfBounds { .. }))
    ));
}

#[test]
fn test_list_splice_applies() {
    let mut coordinator = coordinator();
    coordinator
        .list_splice(
            &mut Isolated,
            &id("Plugin-1"),
            "history",
            1,
            1,
            vec![json!("x"), json!("y")],
        )
        .unwrap();

    assert_eq!(
        coordinator.graph().property_value(&id("Plugin-1"), "history"),
        Some(json!(["a", "x", "y", "c"]))
    );
}

#[test]
fn test_duplicate_id_is_rejected() {
    let mut coordinator = coordinator();
    let record = json!({
        "id": "Display-2", "className": "Display",
        "browsers": { "Browser-1": { "id": "Browser-1", "className": "Browser" } }
    });

    let result = coordinator.container_insert(&mut Isolated, &id("Screen"), "displays", record);

    match result {
        Err(SyncError::Entity(EntityError::DuplicateId { id })) => {
            assert_eq!(id, "Browser-1");
        }
        _ => panic!("Expected DuplicateId error"),
    }
    assert!(coordinator.entity(&id("Display-2")).is_none());
    assert!(!coordinator.context().factory.is_live(&id("Display-2")));
}

#[test]
fn test_wrong_class_in_container() {
    let mut coordinator = coordinator();
    let record = json!({ "id": "Display-2", "className": "Display" });

    let result = coordinator.container_insert(&mut Isolated, &id("Browser-1"), "plugins", record);

    assert!(result.is_err());
    assert!(coordinator.entity(&id("Display-2")).is_none());
}

#[test]
fn test_root_cannot_be_deleted() {
    let mut coordinator = coordinator();
    let result = coordinator.delete_entity(&mut Isolated, &id("Root"));

    assert!(matches!(result, Err(SyncError::RootDeletion { .. })));
}

#[test]
fn test_fetch_of_unavailable_entity() {
    let mut coordinator = coordinator();
    coordinator
        .container_insert_unloaded(&mut Isolated, &id("Screen"), "displays", &id("Display-9"))
        .unwrap();

    let future = coordinator.get_entity(&id("Root"), -1);
    assert_eq!(coordinator.process_fetches(&mut Isolated), 1);

    match future.now_or_never() {
        Some(Err(SyncError::Unavailable { id })) => {
            assert_eq!(id, "Display-9");
        }
        _ => panic!("Expected Unavailable error"),
    }
}

#[test]
fn test_fetch_status_defaults_to_load() {
    let mut handler = Isolated;
    let ctx = GraphContext::default();

    assert!(matches!(
        handler.fetch(&ctx, &id("Root")),
        Err(SyncError::Unavailable { .. })
    ));
}
