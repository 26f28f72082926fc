use graft_shared::{EntityId, Registration, SchemaError, SchemaRegistry};
use serde_json::json;

fn analog_clock() -> serde_json::Value {
    json!({
        "$id": "AnalogClock",
        "allOf": [{ "$ref": "Plugin" }],
        "properties": {
            "color": { "type": "string", "default": "#ffffff" },
            "showSeconds": { "type": "boolean", "default": true }
        },
        "required": ["color", "showSeconds"]
    })
}

#[test]
fn test_register_identical_fragment_is_unchanged() {
    let mut registry = SchemaRegistry::with_core_model();

    assert_eq!(registry.register(analog_clock()).unwrap(), Registration::Added);
    assert_eq!(registry.register(analog_clock()).unwrap(), Registration::Unchanged);
    assert_eq!(
        registry.class_names().filter(|name| *name == "AnalogClock").count(),
        1
    );
}

#[test]
fn test_register_conflicting_fragment() {
    let mut registry = SchemaRegistry::with_core_model();
    registry.register(analog_clock()).unwrap();

    let mut changed = analog_clock();
    changed["properties"]["color"]["default"] = json!("#000000");
    let result = registry.register(changed);

    match result {
        Err(SchemaError::Conflict { class_name }) => {
            assert_eq!(class_name, "AnalogClock");
        }
        _ => panic!("Expected Conflict error"),
    }
    // the first registration is kept
    let clock = registry.synthesize("AnalogClock", None, None, "").unwrap();
    assert_eq!(clock["color"], json!("#ffffff"));
}

#[test]
fn test_register_fragment_without_id() {
    let mut registry = SchemaRegistry::new();
    let result = registry.register(json!({ "properties": {} }));

    assert!(matches!(result, Err(SchemaError::MissingId { .. })));
}

#[test]
fn test_register_fragment_that_is_not_an_object() {
    let mut registry = SchemaRegistry::new();
    let result = registry.register(json!(["AnalogClock"]));

    assert!(matches!(result, Err(SchemaError::NotAnObject { .. })));
}

#[test]
fn test_synthesize_abstract_class() {
    let registry = SchemaRegistry::with_core_model();
    let result = registry.synthesize("Plugin", None, None, "");

    match result {
        Err(SchemaError::AbstractClass { class_name }) => {
            assert_eq!(class_name, "Plugin");
        }
        _ => panic!("Expected AbstractClass error"),
    }
}

#[test]
fn test_synthesize_unknown_class() {
    let registry = SchemaRegistry::with_core_model();
    let result = registry.synthesize("DigitalClock", None, None, "");

    assert!(matches!(result, Err(SchemaError::UnknownClass { .. })));
}

#[test]
fn test_abstract_reference_expands_after_registration() {
    let mut registry = SchemaRegistry::with_core_model();
    let mut browser = registry
        .synthesize(
            "Browser",
            Some(EntityId::new("Browser-1")),
            Some(EntityId::new("Display-1")),
            "browsers",
        )
        .unwrap();
    browser["plugins"] = json!({
        "Plugin-7": {
            "id": "Plugin-7", "parentId": "Browser-1", "parentProperty": "plugins",
            "className": "AnalogClock", "name": "", "color": "#ffffff", "showSeconds": true
        }
    });
    assert!(registry.validate("Browser", &browser).is_err());

    registry.register(analog_clock()).unwrap();

    assert!(registry.validate("Browser", &browser).is_ok());
    assert!(registry.is_a("AnalogClock", "Plugin"));
}

#[test]
fn test_validation_errors_name_path_and_keyword() {
    let registry = SchemaRegistry::with_core_model();
    let mut display = registry
        .synthesize(
            "Display",
            Some(EntityId::new("Display-1")),
            Some(EntityId::new("Screen")),
            "displays",
        )
        .unwrap();
    display["width"] = json!(-5);
    display["scaleFactor"] = json!(0);

    let mut errors = registry.validate("Display", &display).unwrap_err();
    errors.sort_by(|a, b| a.path.cmp(&b.path));

    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].path, "/scaleFactor");
    assert_eq!(errors[0].keyword, "exclusiveMinimum");
    assert_eq!(errors[1].path, "/width");
    assert_eq!(errors[1].keyword, "minimum");
}

#[test]
fn test_simplified_schema_markers() {
    let mut registry = SchemaRegistry::with_core_model();
    registry.register(analog_clock()).unwrap();

    let display = registry.simplified("Display").unwrap();
    assert!(display.is_view_only("scaleFactor"));
    assert!(!display.is_view_only("width"));

    let clock = registry.simplified("AnalogClock").unwrap();
    assert!(clock.is_volatile("fps"));
    assert!(clock
        .visible_properties()
        .all(|property| property.name != "scaledBounds"));
}
