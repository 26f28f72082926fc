//! Plain-record normalization.
//!
//! Values are compared in shallow form: nested entities stay inline in their
//! own shallow form, container entries collapse to `null` and list elements
//! are normalized one by one.

use serde_json::{Map, Value};

use crate::{
    constants::{is_header_field, CLASS_NAME_FIELD},
    PropertyShape, SchemaRegistry,
};

/// Shallow form of a plain entity record
pub fn normalize_record(schemas: &SchemaRegistry, record: &Value) -> Value {
    let Value::Object(map) = record else {
        return record.clone();
    };
    let simplified = map
        .get(CLASS_NAME_FIELD)
        .and_then(Value::as_str)
        .and_then(|class_name| schemas.simplified(class_name));

    let mut output = Map::new();
    for (name, value) in map {
        let normalized = if is_header_field(name) {
            value.clone()
        } else {
            match simplified.and_then(|schema| schema.shape(name)) {
                Some(shape) => normalize_value(schemas, shape, value),
                None => value.clone(),
            }
        };
        output.insert(name.clone(), normalized);
    }
    Value::Object(output)
}

/// Shallow form of a property value of the given shape
pub fn normalize_value(schemas: &SchemaRegistry, shape: &PropertyShape, value: &Value) -> Value {
    match (shape, value) {
        (PropertyShape::Entity { .. }, Value::Object(_)) => normalize_record(schemas, value),
        (PropertyShape::Container { .. }, Value::Object(entries)) => Value::Object(
            entries
                .keys()
                .map(|key| (key.clone(), Value::Null))
                .collect(),
        ),
        (PropertyShape::List { item_class: Some(_) }, Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(_) => normalize_record(schemas, item),
                    other => other.clone(),
                })
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Shallow form of a container entry: a record or an unloaded `null`
pub fn normalize_entry(schemas: &SchemaRegistry, value: Option<&Value>) -> Value {
    match value {
        Some(record) if record.is_object() => normalize_record(schemas, record),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn collapses_nested_containers() {
        let schemas = SchemaRegistry::with_core_model();
        let display = json!({
            "id": "Display-1", "className": "Display", "x": 1,
            "browsers": { "Browser-1": { "id": "Browser-1", "className": "Browser", "plugins": {} } }
        });

        let normalized = normalize_record(&schemas, &display);
        assert_eq!(normalized["browsers"], json!({ "Browser-1": null }));
        assert_eq!(normalized["x"], json!(1));
    }
}
