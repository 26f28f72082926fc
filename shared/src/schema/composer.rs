//! Schema composition.
//!
//! A class's composed schema is its own fragment with every `allOf` base
//! flattened in, and every reference to an abstract class replaced by a
//! `oneOf` over the concrete subclasses registered at composition time. Class
//! references between properties stay as `$ref`s and are resolved by the
//! validator through the composed table, so recursive models compose in
//! finite space.

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Map, Value};

use crate::{
    constants::{is_header_field, CLASS_NAME_FIELD},
    schema::class_fragment::{ref_name, ClassFragment},
    PropertySchema, PropertyShape, SchemaError, SimplifiedSchema,
};

// keywords that describe the fragment itself rather than the record
const FRAGMENT_KEYWORDS: [&str; 6] = [
    "$id",
    "allOf",
    "abstract",
    "singleton",
    "properties",
    "required",
];

#[derive(Clone, Debug)]
pub struct ComposedSchema {
    pub schema: Value,
    pub simplified: SimplifiedSchema,
}

#[derive(Default)]
struct Flattened {
    properties: Map<String, Value>,
    required: Vec<String>,
    keywords: Map<String, Value>,
}

impl Flattened {
    fn merge(&mut self, other: Flattened) {
        self.properties.extend(other.properties);
        for name in other.required {
            self.require(name);
        }
        self.keywords.extend(other.keywords);
    }

    fn absorb(&mut self, schema: &Map<String, Value>) {
        if let Some(Value::Object(properties)) = schema.get("properties") {
            for (name, property) in properties {
                self.properties.insert(name.clone(), property.clone());
            }
        }
        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                self.require(name.to_string());
            }
        }
        for (keyword, value) in schema {
            if !FRAGMENT_KEYWORDS.contains(&keyword.as_str()) {
                self.keywords.insert(keyword.clone(), value.clone());
            }
        }
    }

    fn require(&mut self, name: String) {
        if !self.required.contains(&name) {
            self.required.push(name);
        }
    }
}

pub fn compose(
    class_name: &str,
    fragments: &BTreeMap<String, ClassFragment>,
) -> Result<ComposedSchema, SchemaError> {
    let Some(fragment) = fragments.get(class_name) else {
        return Err(SchemaError::UnknownClass {
            class_name: class_name.to_string(),
        });
    };

    let mut stack = Vec::new();
    let flat = flatten(class_name, fragments, &mut stack)?;
    let simplified = simplify(fragment, &flat);
    let schema = build_schema(fragment, flat, fragments);

    Ok(ComposedSchema { schema, simplified })
}

fn flatten(
    class_name: &str,
    fragments: &BTreeMap<String, ClassFragment>,
    stack: &mut Vec<String>,
) -> Result<Flattened, SchemaError> {
    if stack.iter().any(|name| name == class_name) {
        return Err(SchemaError::CyclicInheritance {
            class_name: class_name.to_string(),
        });
    }
    let Some(fragment) = fragments.get(class_name) else {
        return Err(SchemaError::UnknownClass {
            class_name: class_name.to_string(),
        });
    };

    stack.push(class_name.to_string());

    let mut flat = Flattened::default();
    if let Some(Value::Array(entries)) = fragment.raw().get("allOf") {
        for entry in entries {
            match entry.get("$ref").and_then(Value::as_str) {
                Some(base) => flat.merge(flatten(ref_name(base), fragments, stack)?),
                None => {
                    if let Some(inline) = entry.as_object() {
                        flat.absorb(inline);
                    }
                }
            }
        }
    }
    if let Some(own) = fragment.raw().as_object() {
        flat.absorb(own);
    }

    stack.pop();

    Ok(flat)
}

fn build_schema(
    fragment: &ClassFragment,
    flat: Flattened,
    fragments: &BTreeMap<String, ClassFragment>,
) -> Value {
    let mut properties = Map::new();
    for (name, property) in &flat.properties {
        let mut expanded = expand(property, fragments);
        if let PropertyShape::Container { .. } = property_shape(property) {
            if let Some(entry_schema) = expanded.get("additionalProperties").cloned() {
                expanded["additionalProperties"] =
                    json!({ "anyOf": [{ "type": "null" }, entry_schema] });
            }
        }
        properties.insert(name.clone(), expanded);
    }
    if !fragment.is_abstract() {
        properties.insert(
            CLASS_NAME_FIELD.to_string(),
            json!({ "type": "string", "const": fragment.class_name() }),
        );
    }

    let mut schema = flat.keywords;
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    schema.insert(
        "required".to_string(),
        Value::Array(flat.required.into_iter().map(Value::String).collect()),
    );
    Value::Object(schema)
}

/// Rewrites every `$ref` to an abstract class into a `oneOf` over its
/// currently registered concrete subclasses
fn expand(schema: &Value, fragments: &BTreeMap<String, ClassFragment>) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
        let name = ref_name(reference);
        let is_abstract = fragments
            .get(name)
            .map(ClassFragment::is_abstract)
            .unwrap_or(false);
        if !is_abstract {
            return schema.clone();
        }
        let branches = concrete_subclasses(name, fragments)
            .into_iter()
            .map(|class_name| json!({ "$ref": class_name }))
            .collect();
        let mut output = map.clone();
        output.remove("$ref");
        output.insert("oneOf".to_string(), Value::Array(branches));
        return Value::Object(output);
    }

    let mut output = Map::new();
    for (keyword, value) in map {
        let expanded = match keyword.as_str() {
            "properties" => match value {
                Value::Object(properties) => Value::Object(
                    properties
                        .iter()
                        .map(|(name, property)| (name.clone(), expand(property, fragments)))
                        .collect(),
                ),
                other => other.clone(),
            },
            "additionalProperties" | "items" | "not" => expand(value, fragments),
            "allOf" | "anyOf" | "oneOf" => match value {
                Value::Array(branches) => Value::Array(
                    branches
                        .iter()
                        .map(|branch| expand(branch, fragments))
                        .collect(),
                ),
                other => other.clone(),
            },
            _ => value.clone(),
        };
        output.insert(keyword.clone(), expanded);
    }
    Value::Object(output)
}

/// Every non-abstract class that transitively extends `base`
pub fn concrete_subclasses(base: &str, fragments: &BTreeMap<String, ClassFragment>) -> Vec<String> {
    fragments
        .values()
        .filter(|fragment| !fragment.is_abstract())
        .filter(|fragment| extends(fragment.class_name(), base, fragments, &mut HashSet::new()))
        .map(|fragment| fragment.class_name().to_string())
        .collect()
}

fn extends(
    class_name: &str,
    base: &str,
    fragments: &BTreeMap<String, ClassFragment>,
    visited: &mut HashSet<String>,
) -> bool {
    if !visited.insert(class_name.to_string()) {
        return false;
    }
    let Some(fragment) = fragments.get(class_name) else {
        return false;
    };
    fragment
        .bases()
        .iter()
        .any(|parent| parent == base || extends(parent, base, fragments, visited))
}

/// Class named by a schema that references exactly one class, optionally
/// alongside `null` branches
pub fn class_ref(schema: &Value) -> Option<String> {
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        return Some(ref_name(reference).to_string());
    }
    for keyword in ["anyOf", "oneOf"] {
        let Some(Value::Array(branches)) = schema.get(keyword) else {
            continue;
        };
        let mut found = None;
        for branch in branches {
            if let Some(reference) = branch.get("$ref").and_then(Value::as_str) {
                if found.is_some() {
                    return None;
                }
                found = Some(ref_name(reference).to_string());
            } else if branch.get("type").and_then(Value::as_str) != Some("null") {
                return None;
            }
        }
        return found;
    }
    None
}

pub fn property_shape(schema: &Value) -> PropertyShape {
    if let Some(class_name) = class_ref(schema) {
        return PropertyShape::Entity { class_name };
    }
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => match schema.get("additionalProperties").and_then(class_ref) {
            Some(class_name) => PropertyShape::Container { class_name },
            None => PropertyShape::Scalar,
        },
        Some("array") => PropertyShape::List {
            item_class: schema.get("items").and_then(class_ref),
        },
        _ => PropertyShape::Scalar,
    }
}

fn simplify(fragment: &ClassFragment, flat: &Flattened) -> SimplifiedSchema {
    let flag = |property: &Value, keyword: &str| {
        property
            .get(keyword)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };

    let properties = flat
        .properties
        .iter()
        .filter(|(name, _)| !is_header_field(name))
        .map(|(name, property)| {
            let schema = PropertySchema {
                name: name.clone(),
                shape: property_shape(property),
                json_type: property
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                default: property.get("default").cloned(),
                constant: property.get("const").cloned(),
                required: flat.required.contains(name),
                view_only: flag(property, "viewOnly"),
                volatile: flag(property, "volatile"),
                hidden: flag(property, "hidden"),
            };
            (name.clone(), schema)
        })
        .collect();

    SimplifiedSchema {
        class_name: fragment.class_name().to_string(),
        is_abstract: fragment.is_abstract(),
        properties,
    }
}
