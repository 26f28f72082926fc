use serde_json::{Map, Value};

use crate::{constants::ROOT_ID, EntityId, SchemaError};

/// Where a singleton class lives in the graph
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Singleton {
    pub parent_id: EntityId,
    pub parent_property: String,
}

/// A registered per-class schema fragment together with the metadata the
/// composer reads off it
#[derive(Clone, Debug, PartialEq)]
pub struct ClassFragment {
    class_name: String,
    raw: Value,
    is_abstract: bool,
    singleton: Option<Singleton>,
    bases: Vec<String>,
}

impl ClassFragment {
    pub fn parse(raw: Value) -> Result<Self, SchemaError> {
        let Some(object) = raw.as_object() else {
            return Err(SchemaError::NotAnObject {
                fragment: raw.to_string(),
            });
        };
        let Some(class_name) = object.get("$id").and_then(Value::as_str) else {
            return Err(SchemaError::MissingId {
                fragment: raw.to_string(),
            });
        };
        let class_name = ref_name(class_name).to_string();

        let is_abstract = object
            .get("abstract")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let singleton = match object.get("singleton") {
            None | Some(Value::Bool(false)) | Some(Value::Null) => None,
            Some(Value::Bool(true)) => Some(Singleton {
                parent_id: EntityId::new(ROOT_ID),
                parent_property: String::new(),
            }),
            Some(Value::Object(parent)) => Some(parse_singleton(&class_name, parent)?),
            Some(other) => {
                return Err(SchemaError::InvalidFragment {
                    class_name,
                    reason: format!("singleton must be a boolean or an object, got {}", other),
                });
            }
        };

        let mut bases = Vec::new();
        if let Some(all_of) = object.get("allOf") {
            let Some(entries) = all_of.as_array() else {
                return Err(SchemaError::InvalidFragment {
                    class_name,
                    reason: "allOf must be an array".to_string(),
                });
            };
            for entry in entries {
                if let Some(base) = entry.get("$ref").and_then(Value::as_str) {
                    bases.push(ref_name(base).to_string());
                }
            }
        }

        Ok(Self {
            class_name,
            raw,
            is_abstract,
            singleton,
            bases,
        })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn singleton(&self) -> Option<&Singleton> {
        self.singleton.as_ref()
    }

    /// Classes named by `$ref` entries of the fragment's `allOf`
    pub fn bases(&self) -> &[String] {
        &self.bases
    }
}

fn parse_singleton(class_name: &str, parent: &Map<String, Value>) -> Result<Singleton, SchemaError> {
    let parent_id = parent.get("parentId").and_then(Value::as_str);
    let parent_property = parent.get("parentProperty").and_then(Value::as_str);
    match (parent_id, parent_property) {
        (Some(parent_id), Some(parent_property)) => Ok(Singleton {
            parent_id: EntityId::new(parent_id),
            parent_property: parent_property.to_string(),
        }),
        _ => Err(SchemaError::InvalidFragment {
            class_name: class_name.to_string(),
            reason: "singleton object needs parentId and parentProperty".to_string(),
        }),
    }
}

/// Strips a `#/definitions/` style prefix from a class reference
pub fn ref_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}
