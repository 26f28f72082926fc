use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Structural kind of a property, derived from its schema
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PropertyShape {
    Scalar,
    #[serde(rename_all = "camelCase")]
    Entity { class_name: String },
    #[serde(rename_all = "camelCase")]
    Container { class_name: String },
    /// `item_class` is set when the elements are entities
    #[serde(rename_all = "camelCase")]
    List { item_class: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    pub name: String,
    pub shape: PropertyShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub constant: Option<Value>,
    pub required: bool,
    pub view_only: bool,
    pub volatile: bool,
    pub hidden: bool,
}

impl PropertySchema {
    /// Value a missing property is back-filled with: `const` wins over `default`
    pub fn fill_value(&self) -> Option<&Value> {
        self.constant.as_ref().or(self.default.as_ref())
    }
}

/// Flattened description of a class for tooling (forms, inspectors) and for
/// the entity model, which reads property shapes off it
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedSchema {
    pub class_name: String,
    pub is_abstract: bool,
    pub properties: BTreeMap<String, PropertySchema>,
}

impl SimplifiedSchema {
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    pub fn shape(&self, name: &str) -> Option<&PropertyShape> {
        self.properties.get(name).map(|property| &property.shape)
    }

    /// Properties that generic UI should show
    pub fn visible_properties(&self) -> impl Iterator<Item = &PropertySchema> {
        self.properties.values().filter(|property| !property.hidden)
    }

    pub fn is_view_only(&self, name: &str) -> bool {
        self.property(name).map(|p| p.view_only).unwrap_or(false)
    }

    pub fn is_volatile(&self, name: &str) -> bool {
        self.property(name).map(|p| p.volatile).unwrap_or(false)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
