use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::EntityId;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemChangeType {
    Add,
    Update,
    Remove,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerChangeType {
    Add,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListChangeType {
    Update,
    Splice,
}

/// A property of `item` was added, replaced or removed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemChange {
    pub item: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
}

/// An entry of the container `container` of `item` was added, replaced or
/// deleted. A missing `new_value` on add/update stores an unloaded entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerChange {
    pub item: EntityId,
    pub container: String,
    pub key: EntityId,
    #[serde(rename = "type")]
    pub kind: ContainerChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// Positional update or splice of the list `list` of `item`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChange {
    pub item: EntityId,
    pub list: String,
    #[serde(rename = "type")]
    pub kind: ListChangeType,
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_count: Option<usize>,
}

/// A single mutation of the graph, as exchanged between coordinators.
///
/// Deserialization tries the list and container forms before the item form,
/// since the item form has the fewest distinguishing fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Change {
    List(ListChange),
    Container(ContainerChange),
    Item(ItemChange),
}

/// The slot of the graph a change writes to
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum UpdateKey {
    Item {
        entity: EntityId,
        name: String,
    },
    Container {
        entity: EntityId,
        container: String,
        key: EntityId,
    },
    List {
        entity: EntityId,
        list: String,
        index: usize,
    },
}

impl Change {
    pub fn item_update(item: &EntityId, name: &str, new_value: Value) -> Self {
        Change::Item(ItemChange {
            item: item.clone(),
            name: name.to_string(),
            kind: ItemChangeType::Update,
            new_value: Some(new_value),
            old_value: None,
        })
    }

    pub fn container_add(item: &EntityId, container: &str, key: &EntityId, new_value: Option<Value>) -> Self {
        Change::Container(ContainerChange {
            item: item.clone(),
            container: container.to_string(),
            key: key.clone(),
            kind: ContainerChangeType::Add,
            new_value,
        })
    }

    pub fn container_delete(item: &EntityId, container: &str, key: &EntityId) -> Self {
        Change::Container(ContainerChange {
            item: item.clone(),
            container: container.to_string(),
            key: key.clone(),
            kind: ContainerChangeType::Delete,
            new_value: None,
        })
    }

    pub fn list_splice(item: &EntityId, list: &str, index: usize, removed_count: usize, added: Vec<Value>) -> Self {
        Change::List(ListChange {
            item: item.clone(),
            list: list.to_string(),
            kind: ListChangeType::Splice,
            index,
            new_value: None,
            added: Some(added),
            removed_count: Some(removed_count),
        })
    }

    /// The entity that owns the written property
    pub fn item(&self) -> &EntityId {
        match self {
            Change::Item(change) => &change.item,
            Change::Container(change) => &change.item,
            Change::List(change) => &change.item,
        }
    }

    /// Name of the written property
    pub fn property(&self) -> &str {
        match self {
            Change::Item(change) => &change.name,
            Change::Container(change) => &change.container,
            Change::List(change) => &change.list,
        }
    }

    pub fn update_key(&self) -> UpdateKey {
        match self {
            Change::Item(change) => UpdateKey::Item {
                entity: change.item.clone(),
                name: change.name.clone(),
            },
            Change::Container(change) => UpdateKey::Container {
                entity: change.item.clone(),
                container: change.container.clone(),
                key: change.key.clone(),
            },
            Change::List(change) => UpdateKey::List {
                entity: change.item.clone(),
                list: change.list.clone(),
                index: change.index,
            },
        }
    }

    /// The value carried by the change, as compared by the update channel
    pub fn payload(&self) -> Value {
        match self {
            Change::Item(change) => change.new_value.clone().unwrap_or(Value::Null),
            Change::Container(change) => match change.kind {
                ContainerChangeType::Delete => json!({ "deleted": true }),
                _ => change.new_value.clone().unwrap_or(Value::Null),
            },
            Change::List(change) => match change.kind {
                ListChangeType::Update => change.new_value.clone().unwrap_or(Value::Null),
                ListChangeType::Splice => json!({
                    "removedCount": change.removed_count.unwrap_or(0),
                    "added": change.added.clone().unwrap_or_default(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_each_form_from_its_fields() {
        let item: Change = serde_json::from_value(json!({
            "item": "Browser-1", "name": "x", "type": "update", "newValue": 0.3, "oldValue": 0.25
        }))
        .unwrap();
        assert!(matches!(item, Change::Item(ItemChange { kind: ItemChangeType::Update, .. })));

        let container: Change = serde_json::from_value(json!({
            "item": "Browser-1", "container": "plugins", "key": "Plugin-7", "type": "add"
        }))
        .unwrap();
        assert!(matches!(container, Change::Container(ContainerChange { new_value: None, .. })));

        let list: Change = serde_json::from_value(json!({
            "item": "Browser-1", "list": "history", "type": "splice", "index": 1,
            "added": ["a"], "removedCount": 2
        }))
        .unwrap();
        assert!(matches!(list, Change::List(ListChange { index: 1, removed_count: Some(2), .. })));
    }

    #[test]
    fn encodes_camel_case_and_skips_absent_values() {
        let change = Change::container_delete(&EntityId::new("Browser-1"), "plugins", &EntityId::new("Plugin-7"));
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({ "item": "Browser-1", "container": "plugins", "key": "Plugin-7", "type": "delete" })
        );
    }
}
