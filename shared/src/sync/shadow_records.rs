use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::{
    graph::records::{normalize_entry, normalize_value},
    Change, ContainerChangeType, EntityId, Graph, ItemChangeType, ListChangeType, PropertyShape,
    SchemaRegistry,
};

/// Last-known remote values, one shallow record per entity touched by a
/// remote update. Only consulted to tell echoes from local changes.
#[derive(Debug, Default)]
pub struct ShadowRecords {
    records: HashMap<EntityId, Value>,
}

impl ShadowRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Value> {
        self.records.get(id)
    }

    /// Writes the value carried by a remote `change` into the shadow record
    /// of its target, snapshotting the target first if this is the first
    /// remote touch. Returns the staged value of the written slot.
    pub fn stage(
        &mut self,
        graph: &Graph,
        schemas: &SchemaRegistry,
        change: &Change,
    ) -> Option<Value> {
        let id = change.item();
        if !self.records.contains_key(id) {
            let snapshot = graph.to_shallow(id)?;
            self.records.insert(id.clone(), snapshot);
        }
        let shape = graph
            .get(id)
            .and_then(|entity| schemas.simplified(entity.class_name()))
            .and_then(|schema| schema.shape(change.property()))
            .cloned()
            .unwrap_or(PropertyShape::Scalar);
        let record = self.records.get_mut(id)?.as_object_mut()?;

        match change {
            Change::Item(item) => match item.kind {
                ItemChangeType::Remove => {
                    record.remove(&item.name);
                }
                ItemChangeType::Add | ItemChangeType::Update => {
                    let value = item.new_value.clone().unwrap_or(Value::Null);
                    record.insert(item.name.clone(), normalize_value(schemas, &shape, &value));
                }
            },
            Change::Container(container) => {
                let Some(entries) = entries_mut(record, &container.container) else {
                    return None;
                };
                match container.kind {
                    ContainerChangeType::Delete => {
                        entries.remove(container.key.as_str());
                    }
                    ContainerChangeType::Add | ContainerChangeType::Update => {
                        entries.insert(
                            container.key.to_string(),
                            normalize_entry(schemas, container.new_value.as_ref()),
                        );
                    }
                }
            }
            Change::List(list) => {
                let item_shape = match &shape {
                    PropertyShape::List { item_class } => PropertyShape::List {
                        item_class: item_class.clone(),
                    },
                    _ => PropertyShape::List { item_class: None },
                };
                let normalize = |value: &Value| match normalize_value(
                    schemas,
                    &item_shape,
                    &Value::Array(vec![value.clone()]),
                ) {
                    Value::Array(mut items) => items.pop().unwrap_or(Value::Null),
                    other => other,
                };
                let Some(items) = items_mut(record, &list.list) else {
                    return None;
                };
                match list.kind {
                    ListChangeType::Update => {
                        if let Some(slot) = items.get_mut(list.index) {
                            *slot = normalize(list.new_value.as_ref().unwrap_or(&Value::Null));
                        }
                    }
                    ListChangeType::Splice => {
                        let index = list.index.min(items.len());
                        let end = index + list.removed_count.unwrap_or(0).min(items.len() - index);
                        let added: Vec<Value> = list
                            .added
                            .iter()
                            .flatten()
                            .map(|value| normalize(value))
                            .collect();
                        items.splice(index..end, added);
                    }
                }
            }
        }

        self.slot(change).cloned()
    }

    /// Overwrites the slot `change` wrote with the value the graph now holds
    pub fn record(&mut self, graph: &Graph, change: &Change) {
        let Some(record) = self
            .records
            .get_mut(change.item())
            .and_then(Value::as_object_mut)
        else {
            return;
        };
        let value = graph.key_value(change);
        match change {
            Change::Item(item) => match value {
                Some(value) => {
                    record.insert(item.name.clone(), value);
                }
                None => {
                    record.remove(&item.name);
                }
            },
            Change::Container(container) => {
                let Some(entries) = entries_mut(record, &container.container) else {
                    return;
                };
                match value {
                    Some(value) => {
                        entries.insert(container.key.to_string(), value);
                    }
                    None => {
                        entries.remove(container.key.as_str());
                    }
                }
            }
            Change::List(list) => match value {
                Some(value) => {
                    record.insert(list.list.clone(), value);
                }
                None => {
                    record.remove(&list.list);
                }
            },
        }
    }

    /// True if the post-write value of the slot `change` wrote equals the
    /// last value received for it.
    ///
    /// Equality is the only signal: a local write that happens to reproduce
    /// the last remote value is classified as an echo and not propagated.
    pub fn matches(&self, change: &Change, post: Option<&Value>) -> bool {
        if !self.records.contains_key(change.item()) {
            return false;
        }
        self.slot(change) == post
    }

    pub fn forget<'a, I: IntoIterator<Item = &'a EntityId>>(&mut self, ids: I) {
        for id in ids {
            self.records.remove(id);
        }
    }

    fn slot(&self, change: &Change) -> Option<&Value> {
        let record = self.records.get(change.item())?;
        match change {
            Change::Item(item) => record.get(&item.name),
            Change::Container(container) => record
                .get(&container.container)?
                .get(container.key.as_str()),
            Change::List(list) => record.get(&list.list),
        }
    }
}

fn entries_mut<'a>(record: &'a mut Map<String, Value>, name: &str) -> Option<&'a mut Map<String, Value>> {
    let slot = record
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut()
}

fn items_mut<'a>(record: &'a mut Map<String, Value>, name: &str) -> Option<&'a mut Vec<Value>> {
    let slot = record
        .entry(name.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
}
