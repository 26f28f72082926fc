use std::collections::HashSet;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::{
    constants::{CLASS_NAME_FIELD, ID_FIELD},
    graph::graph::stub,
    Change, ChangeEffects, EntityId, Graph, PersistenceError, PropertyShape, SchemaRegistry,
    Store,
};

/// Writes entity records into a `Store` one record per id, in shallow form
/// with nested entities replaced by `{id}` link stubs, and reads them back
/// with the stubs resolved.
pub struct PersistenceAdapter {
    store: Box<dyn Store>,
    recover_singletons: bool,
    write_recovered: bool,
    persist_volatile: bool,
}

impl PersistenceAdapter {
    pub fn new<S: Store + 'static>(store: S) -> Self {
        Self {
            store: Box::new(store),
            recover_singletons: true,
            write_recovered: true,
            persist_volatile: false,
        }
    }

    /// Whether a corrupt or missing singleton record is replaced by a fresh
    /// synthesized one on load
    pub fn with_singleton_recovery(mut self, enabled: bool) -> Self {
        self.recover_singletons = enabled;
        self
    }

    /// Whether a recovered singleton is written back to the store. When off,
    /// it only lives in the loaded record.
    pub fn with_recovery_writes(mut self, enabled: bool) -> Self {
        self.write_recovered = enabled;
        self
    }

    /// Whether `volatile` properties are written
    pub fn with_volatile(mut self, enabled: bool) -> Self {
        self.persist_volatile = enabled;
        self
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn contains(&self, id: &EntityId) -> Result<bool, PersistenceError> {
        Ok(self.store.get(id.as_str())?.is_some())
    }

    /// Writes `record` and every nested entity record found in it. Container
    /// entries that carry a record are written too; the parent keeps only
    /// their keys.
    pub fn persist(&self, schemas: &SchemaRegistry, record: &Value) -> Result<(), PersistenceError> {
        let Some(object) = record.as_object() else {
            return Err(PersistenceError::MissingId {
                record: record.to_string(),
            });
        };
        let Some(id) = object.get(ID_FIELD).and_then(Value::as_str) else {
            return Err(PersistenceError::MissingId {
                record: record.to_string(),
            });
        };
        let class_name = object
            .get(CLASS_NAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let simplified = schemas.simplified(class_name);

        let mut stored = Map::new();
        for (name, value) in object {
            let property = simplified.and_then(|schema| schema.property(name));
            if property.map(|p| p.volatile).unwrap_or(false) && !self.persist_volatile {
                continue;
            }
            let shape = property
                .map(|p| p.shape.clone())
                .unwrap_or(PropertyShape::Scalar);
            let value = match (&shape, value) {
                (PropertyShape::Entity { .. }, child) if is_record(child) => {
                    self.persist(schemas, child)?;
                    link(child)
                }
                (PropertyShape::Container { .. }, Value::Object(entries)) => {
                    let mut keys = Map::new();
                    for (key, entry) in entries {
                        if is_record(entry) {
                            self.persist(schemas, entry)?;
                        }
                        keys.insert(key.clone(), Value::Null);
                    }
                    Value::Object(keys)
                }
                (PropertyShape::List { item_class: Some(_) }, Value::Array(items)) => {
                    let mut links = Vec::with_capacity(items.len());
                    for item in items {
                        if is_record(item) {
                            self.persist(schemas, item)?;
                            links.push(link(item));
                        } else {
                            links.push(item.clone());
                        }
                    }
                    Value::Array(links)
                }
                (_, value) => value.clone(),
            };
            stored.insert(name.clone(), value);
        }

        let data = serde_json::to_vec(&Value::Object(stored)).map_err(|e| {
            PersistenceError::Encode {
                id: id.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.store.set(id, &data)?;
        debug!("Persisted {}", id);
        Ok(())
    }

    /// Writes the shallow form of a loaded entity
    pub fn persist_entity(
        &self,
        graph: &Graph,
        schemas: &SchemaRegistry,
        id: &EntityId,
    ) -> Result<(), PersistenceError> {
        match graph.to_shallow(id) {
            Some(record) => self.persist(schemas, &record),
            None => Ok(()),
        }
    }

    /// Brings storage in line with an applied change: records of detached
    /// subtrees are deleted, then the changed entity and every entity the
    /// change created are written.
    pub fn persist_change(
        &self,
        graph: &Graph,
        schemas: &SchemaRegistry,
        change: &Change,
        effects: &ChangeEffects,
    ) -> Result<(), PersistenceError> {
        if !self.persist_volatile && self.is_volatile(graph, schemas, change) {
            debug!("Not persisting volatile {}.{}", change.item(), change.property());
            return Ok(());
        }
        for root in &effects.detached {
            if !effects.created.contains(root) {
                self.delete(schemas, root)?;
            }
        }
        self.persist_entity(graph, schemas, change.item())?;
        for id in &effects.created {
            self.persist_entity(graph, schemas, id)?;
        }
        Ok(())
    }

    fn is_volatile(&self, graph: &Graph, schemas: &SchemaRegistry, change: &Change) -> bool {
        graph
            .get(change.item())
            .and_then(|entity| schemas.simplified(entity.class_name()))
            .map(|schema| schema.is_volatile(change.property()))
            .unwrap_or(false)
    }

    /// Reads the record of `id` with nested entity stubs resolved
    /// depth-first. Container entries stay `null`.
    ///
    /// A singleton whose record is missing from a parent link, or unparsable,
    /// is synthesized afresh when recovery is enabled, and written back unless
    /// recovery writes are off. A
    /// record that parses but fails validation is `PersistenceError::Invalid`
    /// and is left in place.
    pub fn load(
        &self,
        schemas: &SchemaRegistry,
        id: &EntityId,
    ) -> Result<Option<Value>, PersistenceError> {
        let mut visiting = HashSet::new();
        self.load_record(schemas, id, &mut visiting)
    }

    fn load_record(
        &self,
        schemas: &SchemaRegistry,
        id: &EntityId,
        visiting: &mut HashSet<EntityId>,
    ) -> Result<Option<Value>, PersistenceError> {
        let Some(data) = self.store.get(id.as_str())? else {
            return Ok(None);
        };
        if !visiting.insert(id.clone()) {
            return Err(PersistenceError::Corrupt {
                id: id.to_string(),
                reason: "record links back to itself".to_string(),
            });
        }
        let result = match self.expand(schemas, id, &data, visiting) {
            Ok(record) => Ok(Some(record)),
            Err(PersistenceError::Corrupt { id: corrupt, reason }) if corrupt == id.as_str() => {
                self.recover(schemas, id, reason).map(Some)
            }
            Err(error) => Err(error),
        };
        visiting.remove(id);
        result
    }

    fn expand(
        &self,
        schemas: &SchemaRegistry,
        id: &EntityId,
        data: &[u8],
        visiting: &mut HashSet<EntityId>,
    ) -> Result<Value, PersistenceError> {
        let corrupt = |reason: String| PersistenceError::Corrupt {
            id: id.to_string(),
            reason,
        };
        let invalid = |reason: String| PersistenceError::Invalid {
            id: id.to_string(),
            reason,
        };
        let record: Value =
            serde_json::from_slice(data).map_err(|e| corrupt(e.to_string()))?;
        let Value::Object(mut record) = record else {
            return Err(corrupt("record is not an object".to_string()));
        };
        if record.get(ID_FIELD).and_then(Value::as_str) != Some(id.as_str()) {
            return Err(invalid("record id does not match its key".to_string()));
        }
        let Some(class_name) = record
            .get(CLASS_NAME_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return Err(invalid("record has no className".to_string()));
        };
        let Some(simplified) = schemas.simplified(&class_name) else {
            return Err(invalid(format!("unknown class {}", class_name)));
        };

        for (name, property) in &simplified.properties {
            let Some(value) = record.get_mut(name) else {
                continue;
            };
            match &property.shape {
                PropertyShape::Entity { .. } => {
                    if let Some(child) = link_id(value) {
                        *value = self.resolve_link(schemas, id, name, &child, visiting)?;
                    }
                }
                PropertyShape::List { item_class: Some(_) } => {
                    if let Value::Array(items) = value {
                        for item in items.iter_mut() {
                            if let Some(child) = link_id(item) {
                                *item = self.resolve_link(schemas, id, name, &child, visiting)?;
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let mut checked = record.clone();
        schemas.fill_defaults(&class_name, &mut checked);
        let checked = Value::Object(checked);
        if let Err(errors) = schemas.validate(&class_name, &checked) {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(invalid(reasons.join("; ")));
        }
        Ok(Value::Object(record))
    }

    fn resolve_link(
        &self,
        schemas: &SchemaRegistry,
        parent: &EntityId,
        property: &str,
        child: &EntityId,
        visiting: &mut HashSet<EntityId>,
    ) -> Result<Value, PersistenceError> {
        if let Some(record) = self.load_record(schemas, child, visiting)? {
            return Ok(record);
        }
        if schemas.singleton_for(child).is_some() {
            return self.recover(
                schemas,
                child,
                format!("record linked from {}.{} is missing", parent, property),
            );
        }
        warn!("Record {} linked from {}.{} is missing", child, parent, property);
        Ok(Value::Null)
    }

    fn recover(
        &self,
        schemas: &SchemaRegistry,
        id: &EntityId,
        reason: String,
    ) -> Result<Value, PersistenceError> {
        let singleton = schemas.singleton_for(id).map(|fragment| fragment.class_name().to_string());
        let Some(class_name) = singleton.filter(|_| self.recover_singletons) else {
            return Err(PersistenceError::Corrupt {
                id: id.to_string(),
                reason,
            });
        };
        warn!("Record {} is unusable ({}), recreating it", id, reason);
        let record = schemas.synthesize(&class_name, Some(id.clone()), None, "")?;
        if self.write_recovered {
            self.persist(schemas, &record)?;
            info!("Recovered singleton {}", id);
        } else {
            info!("Recovered singleton {} without writing it", id);
        }
        Ok(record)
    }

    /// Removes the record of `id` and, through the stored records, those of
    /// every nested entity, container member and entity list member
    pub fn delete(&self, schemas: &SchemaRegistry, id: &EntityId) -> Result<(), PersistenceError> {
        let mut pending = vec![id.clone()];
        let mut seen = HashSet::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(data) = self.store.get(id.as_str())? else {
                continue;
            };
            if let Ok(Value::Object(record)) = serde_json::from_slice::<Value>(&data) {
                pending.extend(stored_children(schemas, &record));
            }
            self.store.remove(id.as_str())?;
            debug!("Deleted record {}", id);
        }
        Ok(())
    }
}

// A full entity record rather than a link stub
fn is_record(value: &Value) -> bool {
    value.get(CLASS_NAME_FIELD).is_some()
}

fn link(record: &Value) -> Value {
    match record.get(ID_FIELD).and_then(Value::as_str) {
        Some(id) => stub(&EntityId::new(id)),
        None => Value::Null,
    }
}

fn link_id(value: &Value) -> Option<EntityId> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.get(ID_FIELD).and_then(Value::as_str).map(EntityId::new)
}

fn stored_children(schemas: &SchemaRegistry, record: &Map<String, Value>) -> Vec<EntityId> {
    let class_name = record
        .get(CLASS_NAME_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Some(simplified) = schemas.simplified(class_name) else {
        return Vec::new();
    };
    let mut children = Vec::new();
    for (name, property) in &simplified.properties {
        let Some(value) = record.get(name) else {
            continue;
        };
        match (&property.shape, value) {
            (PropertyShape::Entity { .. }, value) => children.extend(link_id(value)),
            (PropertyShape::Container { .. }, Value::Object(entries)) => {
                children.extend(entries.keys().map(EntityId::new))
            }
            (PropertyShape::List { item_class: Some(_) }, Value::Array(items)) => {
                children.extend(items.iter().filter_map(link_id))
            }
            _ => {}
        }
    }
    children
}
