use std::collections::{HashMap, HashSet};

use log::debug;
use serde_json::{Map, Value};

use crate::{
    constants::{
        is_header_field, CLASS_NAME_FIELD, ID_FIELD, NAME_FIELD, PARENT_ID_FIELD,
        PARENT_PROPERTY_FIELD,
    },
    Container, DefaultBuilder, Entity, EntityBuilder, EntityError, EntityId, List, ListItem,
    Property, PropertyShape, SchemaRegistry, Slot,
};

struct RegisteredBuilder {
    builder: Box<dyn EntityBuilder>,
    // assigned automatically for a schema-only class, replaceable
    implicit: bool,
}

/// Turns plain records into Entities.
///
/// Holds the builder registered for each class tag and the set of ids that
/// are live in this process.
#[derive(Default)]
pub struct EntityFactory {
    builders: HashMap<String, RegisteredBuilder>,
    live: HashSet<EntityId>,
}

impl EntityFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `builder` for `class_name`. Registering the same builder type
    /// again is a no-op; a different type is an error.
    pub fn register<B: EntityBuilder>(
        &mut self,
        class_name: &str,
        builder: B,
    ) -> Result<(), EntityError> {
        if let Some(existing) = self.builders.get(class_name) {
            if existing.builder.builder_type() == builder.builder_type() {
                return Ok(());
            }
            if !existing.implicit {
                return Err(EntityError::BuilderConflict {
                    class_name: class_name.to_string(),
                });
            }
        }
        self.builders.insert(
            class_name.to_string(),
            RegisteredBuilder {
                builder: Box::new(builder),
                implicit: false,
            },
        );
        Ok(())
    }

    /// Assigns the `DefaultBuilder` to a class that has no builder yet
    pub fn register_default(&mut self, class_name: &str) {
        if self.builders.contains_key(class_name) {
            return;
        }
        debug!("Default builder assigned to {}", class_name);
        self.builders.insert(
            class_name.to_string(),
            RegisteredBuilder {
                builder: Box::new(DefaultBuilder),
                implicit: true,
            },
        );
    }

    pub fn has_builder(&self, class_name: &str) -> bool {
        self.builders.contains_key(class_name)
    }

    pub fn is_live(&self, id: &EntityId) -> bool {
        self.live.contains(id)
    }

    /// Frees the ids of destroyed entities so they may be constructed again
    pub fn release<'a, I: IntoIterator<Item = &'a EntityId>>(&mut self, ids: I) {
        for id in ids {
            self.live.remove(id);
        }
    }

    /// Constructs the Entity described by `record` together with every nested
    /// entity record it carries. The returned entities are parent-first.
    ///
    /// Nothing is constructed and no id is reserved unless the whole record
    /// tree passes validation.
    pub fn create(
        &mut self,
        schemas: &SchemaRegistry,
        record: Value,
    ) -> Result<Vec<Entity>, EntityError> {
        self.construct(schemas, record, None, None, &|_| false)
    }

    /// Like `create`, for a record whose nested entities may already be held
    /// by the caller. Those for which `held` is true are linked from their
    /// parent as they are and not built again.
    pub fn create_around(
        &mut self,
        schemas: &SchemaRegistry,
        record: Value,
        held: &dyn Fn(&EntityId) -> bool,
    ) -> Result<Vec<Entity>, EntityError> {
        self.construct(schemas, record, None, None, held)
    }

    /// Like `create`, for a record that lives in `parent_property` of
    /// `parent_id`, optionally under a container `key`
    pub fn create_child(
        &mut self,
        schemas: &SchemaRegistry,
        record: Value,
        parent_id: &EntityId,
        parent_property: &str,
        key: Option<&EntityId>,
    ) -> Result<Vec<Entity>, EntityError> {
        self.construct(schemas, record, Some((parent_id, parent_property)), key, &|_| false)
    }

    pub(crate) fn reserve<I: IntoIterator<Item = EntityId>>(&mut self, ids: I) {
        self.live.extend(ids);
    }

    fn construct(
        &mut self,
        schemas: &SchemaRegistry,
        record: Value,
        parent: Option<(&EntityId, &str)>,
        key: Option<&EntityId>,
        held: &dyn Fn(&EntityId) -> bool,
    ) -> Result<Vec<Entity>, EntityError> {
        let mut record = record;
        let mut ids = Vec::new();
        self.prepare(schemas, &mut record, parent, key, &mut ids)?;

        let mut seen = HashSet::new();
        for (index, id) in ids.iter().enumerate() {
            let taken = self.live.contains(id) && (index == 0 || !held(id));
            if taken || !seen.insert(id.clone()) {
                return Err(EntityError::DuplicateId { id: id.to_string() });
            }
        }

        let Value::Object(map) = &record else {
            return Err(malformed(&record, "record is not an object"));
        };
        let id = record_id(map);
        let class_name = record_class(map)?;
        if let Err(errors) = schemas.validate(class_name, &record) {
            return Err(EntityError::Validation {
                id,
                class_name: class_name.to_string(),
                errors,
            });
        }

        let mut output = Vec::new();
        self.build(schemas, map, held, &mut output)?;

        self.live.extend(ids);
        debug!("Created {} entities from record {}", output.len(), id);

        Ok(output)
    }

    // Fills parent links, ids and defaults throughout the record tree and
    // collects the ids it will construct
    fn prepare(
        &self,
        schemas: &SchemaRegistry,
        record: &mut Value,
        parent: Option<(&EntityId, &str)>,
        key: Option<&EntityId>,
        ids: &mut Vec<EntityId>,
    ) -> Result<(), EntityError> {
        let Value::Object(map) = record else {
            return Err(malformed(record, "record is not an object"));
        };
        let class_name = record_class(map)?.to_string();
        if !self.builders.contains_key(&class_name) || !schemas.contains(&class_name) {
            return Err(EntityError::UnknownClass { class_name });
        }

        let id = match (map.get(ID_FIELD).and_then(Value::as_str), key) {
            (Some(id), Some(key)) if id != key.as_str() => {
                return Err(EntityError::MalformedRecord {
                    id: id.to_string(),
                    reason: format!("stored under container key {}", key),
                });
            }
            (Some(id), _) => EntityId::new(id),
            (None, Some(key)) => key.clone(),
            (None, None) => match schemas.singleton(&class_name) {
                Some(_) => EntityId::new(class_name.as_str()),
                None => EntityId::generate(&class_name),
            },
        };
        map.insert(ID_FIELD.to_string(), Value::String(id.to_string()));

        match parent {
            Some((parent_id, parent_property)) => {
                map.insert(PARENT_ID_FIELD.to_string(), Value::String(parent_id.to_string()));
                map.insert(
                    PARENT_PROPERTY_FIELD.to_string(),
                    Value::String(parent_property.to_string()),
                );
            }
            None => {
                if !map.contains_key(PARENT_ID_FIELD) {
                    if let Some(singleton) = schemas.singleton(&class_name) {
                        let parent_id = if singleton.parent_property.is_empty() {
                            id.clone()
                        } else {
                            singleton.parent_id.clone()
                        };
                        map.insert(PARENT_ID_FIELD.to_string(), Value::String(parent_id.to_string()));
                        map.insert(
                            PARENT_PROPERTY_FIELD.to_string(),
                            Value::String(singleton.parent_property.clone()),
                        );
                    }
                }
            }
        }

        schemas.fill_defaults(&class_name, map);
        ids.push(id.clone());

        let Some(simplified) = schemas.simplified(&class_name) else {
            return Err(EntityError::UnknownClass { class_name });
        };
        for property in simplified.properties.values() {
            let Some(value) = map.get_mut(&property.name) else {
                continue;
            };
            match (&property.shape, value) {
                (PropertyShape::Entity { .. }, child) if child.is_object() => {
                    self.prepare(schemas, child, Some((&id, &property.name)), None, ids)?;
                }
                (PropertyShape::Container { .. }, Value::Object(entries)) => {
                    for (entry_key, child) in entries.iter_mut() {
                        if child.is_object() {
                            let entry_key = EntityId::new(entry_key.as_str());
                            self.prepare(
                                schemas,
                                child,
                                Some((&id, &property.name)),
                                Some(&entry_key),
                                ids,
                            )?;
                        }
                    }
                }
                (PropertyShape::List { item_class: Some(_) }, Value::Array(items)) => {
                    for child in items.iter_mut().filter(|item| item.is_object()) {
                        self.prepare(schemas, child, Some((&id, &property.name)), None, ids)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn build(
        &self,
        schemas: &SchemaRegistry,
        record: &Map<String, Value>,
        held: &dyn Fn(&EntityId) -> bool,
        output: &mut Vec<Entity>,
    ) -> Result<(), EntityError> {
        let class_name = record_class(record)?;
        let Some(simplified) = schemas.simplified(class_name) else {
            return Err(EntityError::UnknownClass {
                class_name: class_name.to_string(),
            });
        };
        let Some(registered) = self.builders.get(class_name) else {
            return Err(EntityError::UnknownClass {
                class_name: class_name.to_string(),
            });
        };

        let mut entity = Entity::new(
            EntityId::new(record_id(record)),
            EntityId::new(string_field(record, PARENT_ID_FIELD)),
            string_field(record, PARENT_PROPERTY_FIELD),
            class_name.to_string(),
            string_field(record, NAME_FIELD),
        );
        let mut children: Vec<&Map<String, Value>> = Vec::new();

        for (name, value) in record {
            if is_header_field(name) {
                continue;
            }
            let shape = simplified
                .shape(name)
                .cloned()
                .unwrap_or(PropertyShape::Scalar);
            let property = match (shape, value) {
                (PropertyShape::Entity { .. }, Value::Null) => Property::Entity(None),
                (PropertyShape::Entity { .. }, Value::Object(child)) => {
                    children.push(child);
                    Property::Entity(Some(EntityId::new(record_id(child))))
                }
                (PropertyShape::Container { .. }, Value::Object(entries)) => {
                    let mut container = Container::new();
                    for (key, child) in entries {
                        match child {
                            Value::Object(child) => {
                                children.push(child);
                                container.insert(EntityId::new(key.as_str()), Slot::Loaded);
                            }
                            _ => {
                                container.insert(EntityId::new(key.as_str()), Slot::Unloaded);
                            }
                        }
                    }
                    Property::Container(container)
                }
                (PropertyShape::List { item_class }, Value::Array(items)) => {
                    let mut list = List::new();
                    for item in items {
                        match (&item_class, item) {
                            (Some(_), Value::Object(child)) => {
                                children.push(child);
                                list.push(ListItem::Entity(EntityId::new(record_id(child))));
                            }
                            _ => list.push(ListItem::Value(item.clone())),
                        }
                    }
                    Property::List(list)
                }
                (_, value) => Property::Value(value.clone()),
            };
            entity.insert_property(name, property);
        }

        output.push(registered.builder.build(entity, record)?);

        for child in children {
            if held(&EntityId::new(record_id(child))) {
                continue;
            }
            self.build(schemas, child, held, output)?;
        }

        Ok(())
    }
}

fn record_class(record: &Map<String, Value>) -> Result<&str, EntityError> {
    record
        .get(CLASS_NAME_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| EntityError::MissingClassName {
            record: Value::Object(record.clone()).to_string(),
        })
}

fn record_id(record: &Map<String, Value>) -> String {
    string_field(record, ID_FIELD)
}

fn string_field(record: &Map<String, Value>, field: &str) -> String {
    record
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn malformed(record: &Value, reason: &str) -> EntityError {
    EntityError::MalformedRecord {
        id: record
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Renaming;

    impl EntityBuilder for Renaming {
        fn build(&self, mut entity: Entity, _record: &Map<String, Value>) -> Result<Entity, EntityError> {
            entity.set_name("built".to_string());
            Ok(entity)
        }
    }

    fn setup() -> (SchemaRegistry, EntityFactory) {
        let schemas = SchemaRegistry::with_core_model();
        let mut factory = EntityFactory::new();
        for class_name in schemas.class_names() {
            factory.register_default(class_name);
        }
        (schemas, factory)
    }

    fn display(id: &str) -> Value {
        json!({
            "id": id, "parentId": "Screen", "parentProperty": "displays", "className": "Display",
            "x": 0, "y": 0, "width": 1920, "height": 1080,
            "browsers": {
                "Browser-1": { "className": "Browser", "x": 0.25 },
                "Browser-2": null
            }
        })
    }

    #[test]
    fn builds_parent_first_with_container_slots() {
        let (schemas, mut factory) = setup();
        let entities = factory.create(&schemas, display("Display-1")).unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].id(), "Display-1");
        assert_eq!(entities[1].id(), "Browser-1");
        assert_eq!(entities[1].parent_id(), "Display-1");
        assert_eq!(entities[1].parent_property(), "browsers");
        assert_eq!(entities[1].value("width"), Some(&json!(1)));

        let browsers = entities[0].container("browsers").unwrap();
        assert_eq!(browsers.slot(&EntityId::new("Browser-1")), Some(Slot::Loaded));
        assert_eq!(browsers.slot(&EntityId::new("Browser-2")), Some(Slot::Unloaded));
    }

    #[test]
    fn rejects_live_ids_without_reserving() {
        let (schemas, mut factory) = setup();
        factory.create(&schemas, display("Display-1")).unwrap();

        let result = factory.create(&schemas, display("Display-1"));
        assert_eq!(
            result.unwrap_err(),
            EntityError::DuplicateId {
                id: "Display-1".to_string()
            }
        );

        factory.release([&EntityId::new("Display-1"), &EntityId::new("Browser-1")]);
        assert!(factory.create(&schemas, display("Display-1")).is_ok());
    }

    #[test]
    fn held_children_are_linked_not_rebuilt() {
        let (schemas, mut factory) = setup();
        factory.create(&schemas, display("Display-1")).unwrap();
        let held = EntityId::new("Browser-1");

        let mut record = display("Display-1");
        record["id"] = json!("Display-2");
        let entities = factory
            .create_around(&schemas, record, &|id| *id == held)
            .unwrap();

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id(), "Display-2");
        let browsers = entities[0].container("browsers").unwrap();
        assert_eq!(browsers.slot(&held), Some(Slot::Loaded));
    }

    #[test]
    fn failed_validation_reserves_nothing() {
        let (schemas, mut factory) = setup();
        let mut record = display("Display-1");
        record["browsers"]["Browser-1"]["x"] = json!(-1);

        let error = factory.create(&schemas, record).unwrap_err();
        let EntityError::Validation { errors, .. } = error else {
            panic!("expected a validation error");
        };
        assert_eq!(errors[0].path, "/browsers/Browser-1/x");
        assert!(!factory.is_live(&EntityId::new("Display-1")));
        assert!(!factory.is_live(&EntityId::new("Browser-1")));
    }

    #[test]
    fn unknown_class_is_named() {
        let (schemas, mut factory) = setup();
        let result = factory.create(&schemas, json!({ "id": "X-1", "className": "Teapot" }));
        assert_eq!(
            result.unwrap_err(),
            EntityError::UnknownClass {
                class_name: "Teapot".to_string()
            }
        );
    }

    #[test]
    fn builder_registration_compares_types() {
        let (schemas, mut factory) = setup();
        factory.register("Display", Renaming).unwrap();
        factory.register("Display", Renaming).unwrap();
        assert_eq!(
            factory.register("Display", DefaultBuilder),
            Err(EntityError::BuilderConflict {
                class_name: "Display".to_string()
            })
        );

        let entities = factory.create(&schemas, display("Display-9")).unwrap();
        assert_eq!(entities[0].name(), "built");
    }
}
