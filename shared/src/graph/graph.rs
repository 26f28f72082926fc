use std::collections::{hash_map, HashMap, HashSet, VecDeque};

use log::debug;
use serde_json::{Map, Value};

use crate::{
    constants::{
        is_header_field, CLASS_NAME_FIELD, ID_FIELD, NAME_FIELD, PARENT_ID_FIELD,
        PARENT_PROPERTY_FIELD,
    },
    Change, Container, ContainerChange, ContainerChangeType, Entity, EntityError, EntityId,
    GraphContext, ItemChange, ItemChangeType, List, ListChange, ListChangeType, ListItem,
    Property, PropertyShape, Slot, SyncError, ValidationError,
};

/// What applying a change did to the instance table
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChangeEffects {
    /// Entities constructed by the change, parent-first
    pub created: Vec<EntityId>,
    /// Entities dropped from the instance table
    pub removed: Vec<EntityId>,
    /// Roots of the subtrees the change cut off, loaded or not
    pub detached: Vec<EntityId>,
}

/// The process-local instance table: every Entity currently loaded, by id
#[derive(Clone, Debug, Default)]
pub struct Graph {
    entities: HashMap<EntityId, Entity>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn try_get(&self, id: &EntityId) -> Result<&Entity, EntityError> {
        self.entities
            .get(id)
            .ok_or_else(|| EntityError::EntityNotFound { id: id.to_string() })
    }

    fn try_get_mut(&mut self, id: &EntityId) -> Result<&mut Entity, EntityError> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| EntityError::EntityNotFound { id: id.to_string() })
    }

    pub fn iter(&self) -> hash_map::Iter<'_, EntityId, Entity> {
        self.entities.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.keys()
    }

    pub(crate) fn clear(&mut self) {
        self.entities.clear();
    }

    /// Every child key of `id` (nested entities, entity list elements and
    /// container keys whether loaded or not) with the number of levels the
    /// edge crosses. A nested entity is part of its parent's record and
    /// crosses none.
    pub fn child_levels(&self, id: &EntityId) -> Vec<(EntityId, usize)> {
        self.entities.get(id).map(child_levels).unwrap_or_default()
    }

    /// Inserts freshly constructed entities, skipping ids already present.
    /// A child that fills a container key of a loaded parent marks that key
    /// as loaded.
    pub(crate) fn admit(&mut self, entities: Vec<Entity>) -> Vec<EntityId> {
        let mut admitted = Vec::new();
        for entity in entities {
            let id = entity.id().clone();
            if self.entities.contains_key(&id) {
                debug!("Entity {} already registered", id);
                continue;
            }
            let parent_id = entity.parent_id().clone();
            let parent_property = entity.parent_property().to_string();
            let mut entity = entity;
            for (_, container) in entity.containers_mut() {
                let held: Vec<EntityId> = container
                    .keys()
                    .filter(|key| self.entities.contains_key(*key))
                    .cloned()
                    .collect();
                for key in &held {
                    container.mark_loaded(key);
                }
            }
            self.entities.insert(id.clone(), entity);
            if parent_id != id {
                if let Some(container) = self
                    .entities
                    .get_mut(&parent_id)
                    .and_then(|parent| parent.container_mut(&parent_property))
                {
                    container.mark_loaded(&id);
                }
            }
            admitted.push(id);
        }
        admitted
    }

    /// The parent of `id`, `None` for the root or an unloaded parent
    pub fn parent(&self, id: &EntityId) -> Option<&Entity> {
        let entity = self.entities.get(id)?;
        if entity.is_root() {
            return None;
        }
        self.entities.get(entity.parent_id())
    }

    /// Loaded ancestors of `id`, nearest first
    pub fn ancestors(&self, id: &EntityId) -> Vec<EntityId> {
        let mut output = Vec::new();
        let mut current = id.clone();
        while let Some(parent) = self.parent(&current) {
            if parent.id() == id || output.contains(parent.id()) {
                break;
            }
            output.push(parent.id().clone());
            current = parent.id().clone();
        }
        output
    }

    /// Loaded ancestors of `id`, nearest first, each with the number of
    /// levels between it and `id`
    pub fn ancestor_levels(&self, id: &EntityId) -> Vec<(EntityId, usize)> {
        let mut output = Vec::new();
        let mut levels = 0;
        let mut current = id.clone();
        while let Some(parent) = self.parent(&current) {
            if parent.id() == id || output.iter().any(|(seen, _)| seen == parent.id()) {
                break;
            }
            let nested = self
                .entities
                .get(&current)
                .and_then(|entity| parent.property(entity.parent_property()))
                .map(|property| matches!(property, Property::Entity(_)))
                .unwrap_or(false);
            if !nested {
                levels += 1;
            }
            output.push((parent.id().clone(), levels));
            current = parent.id().clone();
        }
        output
    }

    /// Every loaded descendant of `id` within `depth` levels, with its level.
    /// A negative depth is unlimited.
    pub fn descendants(&self, id: &EntityId, depth: i32) -> Vec<(EntityId, usize)> {
        let mut output = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id.clone());
        let mut queue = VecDeque::new();
        queue.push_back((id.clone(), 0usize));
        while let Some((next, levels)) = queue.pop_front() {
            for (child, crossed) in self.child_levels(&next) {
                let child_levels = levels + crossed;
                if depth >= 0 && child_levels > depth as usize {
                    continue;
                }
                if self.entities.contains_key(&child) && seen.insert(child.clone()) {
                    output.push((child.clone(), child_levels));
                    if crossed == 0 {
                        queue.push_front((child, child_levels));
                    } else {
                        queue.push_back((child, child_levels));
                    }
                }
            }
        }
        output
    }

    /// `id` followed by every loaded descendant, parents before children
    pub fn subtree(&self, id: &EntityId) -> Vec<EntityId> {
        let mut output = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            let Some(entity) = self.entities.get(&next) else {
                continue;
            };
            stack.extend(entity.child_ids().into_iter().rev());
            output.push(next);
        }
        output
    }

    /// True when `id` is loaded and every child key within `depth` container
    /// levels is loaded too. Depth `0` is the entity with its nested
    /// entities, `-1` its whole subtree.
    pub fn satisfies(&self, id: &EntityId, depth: i32) -> bool {
        let Some(entity) = self.entities.get(id) else {
            return false;
        };
        child_levels(entity).iter().all(|(child, crossed)| {
            if child == id {
                return false;
            }
            match (*crossed, depth) {
                (0, _) => self.satisfies(child, depth),
                (_, 0) => true,
                (_, depth) if depth < 0 => self.satisfies(child, depth),
                (_, depth) => self.satisfies(child, depth - 1),
            }
        })
    }

    // Projections

    /// Shallow form of `id`: header fields and properties, nested entities
    /// inline in shallow form, containers as `{key: null}`
    pub fn to_shallow(&self, id: &EntityId) -> Option<Value> {
        let entity = self.entities.get(id)?;
        let mut record = header(entity);
        for (name, property) in entity.properties() {
            record.insert(name.clone(), self.shallow_property(property));
        }
        Some(Value::Object(record))
    }

    /// Plain form of the loaded subtree of `id`: loaded container entries
    /// inline, unloaded ones `null`
    pub fn to_plain(&self, id: &EntityId) -> Option<Value> {
        let entity = self.entities.get(id)?;
        let mut record = header(entity);
        for (name, property) in entity.properties() {
            let value = match property {
                Property::Value(value) => value.clone(),
                Property::Entity(None) => Value::Null,
                Property::Entity(Some(child)) => self.plain_or_stub(child),
                Property::Container(container) => Value::Object(
                    container
                        .iter()
                        .map(|(key, slot)| {
                            let value = match slot {
                                Slot::Loaded => self.plain_or_stub(key),
                                Slot::Unloaded => Value::Null,
                            };
                            (key.to_string(), value)
                        })
                        .collect(),
                ),
                Property::List(list) => Value::Array(
                    list.iter()
                        .map(|item| match item {
                            ListItem::Value(value) => value.clone(),
                            ListItem::Entity(child) => self.plain_or_stub(child),
                        })
                        .collect(),
                ),
            };
            record.insert(name.clone(), value);
        }
        Some(Value::Object(record))
    }

    fn shallow_property(&self, property: &Property) -> Value {
        match property {
            Property::Value(value) => value.clone(),
            Property::Entity(None) => Value::Null,
            Property::Entity(Some(child)) => self.shallow_or_stub(child),
            Property::Container(container) => Value::Object(
                container
                    .keys()
                    .map(|key| (key.to_string(), Value::Null))
                    .collect(),
            ),
            Property::List(list) => Value::Array(
                list.iter()
                    .map(|item| match item {
                        ListItem::Value(value) => value.clone(),
                        ListItem::Entity(child) => self.shallow_or_stub(child),
                    })
                    .collect(),
            ),
        }
    }

    fn shallow_or_stub(&self, id: &EntityId) -> Value {
        self.to_shallow(id).unwrap_or_else(|| stub(id))
    }

    fn plain_or_stub(&self, id: &EntityId) -> Value {
        self.to_plain(id).unwrap_or_else(|| stub(id))
    }

    /// Shallow value of a property, including the writable `name` header
    pub fn property_value(&self, id: &EntityId, name: &str) -> Option<Value> {
        let entity = self.entities.get(id)?;
        if name == NAME_FIELD {
            return Some(Value::String(entity.name().to_string()));
        }
        entity
            .property(name)
            .map(|property| self.shallow_property(property))
    }

    /// Shallow value of a container entry: a record, or `null` when unloaded
    pub fn container_entry_value(
        &self,
        id: &EntityId,
        container: &str,
        key: &EntityId,
    ) -> Option<Value> {
        match self.entities.get(id)?.container(container)?.slot(key)? {
            Slot::Loaded => Some(self.shallow_or_stub(key)),
            Slot::Unloaded => Some(Value::Null),
        }
    }

    /// Current shallow value of the slot `change` writes to. Lists are
    /// compared as a whole.
    pub fn key_value(&self, change: &Change) -> Option<Value> {
        match change {
            Change::Item(change) => self.property_value(&change.item, &change.name),
            Change::Container(change) => {
                self.container_entry_value(&change.item, &change.container, &change.key)
            }
            Change::List(change) => self.property_value(&change.item, &change.list),
        }
    }

    /// Copy of an applied `change` whose values are the shallow forms now
    /// held by the graph
    pub fn shallow_change(&self, change: &Change) -> Change {
        let mut output = change.clone();
        match &mut output {
            Change::Item(item) => {
                if item.kind != ItemChangeType::Remove {
                    item.new_value = self.property_value(&item.item, &item.name);
                }
            }
            Change::Container(container) => {
                if container.kind != ContainerChangeType::Delete {
                    container.new_value = self
                        .container_entry_value(&container.item, &container.container, &container.key)
                        .filter(|value| !value.is_null());
                }
            }
            Change::List(list) => {
                let current = self.property_value(&list.item, &list.list);
                let items = current.as_ref().and_then(Value::as_array);
                match list.kind {
                    ListChangeType::Update => {
                        list.new_value = items.and_then(|items| items.get(list.index)).cloned();
                    }
                    ListChangeType::Splice => {
                        let count = list.added.as_ref().map(Vec::len).unwrap_or(0);
                        list.added = items.map(|items| {
                            items.iter().skip(list.index).take(count).cloned().collect()
                        });
                    }
                }
            }
        }
        output
    }

    // Mutation

    /// Applies `change`, constructing new children through the factory.
    ///
    /// A failed construction leaves the graph and the live-id registry as
    /// they were.
    pub fn apply(
        &mut self,
        ctx: &mut GraphContext,
        change: &Change,
    ) -> Result<ChangeEffects, SyncError> {
        let mut effects = ChangeEffects::default();
        match change {
            Change::Item(change) => self.apply_item(ctx, change, &mut effects)?,
            Change::Container(change) => self.apply_container(ctx, change, &mut effects)?,
            Change::List(change) => self.apply_list(ctx, change, &mut effects)?,
        }
        Ok(effects)
    }

    /// Removes `id` and its loaded subtree, returning the removed ids
    pub(crate) fn remove_subtree(&mut self, id: &EntityId) -> Vec<EntityId> {
        let ids = self.subtree(id);
        for id in &ids {
            self.entities.remove(id);
        }
        ids
    }

    fn apply_item(
        &mut self,
        ctx: &mut GraphContext,
        change: &ItemChange,
        effects: &mut ChangeEffects,
    ) -> Result<(), SyncError> {
        let entity = self.try_get(&change.item)?;
        let class_name = entity.class_name().to_string();

        if is_header_field(&change.name) {
            if change.name != NAME_FIELD || change.kind == ItemChangeType::Remove {
                return Err(SyncError::ImmutableField {
                    id: change.item.to_string(),
                    field: change.name.clone(),
                });
            }
            let Some(name) = change.new_value.as_ref().and_then(Value::as_str) else {
                return Err(mismatch(&change.item, &class_name, &change.name, "string").into());
            };
            self.try_get_mut(&change.item)?.set_name(name.to_string());
            return Ok(());
        }

        let shape = ctx
            .schemas
            .simplified(&class_name)
            .and_then(|schema| schema.shape(&change.name))
            .cloned()
            .unwrap_or(PropertyShape::Scalar);
        let old_roots = entity
            .property(&change.name)
            .map(property_children)
            .unwrap_or_default();

        match change.kind {
            ItemChangeType::Remove => {
                self.replace(ctx, old_roots, effects, |_, _| Ok(()))?;
                self.try_get_mut(&change.item)?.remove_property(&change.name);
            }
            ItemChangeType::Add | ItemChangeType::Update => {
                let value = change.new_value.clone().unwrap_or(Value::Null);
                let property = self.replace(ctx, old_roots, effects, |ctx, staged| {
                    build_property(ctx, &change.item, &class_name, &change.name, &shape, value, staged)
                })?;
                self.try_get_mut(&change.item)?
                    .insert_property(&change.name, property);
            }
        }
        Ok(())
    }

    fn apply_container(
        &mut self,
        ctx: &mut GraphContext,
        change: &ContainerChange,
        effects: &mut ChangeEffects,
    ) -> Result<(), SyncError> {
        let entity = self.try_get(&change.item)?;
        let class_name = entity.class_name().to_string();
        let entry_class = match ctx
            .schemas
            .simplified(&class_name)
            .and_then(|schema| schema.shape(&change.container))
        {
            Some(PropertyShape::Container { class_name }) => class_name.clone(),
            _ => {
                return Err(EntityError::WrongPropertyKind {
                    id: change.item.to_string(),
                    property: change.container.clone(),
                    expected: "container",
                    actual: entity
                        .property(&change.container)
                        .map(Property::kind_name)
                        .unwrap_or("missing property"),
                }
                .into());
            }
        };
        let present = entity
            .container(&change.container)
            .map(|container| container.contains(&change.key))
            .unwrap_or(false);

        match change.kind {
            ContainerChangeType::Delete => {
                if !present {
                    return Err(EntityError::ContainerKeyNotFound {
                        id: change.item.to_string(),
                        container: change.container.clone(),
                        key: change.key.to_string(),
                    }
                    .into());
                }
                self.replace(ctx, vec![change.key.clone()], effects, |_, _| Ok(()))?;
                if let Some(container) = self
                    .try_get_mut(&change.item)?
                    .container_mut(&change.container)
                {
                    container.remove(&change.key);
                }
            }
            ContainerChangeType::Add | ContainerChangeType::Update => {
                let old_roots = if present {
                    vec![change.key.clone()]
                } else {
                    Vec::new()
                };
                let record = change.new_value.clone().filter(Value::is_object);
                let slot = self.replace(ctx, old_roots, effects, |ctx, staged| match record {
                    Some(record) => stage_child(
                        ctx,
                        &change.item,
                        &change.container,
                        Some(&change.key),
                        record,
                        &entry_class,
                        staged,
                    )
                    .map(|_| Slot::Loaded),
                    None => Ok(Slot::Unloaded),
                })?;
                let entity = self.try_get_mut(&change.item)?;
                if entity.container(&change.container).is_none() {
                    entity.insert_property(&change.container, Property::Container(Container::new()));
                }
                if let Some(container) = entity.container_mut(&change.container) {
                    container.insert(change.key.clone(), slot);
                }
            }
        }
        Ok(())
    }

    fn apply_list(
        &mut self,
        ctx: &mut GraphContext,
        change: &ListChange,
        effects: &mut ChangeEffects,
    ) -> Result<(), SyncError> {
        let entity = self.try_get(&change.item)?;
        let class_name = entity.class_name().to_string();
        let item_class = match ctx
            .schemas
            .simplified(&class_name)
            .and_then(|schema| schema.shape(&change.list))
        {
            Some(PropertyShape::List { item_class }) => item_class.clone(),
            _ => {
                return Err(EntityError::WrongPropertyKind {
                    id: change.item.to_string(),
                    property: change.list.clone(),
                    expected: "list",
                    actual: entity
                        .property(&change.list)
                        .map(Property::kind_name)
                        .unwrap_or("missing property"),
                }
                .into());
            }
        };
        let current: Vec<ListItem> = entity
            .list(&change.list)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default();
        let len = current.len();

        match change.kind {
            ListChangeType::Update => {
                let Some(old) = current.get(change.index) else {
                    return Err(EntityError::ListIndexOutOfBounds {
                        index: change.index,
                        len,
                    }
                    .into());
                };
                let old_roots = old.entity_id().cloned().into_iter().collect();
                let value = change.new_value.clone().unwrap_or(Value::Null);
                let item = self.replace(ctx, old_roots, effects, |ctx, staged| {
                    build_list_item(ctx, &change.item, &change.list, &item_class, value, staged)
                })?;
                if let Some(list) = self.try_get_mut(&change.item)?.list_mut(&change.list) {
                    list.update(change.index, item)?;
                }
            }
            ListChangeType::Splice => {
                if change.index > len {
                    return Err(EntityError::ListIndexOutOfBounds {
                        index: change.index,
                        len,
                    }
                    .into());
                }
                let removed_count = change.removed_count.unwrap_or(0).min(len - change.index);
                let old_roots = current[change.index..change.index + removed_count]
                    .iter()
                    .filter_map(ListItem::entity_id)
                    .cloned()
                    .collect();
                let added = change.added.clone().unwrap_or_default();
                let items = self.replace(ctx, old_roots, effects, |ctx, staged| {
                    added
                        .into_iter()
                        .map(|value| {
                            build_list_item(ctx, &change.item, &change.list, &item_class, value, staged)
                        })
                        .collect::<Result<Vec<_>, _>>()
                })?;
                let entity = self.try_get_mut(&change.item)?;
                if entity.list(&change.list).is_none() {
                    entity.insert_property(&change.list, Property::List(List::new()));
                }
                if let Some(list) = entity.list_mut(&change.list) {
                    list.splice(change.index, removed_count, items)?;
                }
            }
        }
        Ok(())
    }

    // Swaps the subtrees under `old_roots` for whatever `build` constructs.
    // Old ids are released first so a replacement may reuse them; on failure
    // they are reserved again and nothing in the table changes.
    fn replace<T, F>(
        &mut self,
        ctx: &mut GraphContext,
        old_roots: Vec<EntityId>,
        effects: &mut ChangeEffects,
        build: F,
    ) -> Result<T, SyncError>
    where
        F: FnOnce(&mut GraphContext, &mut Vec<Entity>) -> Result<T, SyncError>,
    {
        let old_ids: Vec<EntityId> = old_roots.iter().flat_map(|root| self.subtree(root)).collect();
        ctx.factory.release(&old_ids);

        let mut staged = Vec::new();
        match build(ctx, &mut staged) {
            Ok(result) => {
                for id in &old_ids {
                    self.entities.remove(id);
                }
                effects.removed.extend(old_ids);
                effects.detached.extend(old_roots);
                effects
                    .created
                    .extend(staged.iter().map(|entity| entity.id().clone()));
                self.admit(staged);
                Ok(result)
            }
            Err(error) => {
                ctx.factory.release(staged.iter().map(Entity::id));
                ctx.factory.reserve(old_ids);
                Err(error)
            }
        }
    }
}

fn header(entity: &Entity) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert(ID_FIELD.to_string(), Value::String(entity.id().to_string()));
    record.insert(
        PARENT_ID_FIELD.to_string(),
        Value::String(entity.parent_id().to_string()),
    );
    record.insert(
        PARENT_PROPERTY_FIELD.to_string(),
        Value::String(entity.parent_property().to_string()),
    );
    record.insert(
        CLASS_NAME_FIELD.to_string(),
        Value::String(entity.class_name().to_string()),
    );
    record.insert(NAME_FIELD.to_string(), Value::String(entity.name().to_string()));
    record
}

/// A `{id}` link to an entity stored elsewhere
pub fn stub(id: &EntityId) -> Value {
    let mut record = Map::new();
    record.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    Value::Object(record)
}

// every child key of an entity, container keys included whether loaded or not
fn child_levels(entity: &Entity) -> Vec<(EntityId, usize)> {
    entity
        .properties()
        .flat_map(|(_, property)| {
            let crossed = match property {
                Property::Entity(_) => 0,
                _ => 1,
            };
            property_children(property)
                .into_iter()
                .map(move |child| (child, crossed))
        })
        .collect()
}

fn property_children(property: &Property) -> Vec<EntityId> {
    match property {
        Property::Entity(Some(id)) => vec![id.clone()],
        Property::Container(container) => container.keys().cloned().collect(),
        Property::List(list) => list.iter().filter_map(ListItem::entity_id).cloned().collect(),
        Property::Entity(None) | Property::Value(_) => Vec::new(),
    }
}

fn build_property(
    ctx: &mut GraphContext,
    id: &EntityId,
    class_name: &str,
    name: &str,
    shape: &PropertyShape,
    value: Value,
    staged: &mut Vec<Entity>,
) -> Result<Property, SyncError> {
    match (shape, value) {
        (PropertyShape::Scalar, value) => {
            validate_scalar(ctx, id, class_name, name, &value)?;
            Ok(Property::Value(value))
        }
        (PropertyShape::Entity { .. }, Value::Null) => Ok(Property::Entity(None)),
        (PropertyShape::Entity { class_name: child_class }, record @ Value::Object(_)) => {
            let child = stage_child(ctx, id, name, None, record, child_class, staged)?;
            Ok(Property::Entity(Some(child)))
        }
        (PropertyShape::Container { class_name: entry_class }, Value::Object(entries)) => {
            let mut container = Container::new();
            for (key, entry) in entries {
                let key = EntityId::new(key);
                if entry.is_object() {
                    stage_child(ctx, id, name, Some(&key), entry, entry_class, staged)?;
                    container.insert(key, Slot::Loaded);
                } else {
                    container.insert(key, Slot::Unloaded);
                }
            }
            Ok(Property::Container(container))
        }
        (PropertyShape::List { item_class }, Value::Array(items)) => {
            let mut list = List::new();
            for item in items {
                list.push(build_list_item(ctx, id, name, item_class, item, staged)?);
            }
            Ok(Property::List(list))
        }
        (PropertyShape::Entity { .. }, _) => Err(mismatch(id, class_name, name, "entity record or null").into()),
        (PropertyShape::Container { .. }, _) => Err(mismatch(id, class_name, name, "object").into()),
        (PropertyShape::List { .. }, _) => Err(mismatch(id, class_name, name, "array").into()),
    }
}

fn build_list_item(
    ctx: &mut GraphContext,
    id: &EntityId,
    name: &str,
    item_class: &Option<String>,
    value: Value,
    staged: &mut Vec<Entity>,
) -> Result<ListItem, SyncError> {
    match item_class {
        Some(item_class) if value.is_object() => {
            let child = stage_child(ctx, id, name, None, value, item_class, staged)?;
            Ok(ListItem::Entity(child))
        }
        _ => Ok(ListItem::Value(value)),
    }
}

fn stage_child(
    ctx: &mut GraphContext,
    parent_id: &EntityId,
    parent_property: &str,
    key: Option<&EntityId>,
    record: Value,
    expected_class: &str,
    staged: &mut Vec<Entity>,
) -> Result<EntityId, SyncError> {
    if let Some(class_name) = record.get(CLASS_NAME_FIELD).and_then(Value::as_str) {
        if !ctx.schemas.is_a(class_name, expected_class) {
            return Err(EntityError::Validation {
                id: record
                    .get(ID_FIELD)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                class_name: class_name.to_string(),
                errors: vec![ValidationError::new(
                    format!("/{}", CLASS_NAME_FIELD),
                    "oneOf",
                    format!("{} is not a {}", class_name, expected_class),
                )],
            }
            .into());
        }
    }

    let entities =
        ctx.factory
            .create_child(&ctx.schemas, record, parent_id, parent_property, key)?;
    let Some(child) = entities.first().map(|entity| entity.id().clone()) else {
        return Err(EntityError::MalformedRecord {
            id: parent_id.to_string(),
            reason: format!("empty record under {}", parent_property),
        }
        .into());
    };
    staged.extend(entities);
    Ok(child)
}

fn validate_scalar(
    ctx: &GraphContext,
    id: &EntityId,
    class_name: &str,
    name: &str,
    value: &Value,
) -> Result<(), SyncError> {
    let Some(schema) = ctx
        .schemas
        .schema(class_name)
        .and_then(|schema| schema.get("properties"))
        .and_then(|properties| properties.get(name))
    else {
        return Ok(());
    };
    let errors = ctx.schemas.validator().validate(schema, value);
    if errors.is_empty() {
        return Ok(());
    }
    let errors = errors
        .into_iter()
        .map(|mut error| {
            error.path = if error.path == "/" {
                format!("/{}", name)
            } else {
                format!("/{}{}", name, error.path)
            };
            error
        })
        .collect();
    Err(EntityError::Validation {
        id: id.to_string(),
        class_name: class_name.to_string(),
        errors,
    }
    .into())
}

fn mismatch(id: &EntityId, class_name: &str, name: &str, expected: &str) -> EntityError {
    EntityError::Validation {
        id: id.to_string(),
        class_name: class_name.to_string(),
        errors: vec![ValidationError::new(
            format!("/{}", name),
            "type",
            format!("expected {}", expected),
        )],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn graph_with_display() -> (Graph, GraphContext) {
        let mut ctx = GraphContext::default();
        let mut graph = Graph::new();
        let root = ctx.synthesize("Root", None, None, "").unwrap();
        let entities = ctx.create(root).unwrap();
        graph.admit(entities);

        let display = json!({
            "id": "Display-1", "className": "Display", "width": 1920, "height": 1080,
            "browsers": { "Browser-1": { "className": "Browser", "x": 0.25 }, "Browser-2": null }
        });
        let change = Change::container_add(&EntityId::new("Screen"), "displays", &EntityId::new("Display-1"), Some(display));
        graph.apply(&mut ctx, &change).unwrap();
        (graph, ctx)
    }

    #[test]
    fn walks_ancestors_nearest_first() {
        let (graph, _) = graph_with_display();
        assert_eq!(
            graph.ancestors(&EntityId::new("Browser-1")),
            vec![EntityId::new("Display-1"), EntityId::new("Screen"), EntityId::new("Root")]
        );
        assert!(graph.parent(&EntityId::new("Root")).is_none());
        assert_eq!(
            graph.ancestor_levels(&EntityId::new("Browser-1")),
            vec![
                (EntityId::new("Display-1"), 1),
                (EntityId::new("Screen"), 2),
                (EntityId::new("Root"), 2)
            ]
        );
    }

    #[test]
    fn depth_counts_unloaded_keys() {
        let (graph, _) = graph_with_display();
        let display = EntityId::new("Display-1");
        assert!(graph.satisfies(&display, 0));
        assert!(!graph.satisfies(&display, 1));
        assert!(!graph.satisfies(&EntityId::new("Root"), -1));
        assert_eq!(
            graph.descendants(&EntityId::new("Screen"), 1),
            vec![(display.clone(), 1)]
        );
    }

    #[test]
    fn nested_entities_share_their_parents_level() {
        let (graph, _) = graph_with_display();
        let root = EntityId::new("Root");
        assert!(graph.satisfies(&root, 0));
        assert!(graph.satisfies(&root, 1));
        assert!(!graph.satisfies(&root, 2));
        assert_eq!(
            graph.descendants(&root, 1),
            vec![(EntityId::new("Screen"), 0), (EntityId::new("Display-1"), 1)]
        );
    }

    #[test]
    fn shallow_form_collapses_containers() {
        let (graph, _) = graph_with_display();
        let shallow = graph.to_shallow(&EntityId::new("Display-1")).unwrap();
        assert_eq!(shallow["browsers"], json!({ "Browser-1": null, "Browser-2": null }));

        let plain = graph.to_plain(&EntityId::new("Display-1")).unwrap();
        assert_eq!(plain["browsers"]["Browser-1"]["x"], json!(0.25));
        assert_eq!(plain["browsers"]["Browser-2"], Value::Null);
    }

    #[test]
    fn container_delete_cascades() {
        let (mut graph, mut ctx) = graph_with_display();
        let change = Change::container_delete(&EntityId::new("Screen"), "displays", &EntityId::new("Display-1"));
        let effects = graph.apply(&mut ctx, &change).unwrap();

        assert_eq!(effects.detached, vec![EntityId::new("Display-1")]);
        assert_eq!(effects.removed.len(), 2);
        assert!(!graph.contains(&EntityId::new("Browser-1")));
        assert!(!ctx.factory.is_live(&EntityId::new("Browser-1")));
    }

    #[test]
    fn failed_replacement_keeps_old_subtree() {
        let (mut graph, mut ctx) = graph_with_display();
        let invalid = json!({ "id": "Display-1", "className": "Display", "width": -5 });
        let change = Change::Container(ContainerChange {
            item: EntityId::new("Screen"),
            container: "displays".to_string(),
            key: EntityId::new("Display-1"),
            kind: ContainerChangeType::Update,
            new_value: Some(invalid),
        });

        assert!(graph.apply(&mut ctx, &change).is_err());
        assert!(graph.contains(&EntityId::new("Browser-1")));
        assert!(ctx.factory.is_live(&EntityId::new("Display-1")));
    }

    #[test]
    fn scalar_writes_are_validated() {
        let (mut graph, mut ctx) = graph_with_display();
        let change = Change::item_update(&EntityId::new("Browser-1"), "x", json!(7));
        let error = graph.apply(&mut ctx, &change).unwrap_err();

        let SyncError::Entity(EntityError::Validation { errors, .. }) = error else {
            panic!("expected a validation error");
        };
        assert_eq!(errors[0].path, "/x");
        assert_eq!(graph.get(&EntityId::new("Browser-1")).unwrap().value("x"), Some(&json!(0.25)));
    }
}
