use std::collections::{btree_map, BTreeMap};

use serde_json::Value;

use crate::{Container, EntityId, List, Property};

/// A schema-validated node in the configuration graph.
///
/// The parent is held as an id and resolved through the instance table, so an
/// Entity never owns or points at another Entity directly.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    id: EntityId,
    parent_id: EntityId,
    parent_property: String,
    class_name: String,
    name: String,
    properties: BTreeMap<String, Property>,
}

impl Entity {
    pub fn new(
        id: EntityId,
        parent_id: EntityId,
        parent_property: String,
        class_name: String,
        name: String,
    ) -> Self {
        Self {
            id,
            parent_id,
            parent_property,
            class_name,
            name,
            properties: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn parent_id(&self) -> &EntityId {
        &self.parent_id
    }

    pub fn parent_property(&self) -> &str {
        &self.parent_property
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// The root is the only self-parented Entity
    pub fn is_root(&self) -> bool {
        self.id == self.parent_id
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub(crate) fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.get_mut(name)
    }

    pub fn properties(&self) -> btree_map::Iter<'_, String, Property> {
        self.properties.iter()
    }

    pub fn insert_property(&mut self, name: &str, property: Property) -> Option<Property> {
        self.properties.insert(name.to_string(), property)
    }

    pub(crate) fn remove_property(&mut self, name: &str) -> Option<Property> {
        self.properties.remove(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.properties.get(name) {
            Some(Property::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn child(&self, name: &str) -> Option<&EntityId> {
        match self.properties.get(name) {
            Some(Property::Entity(Some(id))) => Some(id),
            _ => None,
        }
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        match self.properties.get(name) {
            Some(Property::Container(container)) => Some(container),
            _ => None,
        }
    }

    pub(crate) fn container_mut(&mut self, name: &str) -> Option<&mut Container> {
        match self.properties.get_mut(name) {
            Some(Property::Container(container)) => Some(container),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&List> {
        match self.properties.get(name) {
            Some(Property::List(list)) => Some(list),
            _ => None,
        }
    }

    pub(crate) fn list_mut(&mut self, name: &str) -> Option<&mut List> {
        match self.properties.get_mut(name) {
            Some(Property::List(list)) => Some(list),
            _ => None,
        }
    }

    pub fn containers(&self) -> impl Iterator<Item = (&String, &Container)> {
        self.properties.iter().filter_map(|(name, property)| match property {
            Property::Container(container) => Some((name, container)),
            _ => None,
        })
    }

    pub(crate) fn containers_mut(&mut self) -> impl Iterator<Item = (&String, &mut Container)> {
        self.properties
            .iter_mut()
            .filter_map(|(name, property)| match property {
                Property::Container(container) => Some((name, container)),
                _ => None,
            })
    }

    /// Ids of every child present in the instance table: nested entities,
    /// loaded container members and entity list elements
    pub fn child_ids(&self) -> Vec<EntityId> {
        let mut output = Vec::new();
        for property in self.properties.values() {
            match property {
                Property::Entity(Some(id)) => output.push(id.clone()),
                Property::Container(container) => {
                    output.extend(container.loaded_keys().cloned());
                }
                Property::List(list) => {
                    output.extend(list.iter().filter_map(|item| item.entity_id()).cloned());
                }
                Property::Entity(None) | Property::Value(_) => {}
            }
        }
        output
    }
}
