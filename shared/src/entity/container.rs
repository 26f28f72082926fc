use std::collections::{btree_map, BTreeMap};

use crate::EntityId;

/// Load state of a single Container entry
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Slot {
    /// The id is known, the child's content is not loaded
    Unloaded,
    /// The child Entity is present in the instance table
    Loaded,
}

impl Slot {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Slot::Loaded)
    }
}

/// An id-keyed dictionary of child Entities. A key that is present maps to
/// either a loaded child or an unloaded placeholder; absence means the key
/// does not exist.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Container {
    slots: BTreeMap<EntityId, Slot>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &EntityId) -> bool {
        self.slots.contains_key(key)
    }

    pub fn slot(&self, key: &EntityId) -> Option<Slot> {
        self.slots.get(key).copied()
    }

    pub fn is_loaded(&self, key: &EntityId) -> bool {
        self.slot(key).map(|slot| slot.is_loaded()).unwrap_or(false)
    }

    /// Returns true if every key maps to a loaded child
    pub fn all_loaded(&self) -> bool {
        self.slots.values().all(Slot::is_loaded)
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityId> {
        self.slots.keys()
    }

    pub fn loaded_keys(&self) -> impl Iterator<Item = &EntityId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.is_loaded())
            .map(|(key, _)| key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, EntityId, Slot> {
        self.slots.iter()
    }

    pub fn insert(&mut self, key: EntityId, slot: Slot) -> Option<Slot> {
        self.slots.insert(key, slot)
    }

    pub fn remove(&mut self, key: &EntityId) -> Option<Slot> {
        self.slots.remove(key)
    }

    /// Marks an existing key as loaded, returns false if the key is absent
    pub fn mark_loaded(&mut self, key: &EntityId) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) => {
                *slot = Slot::Loaded;
                true
            }
            None => false,
        }
    }
}

impl FromIterator<(EntityId, Slot)> for Container {
    fn from_iter<I: IntoIterator<Item = (EntityId, Slot)>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}
