use serde_json::Value;

use crate::{EntityError, EntityId};

/// A single element of a List: either a plain value or a child Entity
#[derive(Clone, Debug, PartialEq)]
pub enum ListItem {
    Value(Value),
    Entity(EntityId),
}

impl ListItem {
    pub fn entity_id(&self) -> Option<&EntityId> {
        match self {
            ListItem::Entity(id) => Some(id),
            ListItem::Value(_) => None,
        }
    }
}

/// An ordered sequence supporting positional update and range splice
#[derive(Clone, Debug, Default, PartialEq)]
pub struct List {
    items: Vec<ListItem>,
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ListItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ListItem> {
        self.items.iter()
    }

    pub fn push(&mut self, item: ListItem) {
        self.items.push(item);
    }

    /// Replaces the element at `index`, returning the previous element
    pub fn update(&mut self, index: usize, item: ListItem) -> Result<ListItem, EntityError> {
        let len = self.items.len();
        let Some(slot) = self.items.get_mut(index) else {
            return Err(EntityError::ListIndexOutOfBounds { index, len });
        };
        Ok(std::mem::replace(slot, item))
    }

    /// Removes `removed_count` elements starting at `index` and inserts
    /// `added` in their place, returning the removed run. The removed count
    /// is clamped to the end of the list.
    pub fn splice(
        &mut self,
        index: usize,
        removed_count: usize,
        added: Vec<ListItem>,
    ) -> Result<Vec<ListItem>, EntityError> {
        let len = self.items.len();
        if index > len {
            return Err(EntityError::ListIndexOutOfBounds { index, len });
        }
        let end = index + removed_count.min(len - index);
        Ok(self.items.splice(index..end, added).collect())
    }
}

impl FromIterator<ListItem> for List {
    fn from_iter<I: IntoIterator<Item = ListItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
