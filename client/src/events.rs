use std::{mem, vec::IntoIter};

use graft_shared::{Change, EntityId};

use crate::DependentError;

/// Everything that happened during one `Dependent::receive` call
pub struct DependentEvents {
    changes: Vec<Change>,
    schemas: Vec<String>,
    snapshots: Vec<EntityId>,
    errors: Vec<DependentError>,

    empty: bool,
}

impl DependentEvents {
    pub(crate) fn new() -> Self {
        Self {
            changes: Vec::new(),
            schemas: Vec::new(),
            snapshots: Vec::new(),
            errors: Vec::new(),

            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: DependentEvent>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: DependentEvent>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_change(&mut self, change: Change) {
        self.changes.push(change);
        self.empty = false;
    }

    pub(crate) fn push_schema(&mut self, class_name: String) {
        self.schemas.push(class_name);
        self.empty = false;
    }

    pub(crate) fn push_snapshot(&mut self, id: EntityId) {
        self.snapshots.push(id);
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: DependentError) {
        self.errors.push(error);
        self.empty = false;
    }
}

pub trait DependentEvent {
    type Iter;

    fn iter(events: &mut DependentEvents) -> Self::Iter;

    fn has(events: &DependentEvents) -> bool;
}

/// A change relayed by the Authority and applied to the local graph
pub struct ChangeEvent;
impl DependentEvent for ChangeEvent {
    type Iter = IntoIter<Change>;

    fn iter(events: &mut DependentEvents) -> Self::Iter {
        mem::take(&mut events.changes).into_iter()
    }

    fn has(events: &DependentEvents) -> bool {
        !events.changes.is_empty()
    }
}

/// A class announced by another process
pub struct AddSchemaEvent;
impl DependentEvent for AddSchemaEvent {
    type Iter = IntoIter<String>;

    fn iter(events: &mut DependentEvents) -> Self::Iter {
        mem::take(&mut events.schemas).into_iter()
    }

    fn has(events: &DependentEvents) -> bool {
        !events.schemas.is_empty()
    }
}

// Snapshot Event
pub struct SnapshotEvent;
impl DependentEvent for SnapshotEvent {
    type Iter = IntoIter<EntityId>;

    fn iter(events: &mut DependentEvents) -> Self::Iter {
        mem::take(&mut events.snapshots).into_iter()
    }

    fn has(events: &DependentEvents) -> bool {
        !events.snapshots.is_empty()
    }
}

// Error Event
pub struct ErrorEvent;
impl DependentEvent for ErrorEvent {
    type Iter = IntoIter<DependentError>;

    fn iter(events: &mut DependentEvents) -> Self::Iter {
        mem::take(&mut events.errors).into_iter()
    }

    fn has(events: &DependentEvents) -> bool {
        !events.errors.is_empty()
    }
}
