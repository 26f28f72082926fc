use std::{mem, vec::IntoIter};

use graft_shared::Change;

use crate::{AuthorityError, ConnectionKey};

/// Everything that happened during one `Authority::receive` call
pub struct AuthorityEvents {
    connections: Vec<ConnectionKey>,
    disconnections: Vec<ConnectionKey>,
    inits: Vec<ConnectionKey>,
    changes: Vec<(ConnectionKey, Change)>,
    schemas: Vec<(ConnectionKey, String)>,
    errors: Vec<AuthorityError>,

    empty: bool,
}

impl AuthorityEvents {
    pub(crate) fn new() -> Self {
        Self {
            connections: Vec::new(),
            disconnections: Vec::new(),
            inits: Vec::new(),
            changes: Vec::new(),
            schemas: Vec::new(),
            errors: Vec::new(),

            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: AuthorityEvent>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: AuthorityEvent>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_connection(&mut self, key: ConnectionKey) {
        self.connections.push(key);
        self.empty = false;
    }

    pub(crate) fn push_disconnection(&mut self, key: ConnectionKey) {
        self.disconnections.push(key);
        self.empty = false;
    }

    pub(crate) fn push_init(&mut self, key: ConnectionKey) {
        self.inits.push(key);
        self.empty = false;
    }

    pub(crate) fn push_change(&mut self, key: ConnectionKey, change: Change) {
        self.changes.push((key, change));
        self.empty = false;
    }

    pub(crate) fn push_schema(&mut self, key: ConnectionKey, class_name: String) {
        self.schemas.push((key, class_name));
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: AuthorityError) {
        self.errors.push(error);
        self.empty = false;
    }
}

pub trait AuthorityEvent {
    type Iter;

    fn iter(events: &mut AuthorityEvents) -> Self::Iter;

    fn has(events: &AuthorityEvents) -> bool;
}

// Connect Event
pub struct ConnectEvent;
impl AuthorityEvent for ConnectEvent {
    type Iter = IntoIter<ConnectionKey>;

    fn iter(events: &mut AuthorityEvents) -> Self::Iter {
        mem::take(&mut events.connections).into_iter()
    }

    fn has(events: &AuthorityEvents) -> bool {
        !events.connections.is_empty()
    }
}

// Disconnect Event
pub struct DisconnectEvent;
impl AuthorityEvent for DisconnectEvent {
    type Iter = IntoIter<ConnectionKey>;

    fn iter(events: &mut AuthorityEvents) -> Self::Iter {
        mem::take(&mut events.disconnections).into_iter()
    }

    fn has(events: &AuthorityEvents) -> bool {
        !events.disconnections.is_empty()
    }
}

// Init Event
pub struct InitEvent;
impl AuthorityEvent for InitEvent {
    type Iter = IntoIter<ConnectionKey>;

    fn iter(events: &mut AuthorityEvents) -> Self::Iter {
        mem::take(&mut events.inits).into_iter()
    }

    fn has(events: &AuthorityEvents) -> bool {
        !events.inits.is_empty()
    }
}

/// A change received from a Dependent and applied, as relayed
pub struct ChangeEvent;
impl AuthorityEvent for ChangeEvent {
    type Iter = IntoIter<(ConnectionKey, Change)>;

    fn iter(events: &mut AuthorityEvents) -> Self::Iter {
        mem::take(&mut events.changes).into_iter()
    }

    fn has(events: &AuthorityEvents) -> bool {
        !events.changes.is_empty()
    }
}

/// A class newly registered through `addSchema`
pub struct AddSchemaEvent;
impl AuthorityEvent for AddSchemaEvent {
    type Iter = IntoIter<(ConnectionKey, String)>;

    fn iter(events: &mut AuthorityEvents) -> Self::Iter {
        mem::take(&mut events.schemas).into_iter()
    }

    fn has(events: &AuthorityEvents) -> bool {
        !events.schemas.is_empty()
    }
}

// Error Event
pub struct ErrorEvent;
impl AuthorityEvent for ErrorEvent {
    type Iter = IntoIter<AuthorityError>;

    fn iter(events: &mut AuthorityEvents) -> Self::Iter {
        mem::take(&mut events.errors).into_iter()
    }

    fn has(events: &AuthorityEvents) -> bool {
        !events.errors.is_empty()
    }
}
