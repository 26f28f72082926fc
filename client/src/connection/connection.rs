use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use serde_json::Value;

use graft_shared::{
    constants::ID_FIELD, BaseConnection, ConnectionConfig, ConnectionError, EntityId, Message,
    MessageReceiver, MessageSender,
};

/// The Dependent's connection to the Authority
pub struct Connection {
    pub base: BaseConnection,
    registered: HashSet<(EntityId, i32)>,
    requested: HashSet<EntityId>,
    snapshots: HashMap<EntityId, Value>,
}

impl Connection {
    pub fn new(
        connection_config: &ConnectionConfig,
        sender: Box<dyn MessageSender>,
        receiver: Box<dyn MessageReceiver>,
    ) -> Self {
        Self {
            base: BaseConnection::new(connection_config, sender, receiver),
            registered: HashSet::new(),
            requested: HashSet::new(),
            snapshots: HashMap::new(),
        }
    }

    /// Subscribes to `entity_id` within `depth`, once per pair. Returns
    /// whether a `register` was sent.
    pub fn register(&mut self, entity_id: &EntityId, depth: i32) -> Result<bool, ConnectionError> {
        if self.registered.contains(&(entity_id.clone(), depth)) {
            return Ok(false);
        }
        self.base.send(&Message::Register {
            entity_id: entity_id.clone(),
            depth,
        })?;
        self.registered.insert((entity_id.clone(), depth));
        Ok(true)
    }

    pub fn is_registered(&self, entity_id: &EntityId, depth: i32) -> bool {
        self.registered.contains(&(entity_id.clone(), depth))
    }

    /// Asks the Authority for `entity_id` unless a request is already out.
    /// Returns whether a `fetch` was sent.
    pub fn request(&mut self, entity_id: &EntityId) -> Result<bool, ConnectionError> {
        if self.requested.contains(entity_id) {
            return Ok(false);
        }
        self.base.send(&Message::Fetch {
            entity_id: entity_id.clone(),
        })?;
        self.requested.insert(entity_id.clone());
        debug!("Requested {} from the Authority", entity_id);
        Ok(true)
    }

    /// Stores a snapshot until the fetch it answers picks it up
    pub fn receive_snapshot(&mut self, record: Value) -> Option<EntityId> {
        let Some(id) = record.get(ID_FIELD).and_then(Value::as_str).map(EntityId::new) else {
            warn!("Dropping a snapshot without an id");
            return None;
        };
        self.requested.remove(&id);
        self.snapshots.insert(id.clone(), record);
        Some(id)
    }

    pub fn take_snapshot(&mut self, entity_id: &EntityId) -> Option<Value> {
        self.snapshots.remove(entity_id)
    }
}
