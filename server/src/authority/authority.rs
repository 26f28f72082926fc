use std::{collections::HashMap, mem};

use futures::FutureExt;
use log::{debug, info, warn};
use serde_json::Value;

use graft_shared::{
    constants::{FULL_DEPTH, ROOT_ID},
    Change, Commit, ConnectionError, Coordinator, Entity, EntityFuture, EntityId, Graph,
    GraphContext, Message, MessageReceiver, MessageSender, PersistenceAdapter, Registration,
    Store, SyncError, TransportError,
};

use crate::{
    authority::handler::{drop_listeners, relay, AuthorityHandler},
    connection::connection::{Connection, Listener},
    events::AuthorityEvents,
    AuthorityConfig, AuthorityError, ConnectionKey,
};

/// Holds the canonical configuration graph. The Authority is the only
/// process that writes to storage; Dependents send it their changes, and it
/// applies, persists and relays them to every other Dependent listening.
pub struct Authority {
    config: AuthorityConfig,
    coordinator: Coordinator,
    persistence: PersistenceAdapter,
    // Connections
    connections: HashMap<ConnectionKey, Connection>,
    next_connection_key: u64,
    initialized_by: Option<ConnectionKey>,
    pending_snapshots: Vec<(ConnectionKey, EntityFuture)>,
    // Events
    incoming_events: AuthorityEvents,
}

impl Authority {
    /// Create a new Authority over `store`, loading the whole tree from it.
    /// An empty store gets a default Root.
    pub fn new<S: Store + 'static>(
        config: AuthorityConfig,
        ctx: GraphContext,
        store: S,
    ) -> Result<Self, AuthorityError> {
        let persistence = PersistenceAdapter::new(store)
            .with_singleton_recovery(config.recover_singletons)
            .with_volatile(config.persist_volatile);

        let mut authority = Self {
            config,
            coordinator: Coordinator::new(ctx),
            persistence,
            connections: HashMap::new(),
            next_connection_key: 0,
            initialized_by: None,
            pending_snapshots: Vec::new(),
            incoming_events: AuthorityEvents::new(),
        };
        authority.boot()?;
        Ok(authority)
    }

    fn boot(&mut self) -> Result<(), AuthorityError> {
        let root = EntityId::new(ROOT_ID);
        if !self.persistence.contains(&root)? {
            let record = self.coordinator.context().synthesize(ROOT_ID, None, None, "")?;
            self.persistence
                .persist(&self.coordinator.context().schemas, &record)?;
            info!("Storage is empty, persisted a default Root");
        }

        let future = self.get_entity(&root, FULL_DEPTH);
        match future.now_or_never() {
            Some(Ok(_)) => {
                info!(
                    "Authority loaded {} entities",
                    self.coordinator.graph().len()
                );
                Ok(())
            }
            Some(Err(error)) if self.coordinator.graph().contains(&root) => {
                warn!("Authority loaded an incomplete tree: {}", error);
                self.incoming_events.push_error(error.into());
                Ok(())
            }
            Some(Err(error)) => Err(error.into()),
            None => Err(SyncError::Unavailable {
                id: ROOT_ID.to_string(),
            }
            .into()),
        }
    }

    // Accessors

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn graph(&self) -> &Graph {
        self.coordinator.graph()
    }

    pub fn context(&self) -> &GraphContext {
        self.coordinator.context()
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.coordinator.entity(id)
    }

    pub fn persistence(&self) -> &PersistenceAdapter {
        &self.persistence
    }

    /// Returns whether an `init` handshake has been accepted
    pub fn is_initialized(&self) -> bool {
        self.initialized_by.is_some()
    }

    pub fn connection_keys(&self) -> Vec<ConnectionKey> {
        let mut keys: Vec<ConnectionKey> = self.connections.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn listeners(&self, key: &ConnectionKey) -> Option<&[Listener]> {
        self.connections.get(key).map(Connection::listeners)
    }

    // Connections

    /// Accepts a Dependent over the given transport halves
    pub fn connect(
        &mut self,
        sender: Box<dyn MessageSender>,
        receiver: Box<dyn MessageReceiver>,
    ) -> ConnectionKey {
        let key = ConnectionKey::new(self.next_connection_key);
        self.next_connection_key += 1;
        self.connections.insert(
            key,
            Connection::new(&self.config.connection, key, sender, receiver),
        );
        info!("Connection {} established", key);
        self.incoming_events.push_connection(key);
        key
    }

    /// Drops a connection together with its listeners
    pub fn disconnect(&mut self, key: &ConnectionKey) -> Result<(), AuthorityError> {
        if self.connections.remove(key).is_none() {
            return Err(AuthorityError::UnknownConnection { key: key.to_u64() });
        }
        self.pending_snapshots.retain(|(pending, _)| pending != key);
        info!("Connection {} closed", key);
        self.incoming_events.push_disconnection(*key);
        Ok(())
    }

    /// Must be called regularly: handles every message received from every
    /// connection, in arrival order per connection, then answers the fetches
    /// that can be answered
    pub fn receive(&mut self) -> AuthorityEvents {
        for key in self.connection_keys() {
            let received = match self.connections.get_mut(&key) {
                Some(connection) => connection.base.receive(),
                None => continue,
            };
            match received {
                Ok(messages) => {
                    for message in messages {
                        if let Err(error) = self.handle_message(key, message) {
                            warn!("Message from connection {} failed: {}", key, error);
                            self.incoming_events.push_error(error);
                        }
                    }
                }
                Err(ConnectionError::Transport(TransportError::Closed)) => {
                    if let Err(error) = self.disconnect(&key) {
                        warn!("Closing connection {} failed: {}", key, error);
                        self.incoming_events.push_error(error);
                    }
                }
                Err(error) => self.incoming_events.push_error(error.into()),
            }
        }
        self.answer_fetches();

        mem::replace(&mut self.incoming_events, AuthorityEvents::new())
    }

    fn handle_message(&mut self, key: ConnectionKey, message: Message) -> Result<(), AuthorityError> {
        match message {
            Message::Init { schema, root } => self.init(key, schema, root),
            Message::Register { entity_id, depth } => self.register(key, entity_id, depth),
            Message::AddSchema { fragment } => {
                self.announce_schema(Some(key), fragment)?;
                Ok(())
            }
            Message::Change(change) => self.apply_change(key, change),
            Message::Fetch { entity_id } => {
                debug!("Connection {} fetches {}", key, entity_id);
                let future = self.coordinator.get_entity(&entity_id, 0);
                self.pending_snapshots.push((key, future));
                Ok(())
            }
            Message::Snapshot { .. } => Err(AuthorityError::UnexpectedMessage {
                connection: key.to_u64(),
                kind: "snapshot",
            }),
        }
    }

    // Handshake

    fn init(
        &mut self,
        key: ConnectionKey,
        schema: Vec<Value>,
        root: Value,
    ) -> Result<(), AuthorityError> {
        if let Some(owner) = self.initialized_by {
            if !self.config.allow_reinit {
                return Err(AuthorityError::AlreadyInitialized {
                    connection: key.to_u64(),
                    owner: owner.to_u64(),
                });
            }
        }

        for fragment in schema {
            self.coordinator.context_mut().add_schema(fragment)?;
        }
        self.coordinator.reset(root)?;

        let root_id = EntityId::new(ROOT_ID);
        let schemas = &self.coordinator.context().schemas;
        self.persistence.delete(schemas, &root_id)?;
        if let Some(record) = self.coordinator.graph().to_plain(&root_id) {
            self.persistence.persist(schemas, &record)?;
        }
        for connection in self.connections.values_mut() {
            connection.prune_listeners(self.coordinator.graph());
        }

        self.initialized_by = Some(key);
        info!(
            "Connection {} initialized the Authority with {} entities",
            key,
            self.coordinator.graph().len()
        );
        self.incoming_events.push_init(key);
        Ok(())
    }

    // Subscriptions

    fn register(
        &mut self,
        key: ConnectionKey,
        entity_id: EntityId,
        depth: i32,
    ) -> Result<(), AuthorityError> {
        if !self.connections.contains_key(&key) {
            return Err(AuthorityError::UnknownConnection { key: key.to_u64() });
        }
        if !self.coordinator.graph().satisfies(&entity_id, depth) {
            // the future is not needed, only the loading
            drop(self.get_entity(&entity_id, depth));
        }
        let Some(connection) = self.connections.get_mut(&key) else {
            return Err(AuthorityError::UnknownConnection { key: key.to_u64() });
        };
        let added = connection.register(self.coordinator.graph(), &entity_id, depth);
        debug!(
            "Connection {} listens to {} at depth {} ({} listeners added)",
            key, entity_id, depth, added
        );
        Ok(())
    }

    // Schemas

    /// Registers a class fragment and announces it to every connection
    pub fn add_schema(&mut self, fragment: Value) -> Result<Registration, AuthorityError> {
        self.announce_schema(None, fragment)
    }

    fn announce_schema(
        &mut self,
        origin: Option<ConnectionKey>,
        fragment: Value,
    ) -> Result<Registration, AuthorityError> {
        let registration = self.coordinator.context_mut().add_schema(fragment.clone())?;
        if registration == Registration::Unchanged {
            return Ok(registration);
        }
        let class_name = fragment
            .get("$id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let message = Message::AddSchema { fragment };
        for key in self.connection_keys() {
            if Some(key) == origin {
                continue;
            }
            if let Some(connection) = self.connections.get_mut(&key) {
                if let Err(error) = connection.base.send(&message) {
                    warn!("Could not announce {} to connection {}: {}", class_name, key, error);
                }
            }
        }
        if let Some(origin) = origin {
            self.incoming_events.push_schema(origin, class_name);
        }
        Ok(registration)
    }

    // Changes

    fn apply_change(&mut self, key: ConnectionKey, change: Change) -> Result<(), AuthorityError> {
        self.check_writable(&change)?;

        let mut handler = AuthorityHandler {
            persistence: &self.persistence,
            connections: &mut self.connections,
        };
        let commit = self.coordinator.apply_remote(&mut handler, &change)?;

        let relayed = match commit {
            Commit::AlreadyApplied => return Ok(()),
            // already persisted and relayed by the handler
            Commit::Local { change, .. } => change,
            Commit::Echo { change, effects } => {
                let graph = self.coordinator.graph();
                self.persistence.persist_change(
                    graph,
                    &self.coordinator.context().schemas,
                    &change,
                    &effects,
                )?;
                if let Some(origin) = self.connections.get_mut(&key) {
                    origin.base.add_received(&change);
                }
                relay(graph, &mut self.connections, &change);
                drop_listeners(&mut self.connections, &effects.removed);
                change
            }
        };
        self.incoming_events.push_change(key, relayed);
        Ok(())
    }

    fn check_writable(&self, change: &Change) -> Result<(), AuthorityError> {
        let view_only = self
            .coordinator
            .entity(change.item())
            .and_then(|entity| self.context().schemas.simplified(entity.class_name()))
            .map(|schema| schema.is_view_only(change.property()))
            .unwrap_or(false);
        if view_only {
            return Err(AuthorityError::ViewOnlyProperty {
                id: change.item().to_string(),
                property: change.property().to_string(),
            });
        }
        Ok(())
    }

    // Fetches

    /// Requests an entity from the graph, loading what is missing from
    /// storage right away
    pub fn get_entity(&mut self, id: &EntityId, depth: i32) -> EntityFuture {
        let future = self.coordinator.get_entity(id, depth);
        let mut handler = AuthorityHandler {
            persistence: &self.persistence,
            connections: &mut self.connections,
        };
        self.coordinator.process_fetches(&mut handler);
        future
    }

    fn answer_fetches(&mut self) {
        if self.pending_snapshots.is_empty() {
            return;
        }
        let mut handler = AuthorityHandler {
            persistence: &self.persistence,
            connections: &mut self.connections,
        };
        self.coordinator.process_fetches(&mut handler);

        for (key, mut future) in mem::take(&mut self.pending_snapshots) {
            match (&mut future).now_or_never() {
                None => self.pending_snapshots.push((key, future)),
                Some(Ok(entity)) => {
                    let Some(record) = self.coordinator.graph().to_shallow(entity.id()) else {
                        continue;
                    };
                    let Some(connection) = self.connections.get_mut(&key) else {
                        continue;
                    };
                    if let Err(error) = connection.base.send(&Message::Snapshot { record }) {
                        self.incoming_events.push_error(error.into());
                    }
                }
                Some(Err(error)) => {
                    warn!("Cannot answer fetch from connection {}: {}", key, error);
                    self.incoming_events.push_error(error.into());
                }
            }
        }
    }

    // Local mutations

    pub fn set(&mut self, id: &EntityId, name: &str, value: Value) -> Result<Commit, AuthorityError> {
        let mut handler = AuthorityHandler {
            persistence: &self.persistence,
            connections: &mut self.connections,
        };
        Ok(self.coordinator.set(&mut handler, id, name, value)?)
    }

    pub fn container_insert(
        &mut self,
        id: &EntityId,
        container: &str,
        record: Value,
    ) -> Result<(EntityId, Commit), AuthorityError> {
        let mut handler = AuthorityHandler {
            persistence: &self.persistence,
            connections: &mut self.connections,
        };
        Ok(self
            .coordinator
            .container_insert(&mut handler, id, container, record)?)
    }

    pub fn container_remove(
        &mut self,
        id: &EntityId,
        container: &str,
        key: &EntityId,
    ) -> Result<Commit, AuthorityError> {
        let mut handler = AuthorityHandler {
            persistence: &self.persistence,
            connections: &mut self.connections,
        };
        Ok(self
            .coordinator
            .container_remove(&mut handler, id, container, key)?)
    }

    pub fn list_splice(
        &mut self,
        id: &EntityId,
        list: &str,
        index: usize,
        removed_count: usize,
        added: Vec<Value>,
    ) -> Result<Commit, AuthorityError> {
        let mut handler = AuthorityHandler {
            persistence: &self.persistence,
            connections: &mut self.connections,
        };
        Ok(self
            .coordinator
            .list_splice(&mut handler, id, list, index, removed_count, added)?)
    }

    pub fn delete_entity(&mut self, id: &EntityId) -> Result<Commit, AuthorityError> {
        let mut handler = AuthorityHandler {
            persistence: &self.persistence,
            connections: &mut self.connections,
        };
        Ok(self.coordinator.delete_entity(&mut handler, id)?)
    }
}
