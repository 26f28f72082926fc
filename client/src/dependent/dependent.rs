use std::mem;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use graft_shared::{
    constants::ROOT_ID, Change, Commit, ConnectionError, Coordinator, Entity, EntityFuture,
    EntityId, Graph, GraphContext, Message, MessageReceiver, MessageSender, PersistenceAdapter,
    Registration, Store, TransportError,
};

use crate::{
    connection::connection::Connection,
    dependent::handler::DependentHandler,
    events::DependentEvents,
    plugin::plugin_view::{self, PluginView},
    DependentConfig, DependentError,
};

/// A process holding a partial replica of the graph. Entities come from
/// local storage or from the Authority; local changes are forwarded to the
/// Authority, which applies and relays them.
pub struct Dependent {
    config: DependentConfig,
    coordinator: Coordinator,
    persistence: PersistenceAdapter,
    connection: Connection,
    incoming_events: DependentEvents,
}

impl Dependent {
    /// Create a new Dependent reading from `store` and talking to the
    /// Authority over the given transport halves
    pub fn new<S: Store + 'static>(
        config: DependentConfig,
        ctx: GraphContext,
        store: S,
        sender: Box<dyn MessageSender>,
        receiver: Box<dyn MessageReceiver>,
    ) -> Self {
        let connection = Connection::new(&config.connection, sender, receiver);
        let persistence =
            PersistenceAdapter::new(store).with_recovery_writes(config.persist_recovered_singletons);
        Self {
            config,
            coordinator: Coordinator::new(ctx),
            persistence,
            connection,
            incoming_events: DependentEvents::new(),
        }
    }

    // Accessors

    pub fn config(&self) -> &DependentConfig {
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

    pub fn is_registered(&self, id: &EntityId, depth: i32) -> bool {
        self.connection.is_registered(id, depth)
    }

    // Fetching

    /// Requests an entity resolved to `depth` levels and subscribes to its
    /// changes within that depth. Whatever storage can provide is loaded
    /// right away; the rest resolves once the Authority's snapshots arrive
    /// through `receive`.
    pub fn get_entity(&mut self, id: &EntityId, depth: i32) -> Result<EntityFuture, DependentError> {
        self.connection.register(id, depth)?;
        let future = self.coordinator.get_entity(id, depth);
        self.process_fetches();
        Ok(future)
    }

    /// `get_entity` at the configured default depth
    pub fn get(&mut self, id: &EntityId) -> Result<EntityFuture, DependentError> {
        self.get_entity(id, self.config.default_depth)
    }

    fn process_fetches(&mut self) -> usize {
        let mut handler = DependentHandler {
            persistence: &self.persistence,
            connection: &mut self.connection,
            persist_singletons: self.config.persist_recovered_singletons,
        };
        self.coordinator.process_fetches(&mut handler)
    }

    // Incoming

    /// Must be called regularly: applies what the Authority sent, then
    /// resumes the fetches its snapshots answer
    pub fn receive(&mut self) -> DependentEvents {
        match self.connection.base.receive() {
            Ok(messages) => {
                for message in messages {
                    if let Err(error) = self.handle_message(message) {
                        warn!("Message from the Authority failed: {}", error);
                        self.incoming_events.push_error(error);
                    }
                }
            }
            Err(error) => {
                if matches!(error, ConnectionError::Transport(TransportError::Closed)) {
                    warn!("Connection to the Authority is closed");
                }
                self.incoming_events.push_error(error.into());
            }
        }
        let resolved = self.process_fetches();
        if resolved > 0 {
            debug!("Resolved {} fetches", resolved);
        }

        mem::replace(&mut self.incoming_events, DependentEvents::new())
    }

    fn handle_message(&mut self, message: Message) -> Result<(), DependentError> {
        match message {
            Message::Change(change) => self.apply_change(change),
            Message::Snapshot { record } => {
                if let Some(id) = self.connection.receive_snapshot(record) {
                    self.incoming_events.push_snapshot(id);
                }
                Ok(())
            }
            Message::AddSchema { fragment } => {
                let class_name = class_name_of(&fragment);
                if self.coordinator.context_mut().add_schema(fragment)? == Registration::Added {
                    info!("Authority announced class {}", class_name);
                    self.incoming_events.push_schema(class_name);
                }
                Ok(())
            }
            other => Err(DependentError::UnexpectedMessage { kind: other.kind() }),
        }
    }

    fn apply_change(&mut self, change: Change) -> Result<(), DependentError> {
        let mut handler = DependentHandler {
            persistence: &self.persistence,
            connection: &mut self.connection,
            persist_singletons: self.config.persist_recovered_singletons,
        };
        match self.coordinator.apply_remote(&mut handler, &change)? {
            Commit::AlreadyApplied => {}
            Commit::Echo { change, .. } | Commit::Local { change, .. } => {
                self.incoming_events.push_change(change);
            }
        }
        Ok(())
    }

    // Handshake & schemas

    /// Sends the `init` handshake: every registered class fragment and the
    /// full Root subtree
    pub fn init_authority(&mut self) -> Result<(), DependentError> {
        let root_id = EntityId::new(ROOT_ID);
        let Some(root) = self.coordinator.graph().to_plain(&root_id) else {
            return Err(DependentError::NotLoaded {
                id: root_id.to_string(),
            });
        };
        let schema = self.coordinator.context().schemas.fragments();
        info!("Initializing the Authority with {} classes", schema.len());
        self.connection.base.send(&Message::Init { schema, root })?;
        Ok(())
    }

    /// Registers a class fragment locally and announces it to the Authority
    pub fn add_schema(&mut self, fragment: Value) -> Result<Registration, DependentError> {
        let registration = self
            .coordinator
            .context_mut()
            .add_schema(fragment.clone())?;
        if registration == Registration::Added {
            debug!("Announcing class {}", class_name_of(&fragment));
            self.connection.base.send(&Message::AddSchema { fragment })?;
        }
        Ok(registration)
    }

    // Local mutations

    fn check_writable(&self, id: &EntityId, property: &str) -> Result<(), DependentError> {
        let view_only = self
            .coordinator
            .entity(id)
            .and_then(|entity| self.context().schemas.simplified(entity.class_name()))
            .map(|schema| schema.is_view_only(property))
            .unwrap_or(false);
        if view_only {
            return Err(DependentError::ViewOnlyProperty {
                id: id.to_string(),
                property: property.to_string(),
            });
        }
        Ok(())
    }

    pub fn set(&mut self, id: &EntityId, name: &str, value: Value) -> Result<Commit, DependentError> {
        self.check_writable(id, name)?;
        let mut handler = DependentHandler {
            persistence: &self.persistence,
            connection: &mut self.connection,
            persist_singletons: self.config.persist_recovered_singletons,
        };
        Ok(self.coordinator.set(&mut handler, id, name, value)?)
    }

    pub fn remove_property(&mut self, id: &EntityId, name: &str) -> Result<Commit, DependentError> {
        self.check_writable(id, name)?;
        let mut handler = DependentHandler {
            persistence: &self.persistence,
            connection: &mut self.connection,
            persist_singletons: self.config.persist_recovered_singletons,
        };
        Ok(self.coordinator.remove_property(&mut handler, id, name)?)
    }

    pub fn container_insert(
        &mut self,
        id: &EntityId,
        container: &str,
        record: Value,
    ) -> Result<(EntityId, Commit), DependentError> {
        self.check_writable(id, container)?;
        let mut handler = DependentHandler {
            persistence: &self.persistence,
            connection: &mut self.connection,
            persist_singletons: self.config.persist_recovered_singletons,
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
    ) -> Result<Commit, DependentError> {
        self.check_writable(id, container)?;
        let mut handler = DependentHandler {
            persistence: &self.persistence,
            connection: &mut self.connection,
            persist_singletons: self.config.persist_recovered_singletons,
        };
        Ok(self
            .coordinator
            .container_remove(&mut handler, id, container, key)?)
    }

    pub fn list_update(
        &mut self,
        id: &EntityId,
        list: &str,
        index: usize,
        value: Value,
    ) -> Result<Commit, DependentError> {
        self.check_writable(id, list)?;
        let mut handler = DependentHandler {
            persistence: &self.persistence,
            connection: &mut self.connection,
            persist_singletons: self.config.persist_recovered_singletons,
        };
        Ok(self
            .coordinator
            .list_update(&mut handler, id, list, index, value)?)
    }

    pub fn list_splice(
        &mut self,
        id: &EntityId,
        list: &str,
        index: usize,
        removed_count: usize,
        added: Vec<Value>,
    ) -> Result<Commit, DependentError> {
        self.check_writable(id, list)?;
        let mut handler = DependentHandler {
            persistence: &self.persistence,
            connection: &mut self.connection,
            persist_singletons: self.config.persist_recovered_singletons,
        };
        Ok(self
            .coordinator
            .list_splice(&mut handler, id, list, index, removed_count, added)?)
    }

    pub fn delete_entity(&mut self, id: &EntityId) -> Result<Commit, DependentError> {
        let mut handler = DependentHandler {
            persistence: &self.persistence,
            connection: &mut self.connection,
            persist_singletons: self.config.persist_recovered_singletons,
        };
        Ok(self.coordinator.delete_entity(&mut handler, id)?)
    }

    // Plugins

    /// Read-only view of a plugin's settings and its on-screen rectangle
    pub fn plugin_view(&self, id: &EntityId) -> Result<PluginView, DependentError> {
        plugin_view::plugin_view(self.graph(), &self.context().schemas, id)
    }

    /// Writes a plugin's runtime counters. Every name must be a `volatile`
    /// property of the plugin's class; nothing is written otherwise.
    pub fn report_counters(
        &mut self,
        id: &EntityId,
        counters: Map<String, Value>,
    ) -> Result<(), DependentError> {
        let entity = plugin_view::plugin_entity(self.graph(), &self.context().schemas, id)?;
        let schema = self.context().schemas.simplified(entity.class_name());
        for name in counters.keys() {
            if !schema.map(|schema| schema.is_volatile(name)).unwrap_or(false) {
                return Err(DependentError::NotVolatile {
                    id: id.to_string(),
                    property: name.clone(),
                });
            }
        }
        for (name, value) in counters {
            self.set(id, &name, value)?;
        }
        Ok(())
    }
}

fn class_name_of(fragment: &Value) -> String {
    fragment
        .get("$id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
