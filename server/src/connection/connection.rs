use std::fmt;

use graft_shared::{
    constants::FULL_DEPTH, BaseConnection, ConnectionConfig, EntityId, Graph, MessageReceiver,
    MessageSender,
};

/// Identifies a Dependent connected to the Authority
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct ConnectionKey(u64);

impl ConnectionKey {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A subscription to changes of `entity_id` and of its descendants up to
/// `depth` container levels down (`-1` for all). Nested entities share
/// their parent's level.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Listener {
    pub entity_id: EntityId,
    pub depth: i32,
}

impl Listener {
    fn covers_hops(&self, hops: usize) -> bool {
        self.depth == FULL_DEPTH || (self.depth >= 0 && hops <= self.depth as usize)
    }
}

pub struct Connection {
    pub key: ConnectionKey,
    pub base: BaseConnection,
    listeners: Vec<Listener>,
}

impl Connection {
    pub fn new(
        connection_config: &ConnectionConfig,
        key: ConnectionKey,
        sender: Box<dyn MessageSender>,
        receiver: Box<dyn MessageReceiver>,
    ) -> Self {
        Self {
            key,
            base: BaseConnection::new(connection_config, sender, receiver),
            listeners: Vec::new(),
        }
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Adds a listener unless the identical one exists. Returns whether it
    /// was added.
    pub fn add_listener(&mut self, entity_id: EntityId, depth: i32) -> bool {
        let listener = Listener { entity_id, depth };
        if self.listeners.contains(&listener) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Subscribes to `entity_id` and back-fills a listener for every
    /// currently loaded descendant within `depth`
    pub fn register(&mut self, graph: &Graph, entity_id: &EntityId, depth: i32) -> usize {
        let mut added = usize::from(self.add_listener(entity_id.clone(), depth));
        for (descendant, hops) in graph.descendants(entity_id, depth) {
            let remaining = if depth == FULL_DEPTH {
                FULL_DEPTH
            } else {
                depth - hops as i32
            };
            added += usize::from(self.add_listener(descendant, remaining));
        }
        added
    }

    /// True if a change to `entity_id` falls within one of the listeners,
    /// walking up its ancestor chain
    pub fn is_listening(&self, graph: &Graph, entity_id: &EntityId) -> bool {
        let chain = std::iter::once((entity_id.clone(), 0)).chain(graph.ancestor_levels(entity_id));
        for (ancestor, hops) in chain {
            if self
                .listeners
                .iter()
                .any(|listener| listener.entity_id == ancestor && listener.covers_hops(hops))
            {
                return true;
            }
        }
        false
    }

    /// Drops listeners whose entity is no longer loaded
    pub fn prune_listeners(&mut self, graph: &Graph) {
        self.listeners
            .retain(|listener| graph.contains(&listener.entity_id));
    }

    pub fn drop_listeners(&mut self, removed: &[EntityId]) {
        self.listeners
            .retain(|listener| !removed.contains(&listener.entity_id));
    }
}
