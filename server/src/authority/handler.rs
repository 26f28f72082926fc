use std::collections::HashMap;

use log::{debug, warn};
use serde_json::Value;

use graft_shared::{
    Change, ChangeEffects, EntityId, Graph, GraphContext, PersistenceAdapter, SyncError,
    SyncHandler,
};

use crate::{connection::connection::Connection, ConnectionKey};

/// The Authority side of the coordinator: entities come from storage, local
/// changes are written to storage and relayed to listening Dependents
pub(crate) struct AuthorityHandler<'a> {
    pub(crate) persistence: &'a PersistenceAdapter,
    pub(crate) connections: &'a mut HashMap<ConnectionKey, Connection>,
}

impl SyncHandler for AuthorityHandler<'_> {
    fn load(&mut self, ctx: &GraphContext, id: &EntityId) -> Result<Option<Value>, SyncError> {
        Ok(self.persistence.load(&ctx.schemas, id)?)
    }

    fn propagate(&mut self, graph: &Graph, change: &Change) -> Result<(), SyncError> {
        relay(graph, self.connections, change);
        Ok(())
    }

    fn persist(
        &mut self,
        graph: &Graph,
        ctx: &GraphContext,
        change: &Change,
        effects: &ChangeEffects,
    ) -> Result<(), SyncError> {
        self.persistence
            .persist_change(graph, &ctx.schemas, change, effects)?;
        drop_listeners(self.connections, &effects.removed);
        Ok(())
    }
}

/// Sends `change` on every connection listening to its entity, through the
/// connection's Update Channel. Returns the number of connections it went out
/// on.
pub(crate) fn relay(
    graph: &Graph,
    connections: &mut HashMap<ConnectionKey, Connection>,
    change: &Change,
) -> usize {
    let mut keys: Vec<ConnectionKey> = connections.keys().copied().collect();
    keys.sort();
    let mut sent = 0;
    for key in keys {
        let Some(connection) = connections.get_mut(&key) else {
            continue;
        };
        if !connection.is_listening(graph, change.item()) {
            continue;
        }
        match connection.base.send_change(change) {
            Ok(true) => sent += 1,
            Ok(false) => {}
            Err(error) => warn!("Could not relay change to connection {}: {}", key, error),
        }
    }
    debug!(
        "Relayed change to {}.{} on {} connections",
        change.item(),
        change.property(),
        sent
    );
    sent
}

pub(crate) fn drop_listeners(
    connections: &mut HashMap<ConnectionKey, Connection>,
    removed: &[EntityId],
) {
    if removed.is_empty() {
        return;
    }
    for connection in connections.values_mut() {
        connection.drop_listeners(removed);
    }
}
