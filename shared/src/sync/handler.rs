use serde_json::Value;

use crate::{Change, ChangeEffects, EntityId, Graph, GraphContext, SyncError};

/// Outcome of a fetch: the plain record of the entity, or a promise that it
/// will be available on a later `process_fetches`
#[derive(Clone, Debug, PartialEq)]
pub enum FetchStatus {
    Ready(Value),
    Pending,
}

/// The role-specific half of a coordinator: where entities come from and
/// where local changes go.
///
/// Handlers only ever receive shared access to the graph, so they cannot
/// write into the property whose change they are handling.
pub trait SyncHandler {
    /// Loads the plain record of `id` from local durable state, if present
    fn load(&mut self, ctx: &GraphContext, id: &EntityId) -> Result<Option<Value>, SyncError>;

    /// Fetches the plain record of `id` from wherever this role gets it
    fn fetch(&mut self, ctx: &GraphContext, id: &EntityId) -> Result<FetchStatus, SyncError> {
        match self.load(ctx, id)? {
            Some(record) => Ok(FetchStatus::Ready(record)),
            None => Err(SyncError::Unavailable { id: id.to_string() }),
        }
    }

    /// Forwards a committed local change to peers
    fn propagate(&mut self, graph: &Graph, change: &Change) -> Result<(), SyncError>;

    /// Writes a committed local change to durable storage
    fn persist(
        &mut self,
        graph: &Graph,
        ctx: &GraphContext,
        change: &Change,
        effects: &ChangeEffects,
    ) -> Result<(), SyncError>;
}
