use log::{debug, info};
use serde_json::Value;

use graft_shared::{
    Change, ChangeEffects, EntityId, FetchStatus, Graph, GraphContext, PersistenceAdapter,
    SyncError, SyncHandler,
};

use crate::connection::connection::Connection;

/// The Dependent side of the coordinator: entities come from storage, from
/// the schema's singletons or from the Authority, and local changes go to
/// the Authority
pub(crate) struct DependentHandler<'a> {
    pub(crate) persistence: &'a PersistenceAdapter,
    pub(crate) connection: &'a mut Connection,
    pub(crate) persist_singletons: bool,
}

impl DependentHandler<'_> {
    fn bootstrap(&self, ctx: &GraphContext, id: &EntityId) -> Result<Option<Value>, SyncError> {
        let Some(fragment) = ctx.schemas.singleton_for(id) else {
            return Ok(None);
        };
        let record = ctx.synthesize(fragment.class_name(), Some(id.clone()), None, "")?;
        if self.persist_singletons {
            self.persistence.persist(&ctx.schemas, &record)?;
        }
        info!("Bootstrapped singleton {}", id);
        Ok(Some(record))
    }
}

impl SyncHandler for DependentHandler<'_> {
    fn load(&mut self, ctx: &GraphContext, id: &EntityId) -> Result<Option<Value>, SyncError> {
        Ok(self.persistence.load(&ctx.schemas, id)?)
    }

    fn fetch(&mut self, ctx: &GraphContext, id: &EntityId) -> Result<FetchStatus, SyncError> {
        if let Some(record) = self.connection.take_snapshot(id) {
            return Ok(FetchStatus::Ready(record));
        }
        if let Some(record) = self.load(ctx, id)? {
            return Ok(FetchStatus::Ready(record));
        }
        if let Some(record) = self.bootstrap(ctx, id)? {
            return Ok(FetchStatus::Ready(record));
        }
        self.connection.request(id)?;
        Ok(FetchStatus::Pending)
    }

    fn propagate(&mut self, _graph: &Graph, change: &Change) -> Result<(), SyncError> {
        if !self.connection.base.send_change(change)? {
            debug!(
                "Change to {}.{} matches what the Authority sent, not sending it back",
                change.item(),
                change.property()
            );
        }
        Ok(())
    }

    // the Authority owns storage
    fn persist(
        &mut self,
        _graph: &Graph,
        _ctx: &GraphContext,
        _change: &Change,
        _effects: &ChangeEffects,
    ) -> Result<(), SyncError> {
        Ok(())
    }
}
