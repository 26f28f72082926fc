use log::{debug, info, warn};
use serde_json::Value;

use crate::{
    constants::{CLASS_NAME_FIELD, ID_FIELD},
    Change, ChangeEffects, ContainerChange, ContainerChangeType, Entity, EntityError,
    EntityFuture, EntityId, FetchQueue, FetchStatus, Graph, GraphContext, ItemChange,
    ItemChangeType, ListChange, ListChangeType, ListItem, Property, ShadowRecords, SyncError,
    SyncHandler,
};

/// What committing a change amounted to
#[derive(Clone, Debug, PartialEq)]
pub enum Commit {
    /// A genuinely new change: propagated and persisted through the handler
    Local {
        change: Change,
        effects: ChangeEffects,
    },
    /// The written value equals the last one received from a peer, so the
    /// change was committed locally only
    Echo {
        change: Change,
        effects: ChangeEffects,
    },
    /// A remote change whose value was already in place
    AlreadyApplied,
}

impl Commit {
    /// The change as committed, values in shallow form
    pub fn change(&self) -> Option<&Change> {
        match self {
            Commit::Local { change, .. } | Commit::Echo { change, .. } => Some(change),
            Commit::AlreadyApplied => None,
        }
    }

    pub fn effects(&self) -> Option<&ChangeEffects> {
        match self {
            Commit::Local { effects, .. } | Commit::Echo { effects, .. } => Some(effects),
            Commit::AlreadyApplied => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Commit::Local { .. })
    }

    pub fn is_echo(&self) -> bool {
        matches!(self, Commit::Echo { .. })
    }
}

/// State shared by both coordinator roles: the instance table, the shadow
/// table of last-known remote values and the queue of pending fetches.
///
/// Every mutation goes through `commit`, which classifies it as an echo or a
/// local change before handing it to the role's `SyncHandler`.
pub struct Coordinator {
    graph: Graph,
    shadow: ShadowRecords,
    fetches: FetchQueue,
    ctx: GraphContext,
}

impl Coordinator {
    pub fn new(ctx: GraphContext) -> Self {
        Self {
            graph: Graph::new(),
            shadow: ShadowRecords::new(),
            fetches: FetchQueue::new(),
            ctx,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn context(&self) -> &GraphContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GraphContext {
        &mut self.ctx
    }

    pub fn shadow(&self) -> &ShadowRecords {
        &self.shadow
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.graph.get(id)
    }

    pub fn pending_fetches(&self) -> usize {
        self.fetches.len()
    }

    // Registration

    /// Registers entities into the instance table. Ids already registered are
    /// skipped; every entity passed is still visited, so children that
    /// arrived late are picked up.
    pub fn connect(&mut self, entities: Vec<Entity>) -> Vec<EntityId> {
        let mut fresh = Vec::new();
        for entity in entities {
            if self.graph.contains(entity.id()) {
                debug!("Entity {} already connected", entity.id());
                continue;
            }
            fresh.push(entity);
        }
        let ids: Vec<EntityId> = fresh.iter().map(|entity| entity.id().clone()).collect();
        self.ctx.factory.reserve(ids.iter().cloned());
        let admitted = self.graph.admit(fresh);
        if !admitted.is_empty() {
            debug!("Connected {} entities", admitted.len());
        }
        admitted
    }

    /// Constructs the entities of a plain record and connects them, without
    /// treating them as a change
    pub fn insert_record(&mut self, record: Value) -> Result<Vec<EntityId>, SyncError> {
        let entities = self.ctx.create(record)?;
        Ok(self.connect(entities))
    }

    /// Replaces the whole graph with the tree described by `record`. The old
    /// graph is kept if the new one cannot be constructed.
    pub fn reset(&mut self, record: Value) -> Result<Vec<EntityId>, SyncError> {
        let old_ids: Vec<EntityId> = self.graph.ids().cloned().collect();
        self.ctx.factory.release(&old_ids);
        match self.ctx.create(record) {
            Ok(entities) => {
                self.graph.clear();
                self.shadow = ShadowRecords::new();
                let ids = self.connect(entities);
                info!("Graph replaced with {} entities", ids.len());
                Ok(ids)
            }
            Err(error) => {
                self.ctx.factory.reserve(old_ids);
                Err(error.into())
            }
        }
    }

    // Fetching

    /// Requests `id` with its descendants resolved to `depth` levels (`-1`
    /// for the whole subtree). Resolves immediately when the graph already
    /// satisfies the request, otherwise on a later `process_fetches`.
    pub fn get_entity(&mut self, id: &EntityId, depth: i32) -> EntityFuture {
        if self.graph.satisfies(id, depth) {
            if let Some(entity) = self.graph.get(id) {
                return EntityFuture::ready(id.clone(), Ok(entity.clone()));
            }
        }
        self.fetches.push(id.clone(), depth)
    }

    /// Works through queued fetches in order, one at a time, until the queue
    /// is empty or the handler answers `Pending`. Returns the number of
    /// requests resolved.
    pub fn process_fetches<H: SyncHandler>(&mut self, handler: &mut H) -> usize {
        let mut resolved = 0;
        while let Some((id, depth)) = self.fetches.front().map(|(id, depth)| (id.clone(), depth)) {
            let result = match self.resolve(handler, &id, depth) {
                Ok(false) => break,
                Ok(true) => self
                    .graph
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| SyncError::from(EntityError::EntityNotFound { id: id.to_string() })),
                Err(error) => {
                    warn!("Fetch of {} at depth {} failed: {}", id, depth, error);
                    Err(error)
                }
            };
            if let Some(request) = self.fetches.pop() {
                request.resolve(result);
                resolved += 1;
            }
        }
        resolved
    }

    // Ok(false) when the handler could not answer yet
    fn resolve<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        id: &EntityId,
        depth: i32,
    ) -> Result<bool, SyncError> {
        if !self.graph.contains(id) {
            match handler.fetch(&self.ctx, id)? {
                FetchStatus::Ready(record) => {
                    self.admit_record(id, record)?;
                }
                FetchStatus::Pending => return Ok(false),
            }
        }
        for (child, crossed) in self.graph.child_levels(id) {
            let next = match (crossed, depth) {
                // nested entities arrive with their parent's record
                (0, _) => depth,
                (_, 0) => continue,
                (_, depth) if depth < 0 => depth,
                (_, depth) => depth - 1,
            };
            if !self.resolve(handler, &child, next)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn admit_record(&mut self, id: &EntityId, record: Value) -> Result<(), SyncError> {
        let record_id = record.get(ID_FIELD).and_then(Value::as_str);
        if record_id != Some(id.as_str()) {
            return Err(EntityError::MalformedRecord {
                id: id.to_string(),
                reason: format!("received a record for {}", record_id.unwrap_or("no id")),
            }
            .into());
        }
        let graph = &self.graph;
        let entities = self.ctx.create_around(record, &|child| graph.contains(child))?;
        self.connect(entities);
        Ok(())
    }

    // Remote updates

    /// Applies a change received from a peer. The target must be cached or
    /// loadable synchronously. The change is staged into the shadow record
    /// first, so the commit that follows is classified as an echo.
    pub fn apply_remote<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        change: &Change,
    ) -> Result<Commit, SyncError> {
        let target = change.item();
        if !self.graph.contains(target) {
            match handler.load(&self.ctx, target)? {
                Some(record) => self.admit_record(target, record)?,
                None => {
                    return Err(SyncError::MissingTarget {
                        id: target.to_string(),
                    });
                }
            }
        }

        let staged = self.shadow.stage(&self.graph, &self.ctx.schemas, change);
        if staged == self.graph.key_value(change) {
            info!(
                "Change to {}.{} already applied",
                target,
                change.property()
            );
            return Ok(Commit::AlreadyApplied);
        }

        self.commit(handler, change, true)
    }

    // Local mutations

    /// Assigns a property. Entity-shaped properties take a record (or null),
    /// containers an id-keyed object and lists an array.
    pub fn set<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        id: &EntityId,
        name: &str,
        value: Value,
    ) -> Result<Commit, SyncError> {
        let old_value = self.graph.property_value(id, name);
        let kind = match old_value {
            Some(_) => ItemChangeType::Update,
            None => ItemChangeType::Add,
        };
        let change = Change::Item(ItemChange {
            item: id.clone(),
            name: name.to_string(),
            kind,
            new_value: Some(value),
            old_value,
        });
        self.commit(handler, &change, false)
    }

    pub fn remove_property<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        id: &EntityId,
        name: &str,
    ) -> Result<Commit, SyncError> {
        let Some(old_value) = self.graph.property_value(id, name) else {
            return Err(EntityError::PropertyNotFound {
                id: id.to_string(),
                property: name.to_string(),
            }
            .into());
        };
        let change = Change::Item(ItemChange {
            item: id.clone(),
            name: name.to_string(),
            kind: ItemChangeType::Remove,
            new_value: None,
            old_value: Some(old_value),
        });
        self.commit(handler, &change, false)
    }

    /// Constructs a child from `record` under `container` of `id`. A record
    /// without an id gets a generated one. Returns the child's key.
    pub fn container_insert<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        id: &EntityId,
        container: &str,
        record: Value,
    ) -> Result<(EntityId, Commit), SyncError> {
        let Value::Object(mut record) = record else {
            return Err(EntityError::MalformedRecord {
                id: String::new(),
                reason: "container entries must be records".to_string(),
            }
            .into());
        };
        let key = match record.get(ID_FIELD).and_then(Value::as_str) {
            Some(key) => EntityId::new(key),
            None => {
                let Some(class_name) = record.get(CLASS_NAME_FIELD).and_then(Value::as_str) else {
                    return Err(EntityError::MissingClassName {
                        record: Value::Object(record).to_string(),
                    }
                    .into());
                };
                let key = EntityId::generate(class_name);
                record.insert(ID_FIELD.to_string(), Value::String(key.to_string()));
                key
            }
        };
        let change = self.container_change(id, container, &key, Some(Value::Object(record)));
        let commit = self.commit(handler, &change, false)?;
        Ok((key, commit))
    }

    /// Adds `key` to `container` of `id` without loading its content
    pub fn container_insert_unloaded<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        id: &EntityId,
        container: &str,
        key: &EntityId,
    ) -> Result<Commit, SyncError> {
        let change = self.container_change(id, container, key, None);
        self.commit(handler, &change, false)
    }

    pub fn container_remove<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        id: &EntityId,
        container: &str,
        key: &EntityId,
    ) -> Result<Commit, SyncError> {
        let change = Change::container_delete(id, container, key);
        self.commit(handler, &change, false)
    }

    pub fn list_update<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        id: &EntityId,
        list: &str,
        index: usize,
        value: Value,
    ) -> Result<Commit, SyncError> {
        let change = Change::List(ListChange {
            item: id.clone(),
            list: list.to_string(),
            kind: ListChangeType::Update,
            index,
            new_value: Some(value),
            added: None,
            removed_count: None,
        });
        self.commit(handler, &change, false)
    }

    /// Removes `removed_count` elements at `index` and inserts `added` there
    pub fn list_splice<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        id: &EntityId,
        list: &str,
        index: usize,
        removed_count: usize,
        added: Vec<Value>,
    ) -> Result<Commit, SyncError> {
        let change = Change::list_splice(id, list, index, removed_count, added);
        self.commit(handler, &change, false)
    }

    /// Deletes `id` and its subtree by removing it from its parent
    pub fn delete_entity<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        id: &EntityId,
    ) -> Result<Commit, SyncError> {
        let entity = self.graph.try_get(id)?;
        if entity.is_root() {
            return Err(SyncError::RootDeletion { id: id.to_string() });
        }
        let orphan = || SyncError::Orphan {
            id: id.to_string(),
            parent_id: entity.parent_id().to_string(),
        };
        let parent = self.graph.get(entity.parent_id()).ok_or_else(orphan)?;
        let property = entity.parent_property();

        let change = match parent.property(property) {
            Some(Property::Container(container)) if container.contains(id) => {
                Change::container_delete(parent.id(), property, id)
            }
            Some(Property::Entity(Some(child))) if child == id => Change::Item(ItemChange {
                item: parent.id().clone(),
                name: property.to_string(),
                kind: ItemChangeType::Update,
                new_value: Some(Value::Null),
                old_value: None,
            }),
            Some(Property::List(list)) => {
                let Some(index) = list
                    .iter()
                    .position(|item| matches!(item, ListItem::Entity(child) if child == id))
                else {
                    return Err(orphan());
                };
                Change::list_splice(parent.id(), property, index, 1, Vec::new())
            }
            _ => return Err(orphan()),
        };
        self.commit(handler, &change, false)
    }

    fn container_change(
        &self,
        id: &EntityId,
        container: &str,
        key: &EntityId,
        new_value: Option<Value>,
    ) -> Change {
        let present = self
            .graph
            .get(id)
            .and_then(|entity| entity.container(container))
            .map(|container| container.contains(key))
            .unwrap_or(false);
        Change::Container(ContainerChange {
            item: id.clone(),
            container: container.to_string(),
            key: key.clone(),
            kind: if present {
                ContainerChangeType::Update
            } else {
                ContainerChangeType::Add
            },
            new_value,
        })
    }

    // Applies the change, then compares the written slot against the shadow
    // record: equal means echo, anything else is propagated and persisted
    fn commit<H: SyncHandler>(
        &mut self,
        handler: &mut H,
        change: &Change,
        remote: bool,
    ) -> Result<Commit, SyncError> {
        let effects = self.graph.apply(&mut self.ctx, change)?;
        self.shadow.forget(&effects.removed);
        if remote {
            self.shadow.record(&self.graph, change);
        }

        let committed = self.graph.shallow_change(change);
        let post = self.graph.key_value(change);
        if self.shadow.matches(change, post.as_ref()) {
            debug!("Suppressed echo of {:?}", change.update_key());
            return Ok(Commit::Echo {
                change: committed,
                effects,
            });
        }

        handler.propagate(&self.graph, &committed)?;
        handler.persist(&self.graph, &self.ctx, &committed, &effects)?;

        Ok(Commit::Local {
            change: committed,
            effects,
        })
    }
}
