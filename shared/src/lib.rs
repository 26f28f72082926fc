//! # Graft Shared
//! Common functionality shared between graft-server & graft-client crates:
//! the entity model, schema composer, entity factory, sync coordinator,
//! update channel and persistence adapter.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub mod constants;
mod connection;
mod context;
mod entity;
mod factory;
mod graph;
mod messages;
mod persistence;
mod schema;
mod sync;
mod transport;

pub use connection::{
    base_connection::BaseConnection, connection_config::ConnectionConfig,
    error::ConnectionError, update_channel::UpdateChannel,
};
pub use context::GraphContext;
pub use entity::{
    container::{Container, Slot},
    entity::Entity,
    entity_id::EntityId,
    error::EntityError,
    list::{List, ListItem},
    property::Property,
};
pub use factory::{
    entity_builder::{DefaultBuilder, EntityBuilder},
    entity_factory::EntityFactory,
};
pub use graph::{
    graph::{stub, ChangeEffects, Graph},
    records::normalize_record,
};
pub use messages::{error::MessageError, message::Message};
pub use persistence::{
    error::PersistenceError,
    persistence_adapter::PersistenceAdapter,
    store::{FileStore, MemoryStore, Store},
};
pub use schema::{
    builtin,
    class_fragment::{ClassFragment, Singleton},
    composer::ComposedSchema,
    error::{SchemaError, ValidationError},
    schema_registry::{Registration, SchemaRegistry},
    simplified_schema::{PropertySchema, PropertyShape, SimplifiedSchema},
    validator::Validator,
};
pub use sync::{
    change::{
        Change, ContainerChange, ContainerChangeType, ItemChange, ItemChangeType, ListChange,
        ListChangeType, UpdateKey,
    },
    coordinator::{Commit, Coordinator},
    error::SyncError,
    fetch_queue::{EntityFuture, FetchQueue},
    handler::{FetchStatus, SyncHandler},
    shadow_records::ShadowRecords,
};
pub use transport::{error::TransportError, MessageReceiver, MessageSender};
