//! # Graft Client
//! A Dependent of a graft graph: holds a partial replica of the configuration
//! tree, loaded from local storage or fetched from the Authority, forwards
//! local changes to the Authority and applies the changes it relays.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use graft_shared::{
        builtin, constants, Change, Commit, ConnectionConfig, Entity, EntityId, FileStore,
        GraphContext, MemoryStore, Message, MessageReceiver, MessageSender, Registration,
        SchemaRegistry, Store, TransportError,
    };
}

mod connection;
mod dependent;
mod error;
mod events;
mod plugin;

pub use dependent::{dependent::Dependent, dependent_config::DependentConfig};
pub use error::DependentError;
pub use events::{
    AddSchemaEvent, ChangeEvent, DependentEvent, DependentEvents, ErrorEvent, SnapshotEvent,
};
pub use plugin::plugin_view::{Bounds, PluginView};
