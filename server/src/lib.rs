//! # Graft Server
//! The Authority of a graft graph: owns the canonical configuration tree,
//! writes it to durable storage, and relays every change to the Dependents
//! listening to the changed entity.

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

mod authority;
mod connection;
mod error;
mod events;

pub use authority::{authority::Authority, authority_config::AuthorityConfig};
pub use connection::connection::{Connection, ConnectionKey, Listener};
pub use error::AuthorityError;
pub use events::{
    AddSchemaEvent, AuthorityEvent, AuthorityEvents, ChangeEvent, ConnectEvent, DisconnectEvent,
    ErrorEvent, InitEvent,
};
