use thiserror::Error;

use graft_shared::{ConnectionError, PersistenceError, SchemaError, SyncError};

/// Errors raised by the Authority
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthorityError {
    /// Graph synchronization error
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Durable storage error
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Schema registration error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A second `init` arrived while re-initialization is not allowed
    #[error("Connection {connection} sent init, but the Authority was already initialized by connection {owner}. Enable allow_reinit to accept it")]
    AlreadyInitialized {
        connection: u64,
        owner: u64,
    },

    /// No connection is registered under this key
    #[error("Connection {key} does not exist")]
    UnknownConnection {
        key: u64,
    },

    /// A Dependent tried to write a property marked `viewOnly`
    #[error("Property {property} of {id} is view-only and cannot be written by a Dependent")]
    ViewOnlyProperty {
        id: String,
        property: String,
    },

    /// A message that only the Authority sends arrived from a Dependent
    #[error("Connection {connection} sent a {kind} message, which only the Authority sends")]
    UnexpectedMessage {
        connection: u64,
        kind: &'static str,
    },
}
