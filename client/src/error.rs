use thiserror::Error;

use graft_shared::{ConnectionError, PersistenceError, SchemaError, SyncError};

/// Errors raised by a Dependent
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DependentError {
    /// Graph synchronization error
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Local storage error
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Schema registration error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Properties marked `viewOnly` are written by the Authority only
    #[error("Property {property} of {id} is view-only")]
    ViewOnlyProperty {
        id: String,
        property: String,
    },

    /// Plugins may only report `volatile` properties
    #[error("Property {property} of plugin {id} is not volatile and cannot be reported")]
    NotVolatile {
        id: String,
        property: String,
    },

    /// The entity is not an instance of a Plugin class
    #[error("Entity {id} of class {class_name} is not a plugin")]
    NotAPlugin {
        id: String,
        class_name: String,
    },

    /// The entity is not in the local graph
    #[error("Entity {id} is not loaded")]
    NotLoaded {
        id: String,
    },

    /// A message that only a Dependent sends arrived from the Authority
    #[error("The Authority sent a {kind} message, which only Dependents send")]
    UnexpectedMessage {
        kind: &'static str,
    },
}
