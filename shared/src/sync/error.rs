use thiserror::Error;

use crate::{ConnectionError, EntityError, PersistenceError, SchemaError};

/// Errors that can occur while synchronizing a graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// Entity construction or mutation error
    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Persistence error
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A remote update names an entity that is neither cached nor loadable
    #[error("Remote update targets entity {id}, which is neither cached nor loadable")]
    MissingTarget {
        id: String,
    },

    /// No source can provide the entity
    #[error("Entity {id} is not available from any source")]
    Unavailable {
        id: String,
    },

    /// Only the `name` header field may be written
    #[error("Field {field} of entity {id} cannot be changed")]
    ImmutableField {
        id: String,
        field: String,
    },

    /// The root has no parent to be removed from
    #[error("The root entity {id} cannot be deleted")]
    RootDeletion {
        id: String,
    },

    /// The entity is not referenced by its parent
    #[error("Entity {id} is not referenced by its parent {parent_id}")]
    Orphan {
        id: String,
        parent_id: String,
    },

    /// The fetch queue was dropped before the request resolved
    #[error("Fetch of entity {id} was dropped before it resolved")]
    FetchDropped {
        id: String,
    },
}
