use thiserror::Error;

use crate::SchemaError;

/// Errors that can occur while reading or writing durable records
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// A stored record cannot be parsed
    #[error("Stored record {id} is corrupt: {reason}")]
    Corrupt {
        id: String,
        reason: String,
    },

    /// A stored record parses but does not describe a valid entity
    #[error("Stored record {id} is invalid: {reason}")]
    Invalid {
        id: String,
        reason: String,
    },

    /// The backing store failed
    #[error("Store operation on key {key} failed: {reason}")]
    Store {
        key: String,
        reason: String,
    },

    /// A record could not be serialized
    #[error("Record {id} could not be encoded: {reason}")]
    Encode {
        id: String,
        reason: String,
    },

    /// A record to persist carries no id
    #[error("Cannot persist a record without an id: {record}")]
    MissingId {
        record: String,
    },

    /// A singleton could not be synthesized during recovery
    #[error("Schema error during recovery: {0}")]
    Schema(#[from] SchemaError),
}
