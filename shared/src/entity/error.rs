use thiserror::Error;

use crate::ValidationError;

fn list_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|error| error.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while constructing or mutating Entities
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityError {
    /// No builder is registered for the record's class tag
    #[error("Unknown class {class_name}: no builder registered")]
    UnknownClass { class_name: String },

    /// A record carried no usable className
    #[error("Record has no className: {record}")]
    MissingClassName { record: String },

    /// A record was not shaped like an entity record
    #[error("Malformed record for {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    /// The record failed schema validation, nothing was constructed
    #[error("Record {id} of class {class_name} failed validation: {}", list_errors(.errors))]
    Validation {
        id: String,
        class_name: String,
        errors: Vec<ValidationError>,
    },

    /// An Entity with this id already exists in the process
    #[error("Entity id {id} is already in use")]
    DuplicateId { id: String },

    /// Two different builders were registered under one class
    #[error("Class {class_name} already has a different builder registered")]
    BuilderConflict { class_name: String },

    /// The Entity is not present in the instance table
    #[error("Entity {id} not found")]
    EntityNotFound { id: String },

    /// The Entity has no property of that name
    #[error("Entity {id} has no property {property}")]
    PropertyNotFound { id: String, property: String },

    /// The property exists but is of another kind
    #[error("Property {property} of entity {id} is a {actual}, expected a {expected}")]
    WrongPropertyKind {
        id: String,
        property: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Container operation on a key that does not exist
    #[error("Container {container} of entity {id} has no key {key}")]
    ContainerKeyNotFound {
        id: String,
        container: String,
        key: String,
    },

    /// Positional list operation outside of the list
    #[error("List index {index} out of bounds (length {len})")]
    ListIndexOutOfBounds { index: usize, len: usize },
}
