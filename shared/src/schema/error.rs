use std::fmt;

use thiserror::Error;

/// A single failed constraint found while validating a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// JSON pointer to the failing value, `/` for the record itself
    pub path: String,
    /// The schema keyword that failed
    pub keyword: String,
    /// The expected constraint
    pub message: String,
}

impl ValidationError {
    pub fn new(path: String, keyword: &str, message: String) -> Self {
        Self {
            path,
            keyword: keyword.to_string(),
            message,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.path, self.keyword, self.message)
    }
}

/// Errors that can occur while registering or composing class schemas
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Fragment is not a JSON object
    #[error("Schema fragment must be an object, got: {fragment}")]
    NotAnObject { fragment: String },

    /// Fragment carries no `$id` naming its class
    #[error("Schema fragment has no $id: {fragment}")]
    MissingId { fragment: String },

    /// A different fragment is already registered under the class name
    #[error("Class {class_name} is already registered with a different schema")]
    Conflict { class_name: String },

    /// A class was referenced that the registry does not know
    #[error("Class {class_name} is not registered")]
    UnknownClass { class_name: String },

    /// A class inherits from itself through its `allOf` chain
    #[error("Class {class_name} inherits from itself")]
    CyclicInheritance { class_name: String },

    /// A keyword of the fragment has an unusable value
    #[error("Invalid schema for class {class_name}: {reason}")]
    InvalidFragment { class_name: String, reason: String },

    /// An abstract class cannot be instantiated
    #[error("Class {class_name} is abstract")]
    AbstractClass { class_name: String },
}
