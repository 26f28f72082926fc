pub mod builtin;
pub mod class_fragment;
pub mod composer;
pub mod error;
pub mod schema_registry;
pub mod simplified_schema;
pub mod validator;
