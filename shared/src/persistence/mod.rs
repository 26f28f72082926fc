pub mod error;
pub mod persistence_adapter;
pub mod store;
