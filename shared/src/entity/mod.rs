pub mod container;
pub mod entity;
pub mod entity_id;
pub mod error;
pub mod list;
pub mod property;
