pub mod entity_builder;
pub mod entity_factory;
