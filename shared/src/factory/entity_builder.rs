use std::any::TypeId;

use serde_json::{Map, Value};

use crate::{Entity, EntityError};

/// Finishes construction of an Entity of one class.
///
/// The factory builds the node (header, typed properties, children) from the
/// validated record, then hands it to the builder registered for its class.
/// Builders are compared by concrete type: registering the same builder type
/// twice for a class is a no-op.
pub trait EntityBuilder: 'static {
    fn build(&self, entity: Entity, _record: &Map<String, Value>) -> Result<Entity, EntityError> {
        Ok(entity)
    }

    fn builder_type(&self) -> TypeId {
        TypeId::of::<Self>()
    }
}

/// Builder for classes defined by their schema alone
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBuilder;

impl EntityBuilder for DefaultBuilder {}
