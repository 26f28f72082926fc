use serde_json::Value;

use crate::{Container, EntityId, List};

/// A typed attribute of an Entity, as declared by its class schema
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    /// Scalar or plain structured value
    Value(Value),
    /// Nested child Entity, `None` when the property is null
    Entity(Option<EntityId>),
    Container(Container),
    List(List),
}

impl Property {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Property::Value(_) => "value",
            Property::Entity(_) => "entity",
            Property::Container(_) => "container",
            Property::List(_) => "list",
        }
    }
}
