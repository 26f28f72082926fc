use serde_json::Value;

use crate::{
    Entity, EntityBuilder, EntityError, EntityFactory, EntityId, Registration, SchemaError,
    SchemaRegistry,
};

/// The schema registry and entity factory of one graph.
///
/// Every coordinator owns its own context, so several graphs can live side
/// by side in a single process.
pub struct GraphContext {
    pub schemas: SchemaRegistry,
    pub factory: EntityFactory,
}

impl Default for GraphContext {
    fn default() -> Self {
        Self::new(SchemaRegistry::with_core_model())
    }
}

impl GraphContext {
    pub fn new(schemas: SchemaRegistry) -> Self {
        let mut factory = EntityFactory::new();
        for class_name in schemas.class_names() {
            factory.register_default(class_name);
        }
        Self { schemas, factory }
    }

    /// Registers a class fragment; a schema-only class gets the default builder
    pub fn add_schema(&mut self, fragment: Value) -> Result<Registration, SchemaError> {
        let registration = self.schemas.register(fragment)?;
        for class_name in self.schemas.class_names() {
            self.factory.register_default(class_name);
        }
        Ok(registration)
    }

    pub fn register_builder<B: EntityBuilder>(
        &mut self,
        class_name: &str,
        builder: B,
    ) -> Result<(), EntityError> {
        self.factory.register(class_name, builder)
    }

    pub fn create(&mut self, record: Value) -> Result<Vec<Entity>, EntityError> {
        self.factory.create(&self.schemas, record)
    }

    /// `create`, linking the nested entities for which `held` is true
    /// instead of constructing them
    pub fn create_around(
        &mut self,
        record: Value,
        held: &dyn Fn(&EntityId) -> bool,
    ) -> Result<Vec<Entity>, EntityError> {
        self.factory.create_around(&self.schemas, record, held)
    }

    pub fn synthesize(
        &self,
        class_name: &str,
        id: Option<EntityId>,
        parent_id: Option<EntityId>,
        parent_property: &str,
    ) -> Result<Value, SchemaError> {
        self.schemas
            .synthesize(class_name, id, parent_id, parent_property)
    }
}
