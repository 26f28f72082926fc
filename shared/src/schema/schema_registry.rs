use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde_json::{json, Map, Value};

use crate::{
    constants::{
        CLASS_NAME_FIELD, ID_FIELD, NAME_FIELD, PARENT_ID_FIELD, PARENT_PROPERTY_FIELD,
    },
    schema::{
        builtin,
        class_fragment::{ClassFragment, Singleton},
        composer::{self, ComposedSchema},
        validator::Validator,
    },
    EntityId, PropertyShape, SchemaError, SimplifiedSchema, ValidationError,
};

/// Outcome of a successful fragment registration
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Registration {
    Added,
    /// The identical fragment was already registered
    Unchanged,
}

/// Holds every known class fragment and the composed schema of each class.
///
/// Every registration recomposes the whole table, so abstract references
/// pick up concrete subclasses announced after the referring class.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    fragments: BTreeMap<String, ClassFragment>,
    order: Vec<String>,
    composed: BTreeMap<String, ComposedSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the core model (Entity, Root, Screen, Display,
    /// Browser, Plugin)
    pub fn with_core_model() -> Self {
        let mut registry = Self::new();
        for fragment in builtin::core_fragments() {
            if let Err(error) = registry.register(fragment) {
                warn!("Core model fragment rejected: {}", error);
            }
        }
        registry
    }

    pub fn register(&mut self, raw: Value) -> Result<Registration, SchemaError> {
        let fragment = ClassFragment::parse(raw)?;
        let class_name = fragment.class_name().to_string();

        if let Some(existing) = self.fragments.get(&class_name) {
            if existing.raw() == fragment.raw() {
                debug!("Class {} already registered", class_name);
                return Ok(Registration::Unchanged);
            }
            return Err(SchemaError::Conflict { class_name });
        }

        self.fragments.insert(class_name.clone(), fragment);

        // a base that is not registered yet may still arrive later, anything
        // else is a broken fragment
        match composer::compose(&class_name, &self.fragments) {
            Ok(_) | Err(SchemaError::UnknownClass { .. }) => {}
            Err(error) => {
                self.fragments.remove(&class_name);
                return Err(error);
            }
        }

        self.order.push(class_name.clone());
        self.recompose();
        info!("Registered class {}", class_name);

        Ok(Registration::Added)
    }

    /// Registers every fragment in order, stopping at the first error
    pub fn register_all<I: IntoIterator<Item = Value>>(
        &mut self,
        fragments: I,
    ) -> Result<(), SchemaError> {
        for fragment in fragments {
            self.register(fragment)?;
        }
        Ok(())
    }

    fn recompose(&mut self) {
        self.composed.clear();
        for class_name in self.fragments.keys() {
            match composer::compose(class_name, &self.fragments) {
                Ok(composed) => {
                    self.composed.insert(class_name.clone(), composed);
                }
                Err(error) => {
                    warn!("Could not compose class {}: {}", class_name, error);
                }
            }
        }
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.fragments.contains_key(class_name)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    pub fn fragment(&self, class_name: &str) -> Option<&ClassFragment> {
        self.fragments.get(class_name)
    }

    /// Raw fragments in registration order, ready to be re-registered elsewhere
    pub fn fragments(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|class_name| self.fragments.get(class_name))
            .map(|fragment| fragment.raw().clone())
            .collect()
    }

    pub fn composed(&self, class_name: &str) -> Option<&ComposedSchema> {
        self.composed.get(class_name)
    }

    pub fn schema(&self, class_name: &str) -> Option<&Value> {
        self.composed.get(class_name).map(|composed| &composed.schema)
    }

    pub fn simplified(&self, class_name: &str) -> Option<&SimplifiedSchema> {
        self.composed
            .get(class_name)
            .map(|composed| &composed.simplified)
    }

    pub fn is_abstract(&self, class_name: &str) -> bool {
        self.fragments
            .get(class_name)
            .map(ClassFragment::is_abstract)
            .unwrap_or(false)
    }

    pub fn singleton(&self, class_name: &str) -> Option<&Singleton> {
        self.fragments.get(class_name).and_then(ClassFragment::singleton)
    }

    /// The singleton class whose instances carry `id`, if any
    pub fn singleton_for(&self, id: &EntityId) -> Option<&ClassFragment> {
        self.fragments
            .get(id.as_str())
            .filter(|fragment| fragment.singleton().is_some())
    }

    pub fn concrete_subclasses(&self, base: &str) -> Vec<String> {
        composer::concrete_subclasses(base, &self.fragments)
    }

    /// True if `class_name` is `base` or one of its concrete subclasses
    pub fn is_a(&self, class_name: &str, base: &str) -> bool {
        class_name == base || self.concrete_subclasses(base).iter().any(|c| c == class_name)
    }

    pub fn validator(&self) -> Validator<'_> {
        Validator::new(&self.composed)
    }

    pub fn validate(&self, class_name: &str, record: &Value) -> Result<(), Vec<ValidationError>> {
        let errors = self.validator().validate_class(class_name, record);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Back-fills every required property missing from `record` that has a
    /// `const` or `default`; required containers and lists start empty.
    /// Nested records are left to their own pass.
    pub fn fill_defaults(&self, class_name: &str, record: &mut Map<String, Value>) {
        let Some(composed) = self.composed(class_name) else {
            return;
        };
        let Some(Value::Array(required)) = composed.schema.get("required") else {
            return;
        };
        let properties = composed.schema.get("properties").and_then(Value::as_object);
        for name in required.iter().filter_map(Value::as_str) {
            if record.contains_key(name) {
                continue;
            }
            let fill = properties
                .and_then(|properties| properties.get(name))
                .and_then(|property| property.get("const").or_else(|| property.get("default")))
                .cloned()
                .or_else(|| match composed.simplified.shape(name) {
                    Some(PropertyShape::Container { .. }) => Some(json!({})),
                    Some(PropertyShape::List { .. }) => Some(json!([])),
                    _ => None,
                });
            if let Some(fill) = fill {
                record.insert(name.to_string(), fill);
            }
        }
    }

    /// Builds a fresh record of `class_name` from schema defaults. Containers
    /// start empty, lists empty, and required nested entities are synthesized
    /// recursively.
    pub fn synthesize(
        &self,
        class_name: &str,
        id: Option<EntityId>,
        parent_id: Option<EntityId>,
        parent_property: &str,
    ) -> Result<Value, SchemaError> {
        let Some(fragment) = self.fragments.get(class_name) else {
            return Err(SchemaError::UnknownClass {
                class_name: class_name.to_string(),
            });
        };
        if fragment.is_abstract() {
            return Err(SchemaError::AbstractClass {
                class_name: class_name.to_string(),
            });
        }
        let Some(simplified) = self.simplified(class_name) else {
            return Err(SchemaError::UnknownClass {
                class_name: class_name.to_string(),
            });
        };

        let id = id.unwrap_or_else(|| self.default_id(class_name));
        let (parent_id, parent_property) = match (parent_id, fragment.singleton()) {
            (Some(parent_id), _) => (parent_id, parent_property.to_string()),
            (None, Some(singleton)) if singleton.parent_property.is_empty() => {
                (id.clone(), String::new())
            }
            (None, Some(singleton)) => {
                (singleton.parent_id.clone(), singleton.parent_property.clone())
            }
            (None, None) => (id.clone(), parent_property.to_string()),
        };

        let mut record = Map::new();
        record.insert(ID_FIELD.to_string(), json!(id));
        record.insert(PARENT_ID_FIELD.to_string(), json!(parent_id));
        record.insert(PARENT_PROPERTY_FIELD.to_string(), json!(parent_property));
        record.insert(CLASS_NAME_FIELD.to_string(), json!(class_name));
        record.insert(NAME_FIELD.to_string(), json!(""));

        for property in simplified.properties.values() {
            let value = match &property.shape {
                PropertyShape::Container { .. } => Some(json!({})),
                PropertyShape::List { .. } => Some(json!([])),
                PropertyShape::Entity { class_name: child_class } if property.required => {
                    if self.is_abstract(child_class) {
                        return Err(SchemaError::AbstractClass {
                            class_name: child_class.clone(),
                        });
                    }
                    Some(self.synthesize(
                        child_class,
                        Some(self.default_id(child_class)),
                        Some(id.clone()),
                        &property.name,
                    )?)
                }
                PropertyShape::Entity { .. } => None,
                PropertyShape::Scalar => property.fill_value().cloned(),
            };
            if let Some(value) = value {
                record.insert(property.name.clone(), value);
            }
        }

        self.fill_defaults(class_name, &mut record);

        Ok(Value::Object(record))
    }

    fn default_id(&self, class_name: &str) -> EntityId {
        match self.singleton(class_name) {
            Some(_) => EntityId::new(class_name),
            None => EntityId::generate(class_name),
        }
    }
}
