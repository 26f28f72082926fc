//! What a plugin gets to see of the graph: its own settings and the
//! rectangle it occupies on its display.

use serde::Serialize;
use serde_json::{Map, Value};

use graft_shared::{constants::is_header_field, Entity, EntityId, Graph, SchemaRegistry};

use crate::DependentError;

const PLUGIN_CLASS: &str = "Plugin";
const BROWSER_CLASS: &str = "Browser";
const DISPLAY_CLASS: &str = "Display";

/// An axis-aligned rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    fn of(entity: &Entity) -> Option<Self> {
        let number = |name: &str| entity.value(name).and_then(Value::as_f64);
        Some(Self {
            x: number("x")?,
            y: number("y")?,
            width: number("width")?,
            height: number("height")?,
        })
    }

    /// Maps a rectangle given in fractions of `outer` into `outer`'s space
    pub fn scale_into(&self, outer: &Bounds) -> Bounds {
        Bounds {
            x: outer.x + self.x * outer.width,
            y: outer.y + self.y * outer.height,
            width: self.width * outer.width,
            height: self.height * outer.height,
        }
    }
}

/// Read-only view of a plugin entity
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginView {
    pub id: EntityId,
    pub class_name: String,
    pub name: String,
    /// Visible, non-header properties in shallow form
    pub settings: Map<String, Value>,
    /// The browser's relative rectangle scaled into its display, if both are
    /// loaded
    pub scaled_bounds: Option<Bounds>,
}

/// Fails with `NotAPlugin` unless `id` is loaded and is a Plugin
pub(crate) fn plugin_entity<'a>(
    graph: &'a Graph,
    schemas: &SchemaRegistry,
    id: &EntityId,
) -> Result<&'a Entity, DependentError> {
    let Some(entity) = graph.get(id) else {
        return Err(DependentError::NotLoaded { id: id.to_string() });
    };
    if !schemas.is_a(entity.class_name(), PLUGIN_CLASS) {
        return Err(DependentError::NotAPlugin {
            id: id.to_string(),
            class_name: entity.class_name().to_string(),
        });
    }
    Ok(entity)
}

pub(crate) fn plugin_view(
    graph: &Graph,
    schemas: &SchemaRegistry,
    id: &EntityId,
) -> Result<PluginView, DependentError> {
    let entity = plugin_entity(graph, schemas, id)?;

    let mut settings = Map::new();
    if let Some(schema) = schemas.simplified(entity.class_name()) {
        for property in schema.visible_properties() {
            if is_header_field(&property.name) {
                continue;
            }
            if let Some(value) = graph.property_value(id, &property.name) {
                settings.insert(property.name.clone(), value);
            }
        }
    }

    Ok(PluginView {
        id: id.clone(),
        class_name: entity.class_name().to_string(),
        name: entity.name().to_string(),
        settings,
        scaled_bounds: scaled_bounds(graph, schemas, id),
    })
}

pub(crate) fn scaled_bounds(graph: &Graph, schemas: &SchemaRegistry, id: &EntityId) -> Option<Bounds> {
    let browser = graph
        .parent(id)
        .filter(|browser| schemas.is_a(browser.class_name(), BROWSER_CLASS))?;
    let display = graph
        .parent(browser.id())
        .filter(|display| schemas.is_a(display.class_name(), DISPLAY_CLASS))?;
    Some(Bounds::of(browser)?.scale_into(&Bounds::of(display)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_relative_bounds_into_display() {
        let display = Bounds {
            x: 1920.0,
            y: 0.0,
            width: 1920.0,
            height: 1080.0,
        };
        let browser = Bounds {
            x: 0.25,
            y: 0.5,
            width: 0.5,
            height: 0.5,
        };

        assert_eq!(
            browser.scale_into(&display),
            Bounds {
                x: 2400.0,
                y: 540.0,
                width: 960.0,
                height: 540.0,
            }
        );
    }
}
