//! The core configuration model every graph starts from.
//!
//! Root holds the Screen, the Screen holds Displays by id, each Display holds
//! Browsers by id and each Browser holds Plugins by id. Plugin is abstract:
//! concrete plugin classes are registered at runtime.

use serde_json::{json, Value};

pub fn core_fragments() -> Vec<Value> {
    vec![entity(), root(), screen(), display(), browser(), plugin()]
}

pub fn entity() -> Value {
    json!({
        "$id": "Entity",
        "abstract": true,
        "properties": {
            "id": { "type": "string", "minLength": 1 },
            "parentId": { "type": "string", "minLength": 1 },
            "parentProperty": { "type": "string", "default": "" },
            "className": { "type": "string" },
            "name": { "type": "string", "default": "" }
        },
        "required": ["id", "parentId", "parentProperty", "className", "name"]
    })
}

pub fn root() -> Value {
    json!({
        "$id": "Root",
        "allOf": [{ "$ref": "Entity" }],
        "singleton": true,
        "properties": {
            "screen": { "$ref": "Screen" }
        },
        "required": ["screen"]
    })
}

pub fn screen() -> Value {
    json!({
        "$id": "Screen",
        "allOf": [{ "$ref": "Entity" }],
        "singleton": { "parentId": "Root", "parentProperty": "screen" },
        "properties": {
            "displays": {
                "type": "object",
                "additionalProperties": { "$ref": "Display" }
            }
        },
        "required": ["displays"]
    })
}

pub fn display() -> Value {
    json!({
        "$id": "Display",
        "allOf": [{ "$ref": "Entity" }],
        "properties": {
            "x": { "type": "number", "default": 0 },
            "y": { "type": "number", "default": 0 },
            "width": { "type": "number", "default": 0, "minimum": 0 },
            "height": { "type": "number", "default": 0, "minimum": 0 },
            "scaleFactor": { "type": "number", "default": 1, "exclusiveMinimum": 0, "viewOnly": true },
            "browsers": {
                "type": "object",
                "additionalProperties": { "$ref": "Browser" }
            }
        },
        "required": ["x", "y", "width", "height", "scaleFactor", "browsers"]
    })
}

pub fn browser() -> Value {
    json!({
        "$id": "Browser",
        "allOf": [{ "$ref": "Entity" }],
        "properties": {
            "x": { "type": "number", "default": 0, "minimum": 0, "maximum": 1 },
            "y": { "type": "number", "default": 0, "minimum": 0, "maximum": 1 },
            "width": { "type": "number", "default": 1, "minimum": 0, "maximum": 1 },
            "height": { "type": "number", "default": 1, "minimum": 0, "maximum": 1 },
            "visible": { "type": "boolean", "default": true },
            "plugins": {
                "type": "object",
                "additionalProperties": { "$ref": "Plugin" }
            }
        },
        "required": ["x", "y", "width", "height", "visible", "plugins"]
    })
}

pub fn plugin() -> Value {
    json!({
        "$id": "Plugin",
        "abstract": true,
        "allOf": [{ "$ref": "Entity" }],
        "properties": {
            "scaledBounds": {
                "type": "object",
                "volatile": true,
                "hidden": true,
                "properties": {
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "width": { "type": "number" },
                    "height": { "type": "number" }
                }
            },
            "fps": { "type": "number", "minimum": 0, "volatile": true, "hidden": true },
            "frameTime": { "type": "number", "minimum": 0, "volatile": true, "hidden": true }
        }
    })
}
