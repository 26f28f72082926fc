//! Schemas and records shared by the end-to-end tests

use serde_json::{json, Value};

use graft_shared::GraphContext;

/// A plugin class with one setting
pub fn analog_clock() -> Value {
    json!({
        "$id": "AnalogClock",
        "allOf": [{ "$ref": "Plugin" }],
        "properties": {
            "color": { "type": "string", "default": "#ffffff" }
        }
    })
}

/// A plugin class with a list setting
pub fn ticker() -> Value {
    json!({
        "$id": "Ticker",
        "allOf": [{ "$ref": "Plugin" }],
        "properties": {
            "headlines": { "type": "array", "items": { "type": "string" }, "default": [] }
        },
        "required": ["headlines"]
    })
}

/// The core model plus `AnalogClock`
pub fn context() -> GraphContext {
    let mut ctx = GraphContext::default();
    let _ = ctx.add_schema(analog_clock());
    ctx
}

pub fn display(id: &str, x: f64, width: f64, height: f64) -> Value {
    json!({
        "id": id, "parentId": "Screen", "parentProperty": "displays",
        "className": "Display", "x": x, "width": width, "height": height,
        "browsers": {}
    })
}

pub fn browser(id: &str, display_id: &str, x: f64, y: f64) -> Value {
    json!({
        "id": id, "parentId": display_id, "parentProperty": "browsers",
        "className": "Browser", "x": x, "y": y, "width": 0.5, "height": 0.5,
        "plugins": {}
    })
}

pub fn clock(id: &str, browser_id: &str, color: &str) -> Value {
    json!({
        "id": id, "parentId": browser_id, "parentProperty": "plugins",
        "className": "AnalogClock", "color": color
    })
}

/// Root, Screen, `Display-1` (1920x1080) holding `Browser-1` at x 0.25
pub fn tree() -> Value {
    let mut root = context()
        .synthesize("Root", None, None, "")
        .unwrap_or(Value::Null);
    let mut display = display("Display-1", 0.0, 1920.0, 1080.0);
    display["browsers"]["Browser-1"] = browser("Browser-1", "Display-1", 0.25, 0.0);
    root["screen"]["displays"]["Display-1"] = display;
    root
}
