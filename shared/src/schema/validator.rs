use std::collections::BTreeMap;

use serde_json::Value;

use crate::{schema::class_fragment::ref_name, schema::composer::ComposedSchema, ValidationError};

/// Validates plain records against composed class schemas. Class `$ref`s are
/// resolved through the composed table the validator was built from.
pub struct Validator<'a> {
    composed: &'a BTreeMap<String, ComposedSchema>,
}

impl<'a> Validator<'a> {
    pub(crate) fn new(composed: &'a BTreeMap<String, ComposedSchema>) -> Self {
        Self { composed }
    }

    /// Validates `record` against the composed schema of `class_name`,
    /// returning every failed constraint
    pub fn validate_class(&self, class_name: &str, record: &Value) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        match self.composed.get(class_name) {
            Some(composed) => self.check(&composed.schema, record, &mut Vec::new(), &mut errors),
            None => errors.push(ValidationError::new(
                "/".to_string(),
                "$ref",
                format!("class {} has no composed schema", class_name),
            )),
        }
        errors
    }

    pub fn validate(&self, schema: &Value, value: &Value) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.check(schema, value, &mut Vec::new(), &mut errors);
        errors
    }

    fn is_valid(&self, schema: &Value, value: &Value, path: &mut Vec<String>) -> bool {
        let mut errors = Vec::new();
        self.check(schema, value, path, &mut errors);
        errors.is_empty()
    }

    // When every branch failed but only one of them accepts the value's type,
    // that branch's errors are more telling than the combinator's
    fn sole_candidate(
        &self,
        branches: &[Value],
        value: &Value,
        path: &mut Vec<String>,
    ) -> Option<Vec<ValidationError>> {
        let here = error(path, "", String::new()).path;
        let class_path = if here == "/" {
            "/className".to_string()
        } else {
            format!("{}/className", here)
        };
        let mut candidates = branches
            .iter()
            .map(|branch| {
                let mut branch_errors = Vec::new();
                self.check(branch, value, path, &mut branch_errors);
                branch_errors
            })
            .filter(|branch_errors| {
                !branch_errors.iter().any(|e| {
                    (e.path == here && e.keyword == "type")
                        || (e.path == class_path && e.keyword == "const")
                })
            });
        let first = candidates.next()?;
        match candidates.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    fn check(
        &self,
        schema: &Value,
        value: &Value,
        path: &mut Vec<String>,
        errors: &mut Vec<ValidationError>,
    ) {
        let Value::Object(schema) = schema else {
            // boolean schemas
            if schema == &Value::Bool(false) {
                errors.push(error(path, "false", "no value is allowed here".to_string()));
            }
            return;
        };

        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            let class_name = ref_name(reference);
            match self.composed.get(class_name) {
                Some(composed) => self.check(&composed.schema, value, path, errors),
                None => errors.push(error(
                    path,
                    "$ref",
                    format!("references unknown class {}", class_name),
                )),
            }
        }

        if let Some(expected) = schema.get("type") {
            let matches = match expected {
                Value::String(name) => type_matches(name, value),
                Value::Array(names) => names
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|name| type_matches(name, value)),
                _ => true,
            };
            if !matches {
                errors.push(error(
                    path,
                    "type",
                    format!("expected {}, got {}", expected, type_name(value)),
                ));
                return;
            }
        }

        if let Some(constant) = schema.get("const") {
            if constant != value {
                errors.push(error(path, "const", format!("must equal {}", constant)));
            }
        }

        if let Some(Value::Array(options)) = schema.get("enum") {
            if !options.contains(value) {
                errors.push(error(
                    path,
                    "enum",
                    format!("must be one of {}", Value::Array(options.clone())),
                ));
            }
        }

        if let Some(number) = value.as_f64() {
            check_number(schema, number, path, errors);
        }

        if let Some(text) = value.as_str() {
            let length = text.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
                if length < min {
                    errors.push(error(path, "minLength", format!("must have at least {} characters", min)));
                }
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
                if length > max {
                    errors.push(error(path, "maxLength", format!("must have at most {} characters", max)));
                }
            }
        }

        if let Value::Object(object) = value {
            self.check_object(schema, object, path, errors);
        }

        if let Value::Array(items) = value {
            self.check_array(schema, items, path, errors);
        }

        if let Some(Value::Array(branches)) = schema.get("allOf") {
            for branch in branches {
                self.check(branch, value, path, errors);
            }
        }

        if let Some(Value::Array(branches)) = schema.get("anyOf") {
            if !branches.iter().any(|branch| self.is_valid(branch, value, path)) {
                match self.sole_candidate(branches, value, path) {
                    Some(candidate_errors) => errors.extend(candidate_errors),
                    None => errors.push(error(
                        path,
                        "anyOf",
                        format!("must match at least one of {} schemas", branches.len()),
                    )),
                }
            }
        }

        if let Some(Value::Array(branches)) = schema.get("oneOf") {
            let matching = branches
                .iter()
                .filter(|branch| self.is_valid(branch, value, path))
                .count();
            let candidate = if matching == 0 {
                self.sole_candidate(branches, value, path)
            } else {
                None
            };
            if let Some(candidate_errors) = candidate {
                errors.extend(candidate_errors);
            } else if matching != 1 {
                errors.push(error(
                    path,
                    "oneOf",
                    format!(
                        "must match exactly one of {} schemas, matched {}",
                        branches.len(),
                        matching
                    ),
                ));
            }
        }

        if let Some(negated) = schema.get("not") {
            if self.is_valid(negated, value, path) {
                errors.push(error(path, "not", "must not match the negated schema".to_string()));
            }
        }
    }

    fn check_object(
        &self,
        schema: &serde_json::Map<String, Value>,
        object: &serde_json::Map<String, Value>,
        path: &mut Vec<String>,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    errors.push(error(
                        path,
                        "required",
                        format!("missing required property '{}'", name),
                    ));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        if let Some(properties) = properties {
            for (name, property_schema) in properties {
                if let Some(property_value) = object.get(name) {
                    path.push(name.clone());
                    self.check(property_schema, property_value, path, errors);
                    path.pop();
                }
            }
        }

        if let Some(additional) = schema.get("additionalProperties") {
            for (name, property_value) in object {
                if properties.map(|p| p.contains_key(name)).unwrap_or(false) {
                    continue;
                }
                path.push(name.clone());
                match additional {
                    Value::Bool(false) => {
                        errors.push(error(path, "additionalProperties", "property is not allowed".to_string()));
                    }
                    Value::Bool(true) => {}
                    additional_schema => self.check(additional_schema, property_value, path, errors),
                }
                path.pop();
            }
        }
    }

    fn check_array(
        &self,
        schema: &serde_json::Map<String, Value>,
        items: &[Value],
        path: &mut Vec<String>,
        errors: &mut Vec<ValidationError>,
    ) {
        let length = items.len() as u64;
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
            if length < min {
                errors.push(error(path, "minItems", format!("must have at least {} items", min)));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
            if length > max {
                errors.push(error(path, "maxItems", format!("must have at most {} items", max)));
            }
        }
        if let Some(item_schema) = schema.get("items") {
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                self.check(item_schema, item, path, errors);
                path.pop();
            }
        }
    }
}

fn check_number(
    schema: &serde_json::Map<String, Value>,
    number: f64,
    path: &[String],
    errors: &mut Vec<ValidationError>,
) {
    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        if number < min {
            errors.push(error(path, "minimum", format!("must be >= {}", min)));
        }
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        if number > max {
            errors.push(error(path, "maximum", format!("must be <= {}", max)));
        }
    }
    if let Some(min) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
        if number <= min {
            errors.push(error(path, "exclusiveMinimum", format!("must be > {}", min)));
        }
    }
    if let Some(max) = schema.get("exclusiveMaximum").and_then(Value::as_f64) {
        if number >= max {
            errors.push(error(path, "exclusiveMaximum", format!("must be < {}", max)));
        }
    }
}

fn type_matches(name: &str, value: &Value) -> bool {
    match name {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().map(|n| n.fract() == 0.0).unwrap_or(false)
        }
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn error(path: &[String], keyword: &str, message: String) -> ValidationError {
    let pointer = if path.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", path.join("/"))
    };
    ValidationError::new(pointer, keyword, message)
}
