//! Argument validation against the generated input schemas.
//!
//! Only the subset of JSON Schema the `Tool` derive emits is understood:
//! object type, required fields, `additionalProperties: false` and primitive
//! or array property types.

use crate::error::EngineError;
use serde_json::{Map, Value};

pub fn validate_args(schema: &Value, args: &Value) -> Result<(), EngineError> {
    let args = args
        .as_object()
        .ok_or_else(|| violation("arguments must be a JSON object"))?;

    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for field in &required {
        if !args.contains_key(*field) {
            return Err(violation(format!("missing required field '{field}'")));
        }
    }

    for (name, value) in args {
        match properties.get(name) {
            None if closed => return Err(violation(format!("unknown field '{name}'"))),
            None => {}
            Some(_) if value.is_null() && !required.contains(&name.as_str()) => {}
            Some(property) => check_type(property, value, name)?,
        }
    }

    Ok(())
}

fn check_type(property: &Value, value: &Value, path: &str) -> Result<(), EngineError> {
    let Some(expected) = property.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    let matches = match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => match (value.as_array(), property.get("items")) {
            (Some(items), Some(item_schema)) => {
                for (i, item) in items.iter().enumerate() {
                    check_type(item_schema, item, &format!("{path}[{i}]"))?;
                }
                true
            }
            (Some(_), None) => true,
            (None, _) => false,
        },
        _ => true,
    };

    if matches {
        Ok(())
    } else {
        Err(violation(format!("field '{path}' must be of type {expected}")))
    }
}

fn violation(message: impl Into<String>) -> EngineError {
    EngineError::SchemaViolation(message.into())
}
