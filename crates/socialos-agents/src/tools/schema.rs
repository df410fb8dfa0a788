//! Argument preparation ahead of schema validation.

use serde_json::{Map, Value};

/// Fill in top-level `default`s declared by `schema`.
///
/// A `null` payload becomes an empty object. Anything else that is not an
/// object is returned untouched so the validator reports it.
pub fn apply_defaults(schema: &Value, args: Value) -> Value {
    let mut object = match args {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return other,
    };

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            if !object.contains_key(name)
                && let Some(default) = property.get("default")
            {
                object.insert(name.clone(), default.clone());
            }
        }
    }

    Value::Object(object)
}
