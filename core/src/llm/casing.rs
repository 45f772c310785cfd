//! Field-name casing between internal snake_case and a provider's wire
//! convention. Only provider mapping functions call into this module.

use crate::config::ArgumentCase;
use serde_json::{Map, Value};

/// `file_name` -> `fileName`
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, c) in name.chars().enumerate() {
        if c == '_' && i > 0 {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `fileName` -> `file_name`. Already snake_case names pass through.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn wire_name(name: &str, case: ArgumentCase) -> String {
    match case {
        ArgumentCase::Snake => name.to_string(),
        ArgumentCase::Camel => to_camel_case(name),
    }
}

/// Rename property names (and `required` entries) of a JSON schema into the
/// wire case, descending into nested object and array schemas.
pub fn schema_to_wire(schema: &Value, case: ArgumentCase) -> Value {
    if case == ArgumentCase::Snake {
        return schema.clone();
    }

    let Value::Object(object) = schema else {
        return schema.clone();
    };

    let mut out = Map::with_capacity(object.len());
    for (key, value) in object {
        let mapped = match (key.as_str(), value) {
            ("properties", Value::Object(properties)) => Value::Object(
                properties
                    .iter()
                    .map(|(name, sub)| (wire_name(name, case), schema_to_wire(sub, case)))
                    .collect(),
            ),
            ("required", Value::Array(names)) => Value::Array(
                names
                    .iter()
                    .map(|n| match n {
                        Value::String(s) => Value::String(wire_name(s, case)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            ("items", sub) => schema_to_wire(sub, case),
            _ => value.clone(),
        };
        out.insert(key.clone(), mapped);
    }
    Value::Object(out)
}

/// Rename argument keys into the wire case (for replaying earlier calls)
pub fn arguments_to_wire(arguments: &Value, case: ArgumentCase) -> Value {
    match case {
        ArgumentCase::Snake => arguments.clone(),
        ArgumentCase::Camel => rename_keys(arguments, &to_camel_case),
    }
}

/// Normalise argument keys coming back from the provider to snake_case
pub fn arguments_from_wire(arguments: Value, case: ArgumentCase) -> Value {
    match case {
        ArgumentCase::Snake => arguments,
        ArgumentCase::Camel => rename_keys(&arguments, &to_snake_case),
    }
}

fn rename_keys(value: &Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(k, v)| (rename(k), rename_keys(v, rename)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| rename_keys(v, rename)).collect()),
        other => other.clone(),
    }
}
