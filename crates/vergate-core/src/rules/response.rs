//! Response adaptation: one version band's response back into the canonical
//! shape
//!
//! Field renames apply recursively at every object level; fields with no
//! rename entry pass through unchanged, so newer servers can add fields
//! without breaking older callers. After renaming, sub-objects marked for
//! flattening are merged into their parent (parent keys win); the classic
//! case is a legacy credentials sub-object folded into the user record.

use serde_json::{Map, Value};

use super::{FieldRename, ResponseShape};

/// Map a raw response body to the canonical shape
pub fn adapt_response(shape: &ResponseShape, raw: &Value) -> Value {
    let renamed = rename_fields(raw, &shape.field_renames);
    flatten_marked(renamed, &shape.flatten)
}

fn rename_fields(value: &Value, renames: &[FieldRename]) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, child) in map {
                let canonical = renames
                    .iter()
                    .find(|rename| rename.remote == *key)
                    .map(|rename| rename.canonical.clone())
                    .unwrap_or_else(|| key.clone());
                out.insert(canonical, rename_fields(child, renames));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| rename_fields(item, renames))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn flatten_marked(value: Value, flatten: &[String]) -> Value {
    if flatten.is_empty() {
        return value;
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            let mut lifted: Vec<Map<String, Value>> = Vec::new();
            for (key, child) in map {
                let child = flatten_marked(child, flatten);
                if flatten.contains(&key) {
                    if let Value::Object(sub) = child {
                        lifted.push(sub);
                        continue;
                    }
                }
                out.insert(key, child);
            }
            for sub in lifted {
                for (key, value) in sub {
                    out.entry(key).or_insert(value);
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| flatten_marked(item, flatten))
                .collect(),
        ),
        other => other,
    }
}
