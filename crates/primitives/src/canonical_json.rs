//! Deterministic JSON used for sign bytes: object keys sorted at every level,
//! no insignificant whitespace.

use serde::Serialize;
use serde_json::{Map, Value};

/// Serializes `v` with object keys sorted recursively.
pub fn to_sorted_vec<T: Serialize + ?Sized>(v: &T) -> serde_json::Result<Vec<u8>> {
    let value = serde_json::to_value(v)?;
    serde_json::to_vec(&sort_value(value))
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_value(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}
