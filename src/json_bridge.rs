//! JSON <-> Datum conversion
//!
//! Lowering a `Datum` to JSON is total: kinds JSON cannot represent are
//! converted to their textual form, so the original kind is lost on a
//! round-trip through the codec.

use crate::types::*;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Number, Value as JsonValue};

/// Convert JSON value to Datum
pub fn from_json(json: &JsonValue) -> Datum {
    match json {
        JsonValue::Null => Datum::Null,
        JsonValue::Bool(b) => Datum::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Datum::Int(i)
            } else if let Some(u) = n.as_u64() {
                Datum::UInt(u)
            } else {
                Datum::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => Datum::Str(s.clone()),
        JsonValue::Array(arr) => Datum::List(arr.iter().map(from_json).collect()),
        JsonValue::Object(obj) => {
            let entries: Vec<MapEntry> = obj
                .iter()
                .map(|(k, v)| MapEntry::new(k.clone(), from_json(v)))
                .collect();
            Datum::Map(entries)
        }
    }
}

/// Convert Datum to JSON value
pub fn to_json(d: &Datum) -> JsonValue {
    match d {
        Datum::Null => JsonValue::Null,
        Datum::Bool(b) => JsonValue::Bool(*b),
        Datum::Int(n) => JsonValue::Number(Number::from(*n)),
        Datum::UInt(n) => JsonValue::Number(Number::from(*n)),
        // NaN and the infinities have no JSON number form
        Datum::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(f.to_string())),
        Datum::Str(s) => JsonValue::String(s.clone()),
        Datum::Bytes(data) => JsonValue::String(BASE64.encode(data)),
        Datum::Time(t) => JsonValue::String(t.to_rfc3339()),
        Datum::List(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Datum::Map(entries) => {
            let mut map = Map::new();
            for entry in entries {
                map.insert(entry.key.clone(), to_json(&entry.value));
            }
            JsonValue::Object(map)
        }
    }
}
