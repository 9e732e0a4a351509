//! Encoded node model and its JSON wire form
//!
//! Wire conventions:
//!
//! | Node       | Wire                                   |
//! |------------|----------------------------------------|
//! | `Text`     | `"~S<base64 utf-8>"`                   |
//! | `Bits`     | `"~T<base64>:<count>"`                 |
//! | `Packed`   | `"~B…"` `"~H…"` `"~I…"` `"~L…"` `"~D…"` |
//! | `Const`    | `{"c": <node>, "n": <count>}`          |
//! | `Delta`    | `{"s": <start>, "d": <step>, "n": <count>}` |
//! | `Prefix`   | `{"p": <prefix>, "x": [<suffix>, …]}`  |
//! | `Columnar` | `{"a": 1, "k": [<key>, …], "d": [<column node>, …]}` |
//!
//! A plain string starting with `~` is written as `~~…`. A plain object whose
//! key set collides with one of the record shapes above (or with `{o}`) is
//! wrapped as `{"o": {…}}`.

use crate::error::*;
use crate::pack::{DeltaRun, NumWidth, PackedBools, PackedNums};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Number, Value as JsonValue};

/// Leading character of every tagged string
pub const TAG: char = '~';

const TEXT_TAG: char = 'S';
const BITS_TAG: char = 'T';

/// Record shapes, identified by their exact key set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Const,
    Delta,
    Columnar,
    Prefix,
    Escaped,
}

const SHAPES: [(Shape, &[&str]); 5] = [
    (Shape::Const, &["c", "n"]),
    (Shape::Delta, &["s", "d", "n"]),
    (Shape::Columnar, &["a", "k", "d"]),
    (Shape::Prefix, &["p", "x"]),
    (Shape::Escaped, &["o"]),
];

fn shape_of(map: &Map<String, JsonValue>) -> Option<Shape> {
    SHAPES
        .iter()
        .find(|(_, keys)| map.len() == keys.len() && keys.iter().all(|k| map.contains_key(*k)))
        .map(|(shape, _)| *shape)
}

/// One compressed value
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    /// Plain string, emitted as-is (modulo `~` escaping)
    Str(String),
    /// String emitted as base64 of its UTF-8 bytes
    Text(String),
    /// `count` copies of one value
    Const { value: Box<Node>, count: usize },
    Delta(DeltaRun),
    Packed(PackedNums),
    Bits(PackedBools),
    /// Strings sharing a common prefix
    Prefix { prefix: String, suffixes: Vec<String> },
    /// Homogeneous objects stored column by column
    Columnar { keys: Vec<String>, columns: Vec<Node> },
    List(Vec<Node>),
    Object(Vec<(String, Node)>),
}

impl Node {
    /// Serialized size of this node's wire form in bytes.
    pub fn wire_len(&self) -> usize {
        serde_json::to_string(&self.to_wire())
            .map(|s| s.len())
            .unwrap_or(usize::MAX)
    }

    pub fn to_wire(&self) -> JsonValue {
        match self {
            Node::Null => JsonValue::Null,
            Node::Bool(b) => JsonValue::Bool(*b),
            Node::Number(n) => JsonValue::Number(n.clone()),
            Node::Str(s) => {
                if s.starts_with(TAG) {
                    JsonValue::String(format!("{TAG}{s}"))
                } else {
                    JsonValue::String(s.clone())
                }
            }
            Node::Text(s) => {
                JsonValue::String(format!("{TAG}{TEXT_TAG}{}", BASE64.encode(s.as_bytes())))
            }
            Node::Const { value, count } => {
                record([("c", value.to_wire()), ("n", (*count).into())])
            }
            Node::Delta(run) => {
                let (start, step): (JsonValue, JsonValue) = match *run {
                    DeltaRun::Int { start, step, .. } => (start.into(), step.into()),
                    DeltaRun::Float { start, step, .. } => (float(start), float(step)),
                };
                record([("s", start), ("d", step), ("n", run.count().into())])
            }
            Node::Packed(p) => JsonValue::String(format!(
                "{TAG}{}{}",
                p.width.tag(),
                BASE64.encode(&p.bytes)
            )),
            Node::Bits(b) => JsonValue::String(format!(
                "{TAG}{BITS_TAG}{}:{}",
                BASE64.encode(&b.bytes),
                b.count
            )),
            Node::Prefix { prefix, suffixes } => record([
                ("p", JsonValue::String(prefix.clone())),
                ("x", suffixes.iter().cloned().map(JsonValue::String).collect()),
            ]),
            Node::Columnar { keys, columns } => record([
                ("a", 1.into()),
                ("k", keys.iter().cloned().map(JsonValue::String).collect()),
                ("d", columns.iter().map(Node::to_wire).collect()),
            ]),
            Node::List(items) => JsonValue::Array(items.iter().map(Node::to_wire).collect()),
            Node::Object(entries) => {
                let map: Map<String, JsonValue> = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_wire()))
                    .collect();
                if shape_of(&map).is_some() {
                    record([("o", JsonValue::Object(map))])
                } else {
                    JsonValue::Object(map)
                }
            }
        }
    }

    pub fn from_wire(wire: &JsonValue) -> Result<Node> {
        match wire {
            JsonValue::Null => Ok(Node::Null),
            JsonValue::Bool(b) => Ok(Node::Bool(*b)),
            JsonValue::Number(n) => Ok(Node::Number(n.clone())),
            JsonValue::String(s) => parse_string(s),
            JsonValue::Array(items) => items
                .iter()
                .map(Node::from_wire)
                .collect::<Result<_>>()
                .map(Node::List),
            JsonValue::Object(map) => match shape_of(map) {
                Some(Shape::Const) => Ok(Node::Const {
                    value: Box::new(Node::from_wire(&map["c"])?),
                    count: count_field(map)?,
                }),
                Some(Shape::Delta) => parse_delta(map),
                Some(Shape::Columnar) => parse_columnar(map),
                Some(Shape::Prefix) => Ok(Node::Prefix {
                    prefix: string_field(&map["p"])?,
                    suffixes: array_field(&map["x"])?
                        .iter()
                        .map(string_field)
                        .collect::<Result<_>>()?,
                }),
                Some(Shape::Escaped) => match &map["o"] {
                    JsonValue::Object(inner) => object_entries(inner),
                    other => Err(CodecError::type_mismatch("escaped object", other)),
                },
                None => object_entries(map),
            },
        }
    }
}

fn record<const N: usize>(fields: [(&str, JsonValue); N]) -> JsonValue {
    JsonValue::Object(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn float(f: f64) -> JsonValue {
    Number::from_f64(f).map(JsonValue::Number).unwrap_or(JsonValue::Null)
}

fn object_entries(map: &Map<String, JsonValue>) -> Result<Node> {
    map.iter()
        .map(|(k, v)| Node::from_wire(v).map(|node| (k.clone(), node)))
        .collect::<Result<_>>()
        .map(Node::Object)
}

fn parse_string(s: &str) -> Result<Node> {
    let Some(rest) = s.strip_prefix(TAG) else {
        return Ok(Node::Str(s.to_string()));
    };
    let mut chars = rest.chars();
    let tag = chars.next();
    let payload = chars.as_str();

    match tag {
        Some(TAG) => Ok(Node::Str(rest.to_string())),
        Some(TEXT_TAG) => Ok(Node::Text(String::from_utf8(BASE64.decode(payload)?)?)),
        Some(BITS_TAG) => {
            let (data, count) = payload
                .split_once(':')
                .ok_or_else(|| CodecError::Malformed(format!("bit buffer without count: {s:?}")))?;
            let count: usize = count
                .parse()
                .map_err(|_| CodecError::Malformed(format!("bad bit count {count:?}")))?;
            Ok(Node::Bits(PackedBools::from_parts(BASE64.decode(data)?, count)?))
        }
        Some(c) => match NumWidth::from_tag(c) {
            Some(width) => Ok(Node::Packed(PackedNums::from_parts(width, BASE64.decode(payload)?)?)),
            None => Err(CodecError::UnknownTag(format!("{TAG}{c}"))),
        },
        None => Err(CodecError::UnknownTag(TAG.to_string())),
    }
}

fn count_field(map: &Map<String, JsonValue>) -> Result<usize> {
    let n = &map["n"];
    n.as_u64()
        .and_then(|c| usize::try_from(c).ok())
        .ok_or_else(|| CodecError::type_mismatch("element count", n))
}

fn parse_delta(map: &Map<String, JsonValue>) -> Result<Node> {
    let count = count_field(map)?;
    let (start, step) = (&map["s"], &map["d"]);
    let run = match (start, step) {
        (JsonValue::Number(s), JsonValue::Number(d)) if s.is_i64() && d.is_i64() => DeltaRun::Int {
            start: s.as_i64().unwrap_or_default(),
            step: d.as_i64().unwrap_or_default(),
            count,
        },
        (JsonValue::Number(s), JsonValue::Number(d)) if s.is_f64() && d.is_f64() => DeltaRun::Float {
            start: s.as_f64().unwrap_or_default(),
            step: d.as_f64().unwrap_or_default(),
            count,
        },
        (JsonValue::Number(_), JsonValue::Number(_)) => {
            return Err(CodecError::Malformed(format!(
                "delta run mixes integer and float: start {start}, step {step}"
            )))
        }
        (JsonValue::Number(_), other) | (other, _) => {
            return Err(CodecError::type_mismatch("number", other))
        }
    };
    Ok(Node::Delta(run))
}

fn parse_columnar(map: &Map<String, JsonValue>) -> Result<Node> {
    if map["a"].as_u64() != Some(1) {
        return Err(CodecError::Malformed(format!("columnar marker is {}", map["a"])));
    }
    let keys: Vec<String> = array_field(&map["k"])?
        .iter()
        .map(string_field)
        .collect::<Result<_>>()?;
    let columns: Vec<Node> = array_field(&map["d"])?
        .iter()
        .map(Node::from_wire)
        .collect::<Result<_>>()?;

    if keys.is_empty() {
        return Err(CodecError::Malformed("columnar record without keys".into()));
    }
    if keys.len() != columns.len() {
        return Err(CodecError::LengthMismatch {
            expected: keys.len(),
            got: columns.len(),
        });
    }
    Ok(Node::Columnar { keys, columns })
}

fn array_field(v: &JsonValue) -> Result<&Vec<JsonValue>> {
    v.as_array().ok_or_else(|| CodecError::type_mismatch("array", v))
}

fn string_field(v: &JsonValue) -> Result<String> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| CodecError::type_mismatch("string", v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_tilde_strings_are_escaped() {
        let node = Node::Str("~home".into());
        assert_eq!(node.to_wire(), json!("~~home"));
        assert_eq!(Node::from_wire(&json!("~~home")).unwrap(), node);
    }

    #[test]
    fn test_text_tag_roundtrip() {
        let node = Node::Text("héllo".into());
        let wire = node.to_wire();
        assert!(wire.as_str().unwrap().starts_with("~S"));
        assert_eq!(Node::from_wire(&wire).unwrap(), node);
    }

    #[test]
    fn test_bits_wire_form() {
        let node = Node::Bits(PackedBools::pack(&[true, false, true, true, false]));
        assert_eq!(node.to_wire(), json!("~TDQ==:5"));
        assert_eq!(Node::from_wire(&json!("~TDQ==:5")).unwrap(), node);
    }

    #[test]
    fn test_packed_wire_form() {
        let node = Node::Packed(PackedNums {
            width: NumWidth::I8,
            bytes: vec![1, 2, 3],
        });
        assert_eq!(node.to_wire(), json!("~BAQID"));
        assert_eq!(Node::from_wire(&json!("~BAQID")).unwrap(), node);
    }

    #[test]
    fn test_marker_shaped_objects_are_wrapped() {
        let node = Node::Object(vec![
            ("c".into(), Node::Number(1.into())),
            ("n".into(), Node::Number(2.into())),
        ]);
        let wire = node.to_wire();
        assert_eq!(wire, json!({"o": {"c": 1, "n": 2}}));
        assert_eq!(Node::from_wire(&wire).unwrap(), node);

        let escape_shaped = Node::Object(vec![("o".into(), Node::Null)]);
        let wire = escape_shaped.to_wire();
        assert_eq!(wire, json!({"o": {"o": null}}));
        assert_eq!(Node::from_wire(&wire).unwrap(), escape_shaped);
    }

    #[test]
    fn test_near_marker_objects_stay_plain() {
        let node = Node::Object(vec![
            ("c".into(), Node::Number(1.into())),
            ("n".into(), Node::Number(2.into())),
            ("z".into(), Node::Null),
        ]);
        assert_eq!(node.to_wire(), json!({"c": 1, "n": 2, "z": null}));
    }

    #[test]
    fn test_delta_wire_keeps_kind() {
        let int_run = Node::Delta(DeltaRun::Int {
            start: 0,
            step: 5,
            count: 4,
        });
        assert_eq!(int_run.to_wire(), json!({"s": 0, "d": 5, "n": 4}));

        let float_run = Node::Delta(DeltaRun::Float {
            start: 1.0,
            step: 0.5,
            count: 3,
        });
        let text = serde_json::to_string(&float_run.to_wire()).unwrap();
        assert_eq!(text, r#"{"s":1.0,"d":0.5,"n":3}"#);
        let reparsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(Node::from_wire(&reparsed).unwrap(), float_run);
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        assert!(matches!(
            Node::from_wire(&json!("~Qabc")),
            Err(CodecError::UnknownTag(_))
        ));
        assert!(matches!(Node::from_wire(&json!("~")), Err(CodecError::UnknownTag(_))));
    }

    #[test]
    fn test_truncated_payloads_are_errors() {
        assert!(matches!(Node::from_wire(&json!("~HAQ")), Err(CodecError::Base64(_))));
        assert!(Node::from_wire(&json!("~TDQ==")).is_err());
        assert!(matches!(
            Node::from_wire(&json!("~HAQID")),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_columnar_shape_validation() {
        let bad_marker = json!({"a": 2, "k": ["x"], "d": [[1]]});
        assert!(Node::from_wire(&bad_marker).is_err());

        let ragged = json!({"a": 1, "k": ["x", "y"], "d": [[1]]});
        assert!(matches!(
            Node::from_wire(&ragged),
            Err(CodecError::LengthMismatch { expected: 2, got: 1 })
        ));
    }
}
