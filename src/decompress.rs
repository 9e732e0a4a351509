//! Decode walk: encoded node tree -> JSON value

use crate::dictionary::KeyLookup;
use crate::error::*;
use crate::node::Node;
use crate::pack::run_buffer;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;

/// State for one decode pass.
pub(crate) struct Decompressor {
    keys: KeyLookup,
}

impl Decompressor {
    pub fn new(keys: KeyLookup) -> Self {
        Self { keys }
    }

    /// Check the dictionary was fully consumed.
    pub fn finish(self) -> Result<()> {
        self.keys.ensure_all_used()
    }

    pub fn decompress(&mut self, node: &Node) -> Result<JsonValue> {
        match node {
            Node::Null => Ok(JsonValue::Null),
            Node::Bool(b) => Ok(JsonValue::Bool(*b)),
            Node::Number(n) => Ok(JsonValue::Number(n.clone())),
            Node::Str(s) | Node::Text(s) => Ok(JsonValue::String(s.clone())),
            Node::Const { value, count } => {
                let mut out = run_buffer(*count)?;
                let value = self.decompress(value)?;
                out.resize(*count, value);
                Ok(JsonValue::Array(out))
            }
            Node::Delta(run) => run.expand().map(JsonValue::Array),
            Node::Packed(packed) => packed.unpack().map(JsonValue::Array),
            Node::Bits(bits) => Ok(bits.unpack().into_iter().map(JsonValue::Bool).collect()),
            Node::Prefix { prefix, suffixes } => Ok(suffixes
                .iter()
                .map(|s| JsonValue::String(format!("{prefix}{s}")))
                .collect()),
            Node::Columnar { keys, columns } => self.decompress_columnar(keys, columns),
            Node::List(items) => items
                .iter()
                .map(|item| self.decompress(item))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            Node::Object(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (code, value) in entries {
                    let key = self.keys.resolve(code);
                    let value = self.decompress(value)?;
                    if let Some(_shadowed) = map.insert(key, value) {
                        return Err(CodecError::Malformed(format!(
                            "key {code:?} resolves to a name already present"
                        )));
                    }
                }
                Ok(JsonValue::Object(map))
            }
        }
    }

    fn decompress_columnar(&mut self, keys: &[String], columns: &[Node]) -> Result<JsonValue> {
        let names: Vec<String> = keys.iter().map(|k| self.keys.resolve(k)).collect();
        let mut seen = HashSet::with_capacity(names.len());
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(CodecError::Malformed(format!("duplicate column {dup:?}")));
        }

        let mut cells = Vec::with_capacity(columns.len());
        let mut rows = None;
        for column in columns {
            let values = match self.decompress(column)? {
                JsonValue::Array(values) => values,
                other => return Err(CodecError::type_mismatch("array column", &other)),
            };
            match rows {
                None => rows = Some(values.len()),
                Some(expected) if expected != values.len() => {
                    return Err(CodecError::LengthMismatch {
                        expected,
                        got: values.len(),
                    })
                }
                Some(_) => {}
            }
            cells.push(values.into_iter());
        }

        let rows = rows.unwrap_or(0);
        let mut out = Vec::with_capacity(rows);
        for _ in 0..rows {
            let mut row = Map::with_capacity(names.len());
            for (name, column) in names.iter().zip(cells.iter_mut()) {
                // every column was checked to hold `rows` values
                if let Some(value) = column.next() {
                    row.insert(name.clone(), value);
                }
            }
            out.push(JsonValue::Object(row));
        }
        Ok(JsonValue::Array(out))
    }
}
