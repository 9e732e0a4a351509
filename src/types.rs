//! Native value model accepted by the codec
//!
//! `Datum` is a superset of JSON: besides the six JSON kinds it carries
//! binary and timestamp scalars. Those have no JSON representation, so the
//! codec lowers them to text before encoding (see [`crate::to_json`]).

use chrono::{DateTime, Utc};

/// Native value type enumeration
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integer value
    Int(i64),
    /// Unsigned integer beyond the `i64` range
    UInt(u64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
    /// Binary data, lowered to base64 text
    Bytes(Vec<u8>),
    /// Timestamp (UTC), lowered to RFC 3339 text
    Time(DateTime<Utc>),
    /// Ordered list of values
    List(Vec<Datum>),
    /// Key-value map in insertion order
    Map(Vec<MapEntry>),
}

/// Map entry (key-value pair)
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: String,
    pub value: Datum,
}

impl MapEntry {
    pub fn new(key: impl Into<String>, value: Datum) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

// ============================================================
// Builder functions
// ============================================================

impl Datum {
    /// Create a null value
    pub fn null() -> Self {
        Datum::Null
    }

    /// Create a boolean value
    pub fn bool(v: bool) -> Self {
        Datum::Bool(v)
    }

    /// Create an integer value
    pub fn int(v: i64) -> Self {
        Datum::Int(v)
    }

    /// Create a float value
    pub fn float(v: f64) -> Self {
        Datum::Float(v)
    }

    /// Create a string value
    pub fn str(v: impl Into<String>) -> Self {
        Datum::Str(v.into())
    }

    /// Create a bytes value
    pub fn bytes(v: Vec<u8>) -> Self {
        Datum::Bytes(v)
    }

    /// Create a timestamp value
    pub fn time(v: DateTime<Utc>) -> Self {
        Datum::Time(v)
    }

    /// Create a list value
    pub fn list(items: Vec<Datum>) -> Self {
        Datum::List(items)
    }

    /// Create a map value
    pub fn map(entries: Vec<MapEntry>) -> Self {
        Datum::Map(entries)
    }

    // ============================================================
    // Type checking
    // ============================================================

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Datum::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Datum::Map(_))
    }

    /// True for kinds JSON cannot hold natively (bytes, timestamps).
    /// Nested containers are not inspected.
    pub fn is_exotic(&self) -> bool {
        matches!(self, Datum::Bytes(_) | Datum::Time(_))
    }

    // ============================================================
    // Value extraction
    // ============================================================

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Datum::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Datum::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Datum]> {
        match self {
            Datum::List(v) => Some(v),
            _ => None,
        }
    }

    /// Get a value from a map by key
    pub fn get(&self, key: &str) -> Option<&Datum> {
        match self {
            Datum::Map(entries) => entries.iter().find(|e| e.key == key).map(|e| &e.value),
            _ => None,
        }
    }
}

/// Helper to create a map entry
pub fn field(key: impl Into<String>, value: Datum) -> MapEntry {
    MapEntry::new(key, value)
}
