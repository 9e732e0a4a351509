//! Codec entry points: options, envelope and the encode/decode pair
//!
//! Encoded text is either an envelope
//!
//! ```text
//! {"d": <compressed root>, "m": {<original key>: <code>, ...}}
//! ```
//!
//! or, when that is not strictly smaller, the plain compact serialization of
//! the input. `"m"` is omitted when no key was abbreviated.

use crate::compress::Compressor;
use crate::decompress::Decompressor;
use crate::dictionary::KeyLookup;
use crate::error::*;
use crate::json_bridge::{from_json, to_json};
use crate::node::Node;
use crate::types::Datum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

const DATA_FIELD: &str = "d";
const KEYS_FIELD: &str = "m";

/// Options controlling which encodings the codec may choose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOpts {
    /// Keys of at most this many chars are never abbreviated
    pub min_key_len: usize,
    /// Strings longer than this many chars may be base64-substituted
    pub long_string_len: usize,
    /// Minimum length for arithmetic runs, bit-packing and numeric packing
    pub min_run_len: usize,
    /// Minimum rows for the columnar transform
    pub min_columnar_rows: usize,
    /// Allowed spread between successive float steps of an arithmetic run
    pub delta_tolerance: f64,
    /// Enable the columnar transform for homogeneous object arrays
    pub columnar: bool,
    /// Enable base64 substitution for long strings
    pub base64_strings: bool,
    /// Enable constant and shared-prefix runs for string arrays
    pub string_runs: bool,
}

impl Default for CodecOpts {
    fn default() -> Self {
        Self {
            min_key_len: 4,
            long_string_len: 20,
            min_run_len: 3,
            min_columnar_rows: 3,
            delta_tolerance: 1e-10,
            columnar: true,
            base64_strings: true,
            string_runs: false,
        }
    }
}

impl CodecOpts {
    /// Abbreviate every non-empty key and enable string runs
    pub fn aggressive() -> Self {
        Self {
            min_key_len: 0,
            string_runs: true,
            ..Self::default()
        }
    }

    /// Options with the columnar transform disabled
    pub fn no_columnar() -> Self {
        Self {
            columnar: false,
            ..Self::default()
        }
    }
}

/// Top-level encoded unit: compressed root plus key dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub data: Node,
    /// `original name -> code`, empty when nothing was abbreviated
    pub keys: Map<String, JsonValue>,
}

impl Envelope {
    pub fn to_wire(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert(DATA_FIELD.to_string(), self.data.to_wire());
        if !self.keys.is_empty() {
            map.insert(KEYS_FIELD.to_string(), JsonValue::Object(self.keys.clone()));
        }
        JsonValue::Object(map)
    }

    /// True for objects whose keys are a non-empty subset of `{d, m}`.
    pub fn is_envelope_shaped(value: &JsonValue) -> bool {
        match value {
            JsonValue::Object(map) => {
                !map.is_empty() && map.keys().all(|k| k == DATA_FIELD || k == KEYS_FIELD)
            }
            _ => false,
        }
    }

    /// Parse an envelope. `Ok(None)` means `wire` is not envelope-shaped and
    /// should be taken as a plain value.
    pub fn from_wire(wire: &JsonValue) -> Result<Option<Envelope>> {
        if !Self::is_envelope_shaped(wire) {
            return Ok(None);
        }
        let data = wire
            .get(DATA_FIELD)
            .ok_or_else(|| CodecError::MissingField(DATA_FIELD.to_string()))?;
        let keys = match wire.get(KEYS_FIELD) {
            None => Map::new(),
            Some(JsonValue::Object(keys)) => keys.clone(),
            Some(other) => return Err(CodecError::type_mismatch("key dictionary object", other)),
        };
        Ok(Some(Envelope {
            data: Node::from_wire(data)?,
            keys,
        }))
    }
}

/// Outcome of one encode call with its size accounting
#[derive(Debug, Clone)]
pub struct EncodeReport {
    /// Encoded text (envelope or plain fallback)
    pub text: String,
    /// Compact plain serialization size in bytes
    pub original_bytes: usize,
    /// Size of `text` in bytes
    pub encoded_bytes: usize,
    /// Whether the plain serialization was returned
    pub fallback: bool,
}

impl EncodeReport {
    /// Original over encoded size
    pub fn byte_ratio(&self) -> f64 {
        if self.encoded_bytes == 0 {
            0.0
        } else {
            self.original_bytes as f64 / self.encoded_bytes as f64
        }
    }

    /// Percentage of bytes saved relative to the plain serialization
    pub fn savings_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            0.0
        } else {
            (self.original_bytes as f64 - self.encoded_bytes as f64) / self.original_bytes as f64
                * 100.0
        }
    }
}

/// Codec with fixed options. Holds no per-call state, so one instance can
/// be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    opts: CodecOpts,
}

impl Codec {
    pub fn new(opts: CodecOpts) -> Self {
        Self { opts }
    }

    pub fn opts(&self) -> &CodecOpts {
        &self.opts
    }

    /// Compress `value` into an envelope with a fresh key dictionary.
    pub fn compress(&self, value: &JsonValue) -> Envelope {
        let mut compressor = Compressor::new(&self.opts, value);
        let data = compressor.compress(value);
        Envelope {
            data,
            keys: compressor.into_dictionary().to_wire(),
        }
    }

    /// Rebuild the original value from an envelope.
    pub fn decompress(&self, envelope: &Envelope) -> Result<JsonValue> {
        let mut decompressor = Decompressor::new(KeyLookup::from_wire(&envelope.keys)?);
        let value = decompressor.decompress(&envelope.data)?;
        decompressor.finish()?;
        Ok(value)
    }

    pub fn encode(&self, value: &JsonValue) -> String {
        self.encode_detailed(value).text
    }

    /// Encode and report sizes. Returns the plain serialization unless the
    /// envelope is strictly shorter, or the plain text would itself read back
    /// as an envelope.
    pub fn encode_detailed(&self, value: &JsonValue) -> EncodeReport {
        let plain = serde_json::to_string(value).unwrap_or_default();
        let packed = serde_json::to_string(&self.compress(value).to_wire()).unwrap_or_default();

        let ambiguous = Envelope::is_envelope_shaped(value);
        let fallback = !ambiguous && packed.len() >= plain.len();
        debug!(
            original = plain.len(),
            encoded = packed.len(),
            ambiguous,
            fallback,
            "encode"
        );

        let original_bytes = plain.len();
        let text = if fallback { plain } else { packed };
        EncodeReport {
            encoded_bytes: text.len(),
            text,
            original_bytes,
            fallback,
        }
    }

    /// Encode a native value, lowering bytes, timestamps and non-finite
    /// floats to text first.
    pub fn encode_datum(&self, datum: &Datum) -> String {
        self.encode(&to_json(datum))
    }

    /// Decode into a native value. Integers above `i64::MAX` come back as
    /// [`Datum::UInt`].
    pub fn decode_datum(&self, text: &str) -> Result<Datum> {
        self.decode(text).map(|value| from_json(&value))
    }

    /// Decode text produced by [`Codec::encode`], or any plain JSON text.
    pub fn decode(&self, text: &str) -> Result<JsonValue> {
        let wire: JsonValue = serde_json::from_str(text)?;
        match Envelope::from_wire(&wire)? {
            Some(envelope) => self.decompress(&envelope),
            None => Ok(wire),
        }
    }
}

/// Encode with default options
pub fn encode(value: &JsonValue) -> String {
    Codec::default().encode(value)
}

/// Encode a native value with default options
pub fn encode_datum(datum: &Datum) -> String {
    Codec::default().encode_datum(datum)
}

/// Decode text produced by [`encode`]
pub fn decode(text: &str) -> Result<JsonValue> {
    Codec::default().decode(text)
}

/// Decode into a native value with default options
pub fn decode_datum(text: &str) -> Result<Datum> {
    Codec::default().decode_datum(text)
}

/// Size of encoded text in bytes
pub fn measure(text: &str) -> usize {
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_opts_presets() {
        let opts = CodecOpts::default();
        assert_eq!(opts.min_key_len, 4);
        assert!(opts.columnar);
        assert!(!opts.string_runs);

        assert_eq!(CodecOpts::aggressive().min_key_len, 0);
        assert!(!CodecOpts::no_columnar().columnar);
    }

    #[test]
    fn test_opts_deserialize_partial() {
        let opts: CodecOpts = serde_json::from_str(r#"{"min_key_len": 6}"#).unwrap();
        assert_eq!(opts.min_key_len, 6);
        assert_eq!(opts.long_string_len, 20);
    }

    #[test]
    fn test_envelope_omits_empty_dictionary() {
        let codec = Codec::default();
        let wire = codec.compress(&json!({"a": 1})).to_wire();
        assert_eq!(wire, json!({"d": {"a": 1}}));
    }

    #[test]
    fn test_envelope_shape_detection() {
        assert!(Envelope::is_envelope_shaped(&json!({"d": 1})));
        assert!(Envelope::is_envelope_shaped(&json!({"d": 1, "m": {}})));
        assert!(Envelope::is_envelope_shaped(&json!({"m": {}})));
        assert!(!Envelope::is_envelope_shaped(&json!({"d": 1, "x": 2})));
        assert!(!Envelope::is_envelope_shaped(&json!({})));
        assert!(!Envelope::is_envelope_shaped(&json!([1])));
    }

    #[test]
    fn test_missing_data_field() {
        let err = decode(r#"{"m":{"abcdef":"0"}}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingField(f) if f == "d"));
    }

    #[test]
    fn test_bad_dictionary_type() {
        let err = decode(r#"{"d":1,"m":[1]}"#).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn test_report_ratio() {
        let report = EncodeReport {
            text: String::new(),
            original_bytes: 200,
            encoded_bytes: 100,
            fallback: false,
        };
        assert_eq!(report.byte_ratio(), 2.0);
        assert_eq!(report.savings_percent(), 50.0);
    }

    #[test]
    fn test_measure_counts_bytes() {
        assert_eq!(measure("abc"), 3);
        assert_eq!(measure("é"), 2);
    }
}
