//! Key dictionary: bijective field name <-> short code mapping
//!
//! Codes are base62 renderings of a counter that starts at zero and grows in
//! first-encounter order. A dictionary lives for exactly one encode call.

use crate::error::*;
use serde_json::{Map, Value as JsonValue};
use std::collections::{HashMap, HashSet};

const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Render `n` in base62, most significant digit first.
pub fn base62(mut n: usize) -> String {
    if n == 0 {
        return (BASE62[0] as char).to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE62[n % 62]);
        n /= 62;
    }
    digits.reverse();
    // digits are drawn from an ASCII table
    digits.into_iter().map(char::from).collect()
}

/// Forward dictionary used while encoding.
#[derive(Debug, Clone)]
pub struct KeyDictionary {
    min_key_len: usize,
    counter: usize,
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
    /// Verbatim keys present in the input; never handed out as codes.
    reserved: HashSet<String>,
}

impl KeyDictionary {
    pub fn new(min_key_len: usize) -> Self {
        Self::with_reserved(min_key_len, HashSet::new())
    }

    /// Dictionary that will skip every code found in `reserved`.
    pub fn with_reserved(min_key_len: usize, reserved: HashSet<String>) -> Self {
        Self {
            min_key_len,
            counter: 0,
            entries: Vec::new(),
            index: HashMap::new(),
            reserved,
        }
    }

    /// Whether `key` is short enough to be emitted as-is.
    pub fn is_verbatim(&self, key: &str) -> bool {
        key.chars().count() <= self.min_key_len
    }

    /// Code for `key`, assigning the next free one on first sight.
    pub fn get_or_assign(&mut self, key: &str) -> String {
        if self.is_verbatim(key) {
            return key.to_string();
        }
        if let Some(&i) = self.index.get(key) {
            return self.entries[i].1.clone();
        }

        let code = loop {
            let candidate = base62(self.counter);
            self.counter += 1;
            if !self.reserved.contains(&candidate) {
                break candidate;
            }
        };
        self.index.insert(key.to_string(), self.entries.len());
        self.entries.push((key.to_string(), code.clone()));
        code
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(original, code)` pairs in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), c.as_str()))
    }

    /// Wire form: `{original: code, ...}`.
    pub fn to_wire(&self) -> Map<String, JsonValue> {
        self.entries
            .iter()
            .map(|(k, c)| (k.clone(), JsonValue::String(c.clone())))
            .collect()
    }
}

/// Collect every key of `value` that a dictionary with `min_key_len` would
/// emit verbatim.
pub fn verbatim_keys(value: &JsonValue, min_key_len: usize) -> HashSet<String> {
    fn walk(v: &JsonValue, min_key_len: usize, out: &mut HashSet<String>) {
        match v {
            JsonValue::Array(items) => {
                for item in items {
                    walk(item, min_key_len, out);
                }
            }
            JsonValue::Object(obj) => {
                for (k, child) in obj {
                    if k.chars().count() <= min_key_len && !out.contains(k) {
                        out.insert(k.clone());
                    }
                    walk(child, min_key_len, out);
                }
            }
            _ => {}
        }
    }

    let mut out = HashSet::new();
    walk(value, min_key_len, &mut out);
    out
}

/// Inverse dictionary used while decoding: code -> original name.
///
/// Unknown codes resolve to themselves. Every code must be looked up at
/// least once before [`KeyLookup::ensure_all_used`] passes.
#[derive(Debug, Clone, Default)]
pub struct KeyLookup {
    inverse: HashMap<String, String>,
    used: HashSet<String>,
}

impl KeyLookup {
    /// Lookup with no abbreviated keys.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from the envelope's `{original: code}` object.
    pub fn from_wire(map: &Map<String, JsonValue>) -> Result<Self> {
        let mut inverse = HashMap::with_capacity(map.len());
        for (original, code) in map {
            let code = code
                .as_str()
                .ok_or_else(|| CodecError::type_mismatch("string code", code))?;
            if code.is_empty() {
                return Err(CodecError::Dictionary(format!(
                    "empty code for key {original:?}"
                )));
            }
            if inverse.insert(code.to_string(), original.clone()).is_some() {
                return Err(CodecError::Dictionary(format!("duplicate code {code:?}")));
            }
        }
        Ok(Self {
            inverse,
            used: HashSet::new(),
        })
    }

    /// Original name for `code`, or `code` itself when it was never abbreviated.
    pub fn resolve(&mut self, code: &str) -> String {
        match self.inverse.get(code) {
            Some(original) => {
                if !self.used.contains(code) {
                    self.used.insert(code.to_string());
                }
                original.clone()
            }
            None => code.to_string(),
        }
    }

    /// Fail when the dictionary names a code absent from the decoded tree.
    pub fn ensure_all_used(&self) -> Result<()> {
        if self.used.len() == self.inverse.len() {
            return Ok(());
        }
        let mut unused: Vec<&str> = self
            .inverse
            .keys()
            .filter(|c| !self.used.contains(*c))
            .map(String::as_str)
            .collect();
        unused.sort_unstable();
        Err(CodecError::Dictionary(format!(
            "codes not referenced by data: {}",
            unused.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base62_digits() {
        assert_eq!(base62(0), "0");
        assert_eq!(base62(9), "9");
        assert_eq!(base62(10), "A");
        assert_eq!(base62(35), "Z");
        assert_eq!(base62(36), "a");
        assert_eq!(base62(61), "z");
        assert_eq!(base62(62), "10");
        assert_eq!(base62(62 * 62 + 1), "101");
    }

    #[test]
    fn test_short_keys_pass_through() {
        let mut dict = KeyDictionary::new(4);
        assert_eq!(dict.get_or_assign("id"), "id");
        assert_eq!(dict.get_or_assign("name"), "name");
        assert!(dict.is_empty());
    }

    #[test]
    fn test_codes_are_stable_and_sequential() {
        let mut dict = KeyDictionary::new(4);
        assert_eq!(dict.get_or_assign("username"), "0");
        assert_eq!(dict.get_or_assign("email_address"), "1");
        assert_eq!(dict.get_or_assign("username"), "0");
        assert_eq!(dict.len(), 2);

        let pairs: Vec<_> = dict.iter().collect();
        assert_eq!(pairs, vec![("username", "0"), ("email_address", "1")]);
    }

    #[test]
    fn test_reserved_codes_are_skipped() {
        let reserved: HashSet<String> = ["0".to_string(), "2".to_string()].into();
        let mut dict = KeyDictionary::with_reserved(4, reserved);
        assert_eq!(dict.get_or_assign("alpha_key"), "1");
        assert_eq!(dict.get_or_assign("beta_key"), "3");
    }

    #[test]
    fn test_verbatim_keys_collects_nested() {
        let v = json!({"id": 1, "payload": [{"x": 1, "longer_key": {"y": 2}}]});
        let keys = verbatim_keys(&v, 4);
        let mut sorted: Vec<_> = keys.into_iter().collect();
        sorted.sort();
        assert_eq!(sorted, vec!["id", "x", "y"]);
    }

    #[test]
    fn test_lookup_resolves_and_tracks_usage() {
        let wire = json!({"username": "0", "email_address": "1"});
        let mut lookup = KeyLookup::from_wire(wire.as_object().unwrap()).unwrap();

        assert_eq!(lookup.resolve("0"), "username");
        assert_eq!(lookup.resolve("id"), "id");
        assert!(lookup.ensure_all_used().is_err());

        assert_eq!(lookup.resolve("1"), "email_address");
        assert!(lookup.ensure_all_used().is_ok());
    }

    #[test]
    fn test_lookup_rejects_duplicate_codes() {
        let wire = json!({"first_key": "0", "second_key": "0"});
        let err = KeyLookup::from_wire(wire.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, CodecError::Dictionary(_)));
    }

    #[test]
    fn test_lookup_rejects_non_string_code() {
        let wire = json!({"first_key": 0});
        let err = KeyLookup::from_wire(wire.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }
}
