//! Encode walk: JSON value -> encoded node tree
//!
//! Arrays are classified before their elements are visited, in a fixed
//! priority order (first match wins):
//!
//! 1. empty
//! 2. all booleans: constant run, else bit-packed
//! 3. all numbers: arithmetic run, else constant run, else fixed-width pack
//! 4. all strings (opt-in): constant run, else shared-prefix run
//! 5. objects with identical key sequences: columnar
//! 6. element-wise

use crate::codec::CodecOpts;
use crate::dictionary::{verbatim_keys, KeyDictionary};
use crate::node::Node;
use crate::pack::{common_prefix, is_constant, DeltaRun, PackedBools, PackedNums};
use serde_json::{Map, Number, Value as JsonValue};
use tracing::trace;

const MIN_PREFIX_CHARS: usize = 3;

/// State for one encode pass.
pub(crate) struct Compressor<'a> {
    opts: &'a CodecOpts,
    keys: KeyDictionary,
}

impl<'a> Compressor<'a> {
    /// Fresh compressor for `root`. Verbatim keys found in `root` are
    /// reserved so no abbreviation can shadow them.
    pub fn new(opts: &'a CodecOpts, root: &JsonValue) -> Self {
        let reserved = verbatim_keys(root, opts.min_key_len);
        Self {
            opts,
            keys: KeyDictionary::with_reserved(opts.min_key_len, reserved),
        }
    }

    pub fn into_dictionary(self) -> KeyDictionary {
        self.keys
    }

    pub fn compress(&mut self, value: &JsonValue) -> Node {
        match value {
            JsonValue::Null => Node::Null,
            JsonValue::Bool(b) => Node::Bool(*b),
            JsonValue::Number(n) => Node::Number(n.clone()),
            JsonValue::String(s) => self.compress_string(s),
            JsonValue::Array(items) => {
                let items: Vec<&JsonValue> = items.iter().collect();
                self.compress_array(&items)
            }
            JsonValue::Object(obj) => self.compress_object(obj),
        }
    }

    fn compress_object(&mut self, obj: &Map<String, JsonValue>) -> Node {
        let mut entries = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            let code = self.keys.get_or_assign(key);
            entries.push((code, self.compress(value)));
        }
        Node::Object(entries)
    }

    fn compress_string(&self, s: &str) -> Node {
        let plain = Node::Str(s.to_string());
        if !self.opts.base64_strings || s.chars().count() <= self.opts.long_string_len {
            return plain;
        }
        let tagged = Node::Text(s.to_string());
        if tagged.wire_len() < plain.wire_len() {
            tagged
        } else {
            plain
        }
    }

    fn compress_array(&mut self, items: &[&JsonValue]) -> Node {
        if items.is_empty() {
            return Node::List(Vec::new());
        }

        if let Some(bools) = items.iter().map(|v| v.as_bool()).collect::<Option<Vec<bool>>>() {
            if is_constant(items) {
                trace!(len = items.len(), "constant boolean run");
                return Node::Const {
                    value: Box::new(Node::Bool(bools[0])),
                    count: bools.len(),
                };
            }
            if bools.len() >= self.opts.min_run_len {
                trace!(len = bools.len(), "bit-packed booleans");
                return Node::Bits(PackedBools::pack(&bools));
            }
        }

        if let Some(nums) = items.iter().map(|v| as_number(v)).collect::<Option<Vec<&Number>>>() {
            if let Some(run) =
                DeltaRun::detect(&nums, self.opts.min_run_len, self.opts.delta_tolerance)
            {
                trace!(len = nums.len(), "arithmetic run");
                return Node::Delta(run);
            }
            if is_constant(items) {
                trace!(len = nums.len(), "constant numeric run");
                return Node::Const {
                    value: Box::new(Node::Number(nums[0].clone())),
                    count: nums.len(),
                };
            }
            if nums.len() >= self.opts.min_run_len {
                if let Some(packed) = PackedNums::pack(&nums) {
                    trace!(len = nums.len(), width = ?packed.width, "packed numbers");
                    return Node::Packed(packed);
                }
            }
        }

        if self.opts.string_runs {
            if let Some(node) = self.try_string_run(items) {
                return node;
            }
        }

        if self.opts.columnar {
            if let Some(node) = self.try_columnar(items) {
                return node;
            }
        }

        Node::List(items.iter().map(|v| self.compress(v)).collect())
    }

    fn try_string_run(&self, items: &[&JsonValue]) -> Option<Node> {
        let strings = items.iter().map(|v| v.as_str()).collect::<Option<Vec<&str>>>()?;
        if is_constant(items) {
            trace!(len = strings.len(), "constant string run");
            return Some(Node::Const {
                value: Box::new(self.compress_string(strings[0])),
                count: strings.len(),
            });
        }

        let (prefix, suffixes) = common_prefix(&strings, MIN_PREFIX_CHARS)?;
        let plain = Node::List(strings.iter().map(|s| Node::Str(s.to_string())).collect());
        let run = Node::Prefix { prefix, suffixes };
        (run.wire_len() < plain.wire_len()).then(|| {
            trace!(len = strings.len(), "shared-prefix string run");
            run
        })
    }

    /// Transpose objects sharing one non-empty key sequence into columns.
    fn try_columnar(&mut self, items: &[&JsonValue]) -> Option<Node> {
        if items.len() < self.opts.min_columnar_rows {
            return None;
        }
        let rows = items
            .iter()
            .map(|v| v.as_object())
            .collect::<Option<Vec<&Map<String, JsonValue>>>>()?;

        let first = rows[0];
        if first.is_empty() {
            return None;
        }
        let homogeneous = rows[1..]
            .iter()
            .all(|row| row.keys().eq(first.keys()));
        if !homogeneous {
            return None;
        }

        trace!(rows = rows.len(), cols = first.len(), "columnar transform");
        let keys: Vec<String> = first.keys().map(|k| self.keys.get_or_assign(k)).collect();
        let mut columns = Vec::with_capacity(first.len());
        for key in first.keys() {
            let column = rows
                .iter()
                .map(|row| row.get(key))
                .collect::<Option<Vec<&JsonValue>>>()?;
            columns.push(self.compress_column(&column));
        }
        Some(Node::Columnar { keys, columns })
    }

    /// A column accepts a constant run of any value kind before the
    /// standalone array rules apply.
    fn compress_column(&mut self, values: &[&JsonValue]) -> Node {
        if is_constant(values) {
            return Node::Const {
                value: Box::new(self.compress(values[0])),
                count: values.len(),
            };
        }
        self.compress_array(values)
    }
}

fn as_number(v: &JsonValue) -> Option<&Number> {
    match v {
        JsonValue::Number(n) => Some(n),
        _ => None,
    }
}
