//! Scalar-run sub-encoders
//!
//! Each encoder here turns a homogeneous run of scalars into a compact
//! payload and back. Detection is conservative: a run is only reported when
//! its expansion reproduces the input exactly, kind included.

use crate::error::*;
use bitvec::prelude::*;
use serde_json::{Number, Value as JsonValue};

/// Longest constant or arithmetic run either side of the codec accepts.
pub const MAX_RUN_LEN: usize = 1 << 24;

/// Empty buffer with room for a `count`-element run, failing cleanly when
/// the allocation cannot be made.
pub(crate) fn run_buffer(count: usize) -> Result<Vec<JsonValue>> {
    if count > MAX_RUN_LEN {
        return Err(CodecError::Malformed(format!(
            "run of {count} elements exceeds limit {MAX_RUN_LEN}"
        )));
    }
    let mut out = Vec::new();
    out.try_reserve_exact(count)
        .map_err(|e| CodecError::Malformed(format!("run of {count} elements: {e}")))?;
    Ok(out)
}

// ============================================================
// Fixed-width numeric packing
// ============================================================

/// Element type of a packed numeric buffer. All layouts are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumWidth {
    I8,
    I16,
    I32,
    I64,
    F64,
}

impl NumWidth {
    /// Tag letter used on the wire
    pub fn tag(self) -> char {
        match self {
            NumWidth::I8 => 'B',
            NumWidth::I16 => 'H',
            NumWidth::I32 => 'I',
            NumWidth::I64 => 'L',
            NumWidth::F64 => 'D',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'B' => Some(NumWidth::I8),
            'H' => Some(NumWidth::I16),
            'I' => Some(NumWidth::I32),
            'L' => Some(NumWidth::I64),
            'D' => Some(NumWidth::F64),
            _ => None,
        }
    }

    /// Bytes per element
    pub fn size(self) -> usize {
        match self {
            NumWidth::I8 => 1,
            NumWidth::I16 => 2,
            NumWidth::I32 => 4,
            NumWidth::I64 | NumWidth::F64 => 8,
        }
    }

    /// Narrowest signed integer width holding every value in `min..=max`.
    fn for_int_range(min: i64, max: i64) -> Self {
        let fits = |lo: i64, hi: i64| min >= lo && max <= hi;
        if fits(i8::MIN.into(), i8::MAX.into()) {
            NumWidth::I8
        } else if fits(i16::MIN.into(), i16::MAX.into()) {
            NumWidth::I16
        } else if fits(i32::MIN.into(), i32::MAX.into()) {
            NumWidth::I32
        } else {
            NumWidth::I64
        }
    }
}

/// Base64-ready numeric buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedNums {
    pub width: NumWidth,
    pub bytes: Vec<u8>,
}

impl PackedNums {
    /// Pack `nums` at the narrowest lossless width.
    ///
    /// Returns `None` for runs mixing integers with floats and for unsigned
    /// values beyond `i64`; neither has an exact fixed-width form.
    pub fn pack(nums: &[&Number]) -> Option<Self> {
        if let Some(ints) = nums.iter().map(|n| n.as_i64()).collect::<Option<Vec<i64>>>() {
            let min = ints.iter().copied().min().unwrap_or(0);
            let max = ints.iter().copied().max().unwrap_or(0);
            let width = NumWidth::for_int_range(min, max);
            let mut bytes = Vec::with_capacity(ints.len() * width.size());
            for v in ints {
                // range checked above, the casts cannot truncate
                match width {
                    NumWidth::I8 => bytes.extend_from_slice(&(v as i8).to_le_bytes()),
                    NumWidth::I16 => bytes.extend_from_slice(&(v as i16).to_le_bytes()),
                    NumWidth::I32 => bytes.extend_from_slice(&(v as i32).to_le_bytes()),
                    NumWidth::I64 | NumWidth::F64 => bytes.extend_from_slice(&v.to_le_bytes()),
                }
            }
            return Some(Self { width, bytes });
        }

        if nums.iter().all(|n| n.is_f64()) {
            let mut bytes = Vec::with_capacity(nums.len() * 8);
            for n in nums {
                bytes.extend_from_slice(&n.as_f64()?.to_le_bytes());
            }
            return Some(Self {
                width: NumWidth::F64,
                bytes,
            });
        }

        None
    }

    /// Rebuild from a decoded payload, checking the buffer is whole elements.
    pub fn from_parts(width: NumWidth, bytes: Vec<u8>) -> Result<Self> {
        let leftover = bytes.len() % width.size();
        if leftover != 0 {
            return Err(CodecError::Malformed(format!(
                "{leftover} trailing bytes after {} packed {width:?} values",
                bytes.len() / width.size()
            )));
        }
        Ok(Self { width, bytes })
    }

    /// Number of packed elements
    pub fn len(&self) -> usize {
        self.bytes.len() / self.width.size()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn unpack(&self) -> Result<Vec<JsonValue>> {
        let size = self.width.size();
        self.bytes
            .chunks_exact(size)
            .map(|c| -> Result<JsonValue> {
                let n = match self.width {
                    NumWidth::I8 => Number::from(i8::from_le_bytes([c[0]])),
                    NumWidth::I16 => Number::from(i16::from_le_bytes([c[0], c[1]])),
                    NumWidth::I32 => Number::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                    NumWidth::I64 => Number::from(i64::from_le_bytes(le8(c))),
                    NumWidth::F64 => {
                        let f = f64::from_le_bytes(le8(c));
                        Number::from_f64(f).ok_or_else(|| {
                            CodecError::Malformed(format!("non-finite packed float {f}"))
                        })?
                    }
                };
                Ok(JsonValue::Number(n))
            })
            .collect()
    }
}

fn le8(c: &[u8]) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&c[..8]);
    buf
}

// ============================================================
// Boolean bit-packing
// ============================================================

/// Booleans at one bit each, least significant bit first within a byte.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedBools {
    pub count: usize,
    pub bytes: Vec<u8>,
}

impl PackedBools {
    pub fn pack(bools: &[bool]) -> Self {
        let mut bits: BitVec<u8, Lsb0> = BitVec::repeat(false, bools.len());
        for (i, b) in bools.iter().enumerate() {
            bits.set(i, *b);
        }
        Self {
            count: bools.len(),
            bytes: bits.as_raw_slice().to_vec(),
        }
    }

    /// Rebuild from a decoded payload; the buffer must hold exactly
    /// `ceil(count / 8)` bytes.
    pub fn from_parts(bytes: Vec<u8>, count: usize) -> Result<Self> {
        let expected = count.div_ceil(8);
        if bytes.len() != expected {
            return Err(CodecError::LengthMismatch {
                expected,
                got: bytes.len(),
            });
        }
        Ok(Self { count, bytes })
    }

    pub fn unpack(&self) -> Vec<bool> {
        let bits = BitSlice::<u8, Lsb0>::from_slice(&self.bytes);
        bits[..self.count].iter().by_vals().collect()
    }
}

// ============================================================
// Arithmetic runs
// ============================================================

/// Arithmetic progression `start + i * step` for `i` in `0..count`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaRun {
    Int { start: i64, step: i64, count: usize },
    Float { start: f64, step: f64, count: usize },
}

impl DeltaRun {
    /// Detect an arithmetic run of at least `min_len` elements.
    ///
    /// Float steps may differ by up to `tolerance`, but the run is only
    /// accepted when regenerating it reproduces every element bit for bit.
    pub fn detect(nums: &[&Number], min_len: usize, tolerance: f64) -> Option<Self> {
        if nums.len() < min_len.max(2) || nums.len() > MAX_RUN_LEN {
            return None;
        }
        let count = nums.len();

        if let Some(ints) = nums.iter().map(|n| n.as_i64()).collect::<Option<Vec<i64>>>() {
            let step = ints[1].checked_sub(ints[0])?;
            for pair in ints.windows(2) {
                if pair[1].checked_sub(pair[0])? != step {
                    return None;
                }
            }
            return Some(DeltaRun::Int {
                start: ints[0],
                step,
                count,
            });
        }

        if !nums.iter().all(|n| n.is_f64()) {
            return None;
        }
        let floats: Vec<f64> = nums.iter().filter_map(|n| n.as_f64()).collect();
        let start = floats[0];
        let step = floats[1] - floats[0];
        if !step.is_finite() {
            return None;
        }
        if floats
            .windows(2)
            .any(|pair| ((pair[1] - pair[0]) - step).abs() > tolerance)
        {
            return None;
        }
        let exact = floats
            .iter()
            .enumerate()
            .all(|(i, f)| (start + i as f64 * step).to_bits() == f.to_bits());
        exact.then_some(DeltaRun::Float { start, step, count })
    }

    pub fn count(&self) -> usize {
        match self {
            DeltaRun::Int { count, .. } | DeltaRun::Float { count, .. } => *count,
        }
    }

    pub fn expand(&self) -> Result<Vec<JsonValue>> {
        let mut out = run_buffer(self.count())?;
        match *self {
            DeltaRun::Int { start, step, count } => {
                for i in 0..count {
                    let v = i64::try_from(i)
                        .ok()
                        .and_then(|i| i.checked_mul(step))
                        .and_then(|off| start.checked_add(off))
                        .ok_or_else(|| CodecError::Malformed("integer run overflows i64".into()))?;
                    out.push(JsonValue::Number(Number::from(v)));
                }
            }
            DeltaRun::Float { start, step, count } => {
                for i in 0..count {
                    let v = start + i as f64 * step;
                    let n = Number::from_f64(v)
                        .ok_or_else(|| CodecError::Malformed(format!("float run reaches {v}")))?;
                    out.push(JsonValue::Number(n));
                }
            }
        }
        Ok(out)
    }
}

// ============================================================
// Constant and prefix runs
// ============================================================

/// True when `values` has at least two elements, all identical, and fits
/// within [`MAX_RUN_LEN`].
pub fn is_constant(values: &[&JsonValue]) -> bool {
    (2..=MAX_RUN_LEN).contains(&values.len())
        && values[1..].iter().all(|v| identical(v, values[0]))
}

/// Structural equality that also tells `0.0` from `-0.0`.
fn identical(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) if x.is_f64() && y.is_f64() => {
            x.as_f64().map(f64::to_bits) == y.as_f64().map(f64::to_bits)
        }
        (JsonValue::Array(xs), JsonValue::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| identical(x, y))
        }
        (JsonValue::Object(xs), JsonValue::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|((ka, va), (kb, vb))| ka == kb && identical(va, vb))
        }
        _ => a == b,
    }
}

/// Split strings into a shared prefix of at least `min_prefix` chars and
/// their suffixes. `None` when fewer than two strings or no such prefix.
pub fn common_prefix(strings: &[&str], min_prefix: usize) -> Option<(String, Vec<String>)> {
    if strings.len() < 2 {
        return None;
    }

    let mut prefix_len = strings[0].len();
    for s in &strings[1..] {
        prefix_len = strings[0]
            .char_indices()
            .zip(s.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, a), _)| i + a.len_utf8())
            .unwrap_or(0)
            .min(prefix_len);
        if prefix_len == 0 {
            return None;
        }
    }

    let prefix = &strings[0][..prefix_len];
    if prefix.chars().count() < min_prefix {
        return None;
    }
    let suffixes = strings.iter().map(|s| s[prefix_len..].to_string()).collect();
    Some((prefix.to_string(), suffixes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numbers(v: &JsonValue) -> Vec<&Number> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|x| match x {
                JsonValue::Number(n) => n,
                _ => panic!("not a number"),
            })
            .collect()
    }

    #[test]
    fn test_width_selection() {
        let small = json!([1, -5, 100]);
        assert_eq!(PackedNums::pack(&numbers(&small)).unwrap().width, NumWidth::I8);

        let medium = json!([1, 200, 3]);
        assert_eq!(PackedNums::pack(&numbers(&medium)).unwrap().width, NumWidth::I16);

        let large = json!([1, 70000, 3]);
        assert_eq!(PackedNums::pack(&numbers(&large)).unwrap().width, NumWidth::I32);

        let huge = json!([1, 5_000_000_000i64, 3]);
        assert_eq!(PackedNums::pack(&numbers(&huge)).unwrap().width, NumWidth::I64);

        let floats = json!([1.5, 2.25, -3.0]);
        assert_eq!(PackedNums::pack(&numbers(&floats)).unwrap().width, NumWidth::F64);
    }

    #[test]
    fn test_mixed_ints_and_floats_do_not_pack() {
        let mixed = json!([1, 2.5, 3]);
        assert!(PackedNums::pack(&numbers(&mixed)).is_none());

        let beyond_i64 = json!([1, u64::MAX, 3]);
        assert!(PackedNums::pack(&numbers(&beyond_i64)).is_none());
    }

    #[test]
    fn test_packed_unpack_restores_values() {
        for v in [
            json!([7, -8, 127, -128]),
            json!([300, -300, 32767]),
            json!([-2147483648i64, 2147483647i64, 0]),
            json!([i64::MIN, i64::MAX, 0]),
            json!([0.1, -2.5, 1e300]),
        ] {
            let packed = PackedNums::pack(&numbers(&v)).unwrap();
            assert_eq!(JsonValue::Array(packed.unpack().unwrap()), v);
        }
    }

    #[test]
    fn test_packed_rejects_partial_element() {
        let err = PackedNums::from_parts(NumWidth::I16, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(msg) if msg.starts_with("1 trailing bytes")));
        let err = PackedNums::from_parts(NumWidth::I64, vec![0; 11]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(msg) if msg.starts_with("3 trailing bytes")));
    }

    #[test]
    fn test_bool_bit_layout_is_lsb_first() {
        let packed = PackedBools::pack(&[true, false, true, true, false]);
        assert_eq!(packed.bytes, vec![0b0000_1101]);
        assert_eq!(packed.unpack(), vec![true, false, true, true, false]);
    }

    #[test]
    fn test_bool_count_spanning_bytes() {
        let bools: Vec<bool> = (0..11).map(|i| i % 3 == 0).collect();
        let packed = PackedBools::pack(&bools);
        assert_eq!(packed.bytes.len(), 2);
        assert_eq!(packed.unpack(), bools);
    }

    #[test]
    fn test_bool_count_must_match_buffer() {
        assert!(PackedBools::from_parts(vec![0xff], 8).is_ok());
        assert!(PackedBools::from_parts(vec![0xff], 9).is_err());
        assert!(PackedBools::from_parts(vec![0xff, 0x00], 5).is_err());
    }

    #[test]
    fn test_int_delta() {
        let v = json!([0, 5, 10, 15]);
        let run = DeltaRun::detect(&numbers(&v), 3, 1e-10).unwrap();
        assert_eq!(
            run,
            DeltaRun::Int {
                start: 0,
                step: 5,
                count: 4
            }
        );
        assert_eq!(JsonValue::Array(run.expand().unwrap()), v);
    }

    #[test]
    fn test_oversized_run_fails_to_expand() {
        let run = DeltaRun::Int {
            start: 0,
            step: 1,
            count: usize::MAX,
        };
        assert!(matches!(run.expand(), Err(CodecError::Malformed(_))));
        assert!(run_buffer(MAX_RUN_LEN + 1).is_err());
        assert!(run_buffer(16).unwrap().capacity() >= 16);
    }

    #[test]
    fn test_delta_requires_min_len() {
        let v = json!([1, 2]);
        assert!(DeltaRun::detect(&numbers(&v), 3, 1e-10).is_none());
    }

    #[test]
    fn test_float_delta_exact() {
        let v = json!([0.5, 0.75, 1.0, 1.25]);
        let run = DeltaRun::detect(&numbers(&v), 3, 1e-10).unwrap();
        assert!(matches!(run, DeltaRun::Float { .. }));
        assert_eq!(JsonValue::Array(run.expand().unwrap()), v);
    }

    #[test]
    fn test_float_delta_rejected_when_not_bit_exact() {
        // steps agree within tolerance, but 0.1 * 3 != 0.3 in binary
        let v = json!([0.0, 0.1, 0.2, 0.3]);
        assert!(DeltaRun::detect(&numbers(&v), 3, 1e-10).is_none());
    }

    #[test]
    fn test_mixed_kinds_are_not_a_delta_run() {
        let v = json!([1, 2.0, 3]);
        assert!(DeltaRun::detect(&numbers(&v), 3, 1e-10).is_none());
    }

    #[test]
    fn test_is_constant() {
        let a = json!(1);
        let b = json!(1.0);
        assert!(is_constant(&[&a, &a]));
        assert!(!is_constant(&[&a]));
        assert!(!is_constant(&[&a, &b]));

        let zero = json!(0.0);
        let neg_zero = json!(-0.0);
        assert!(!is_constant(&[&zero, &neg_zero]));
        let x = json!({"p": 1, "q": 2});
        let y = json!({"q": 2, "p": 1});
        assert!(!is_constant(&[&x, &y]));
    }

    #[test]
    fn test_common_prefix() {
        let (prefix, suffixes) =
            common_prefix(&["user_001", "user_002", "user_17"], 3).unwrap();
        assert_eq!(prefix, "user_");
        assert_eq!(suffixes, vec!["001", "002", "17"]);

        assert!(common_prefix(&["abc", "xyz"], 3).is_none());
        assert!(common_prefix(&["ab1", "ab2"], 3).is_none());
        assert!(common_prefix(&["only"], 3).is_none());
    }

    #[test]
    fn test_common_prefix_respects_char_boundaries() {
        let (prefix, suffixes) = common_prefix(&["日本語a", "日本語b", "日本x"], 2).unwrap();
        assert_eq!(prefix, "日本");
        assert_eq!(suffixes, vec!["語a", "語b", "x"]);
    }
}
