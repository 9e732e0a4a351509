//! tokpack - lossless token-efficient JSON re-encoding
//!
//! tokpack rewrites a JSON value into a smaller JSON text aimed at LLM
//! consumption and restores the exact original from it. Long keys are
//! abbreviated through a per-call dictionary, homogeneous object arrays are
//! stored column by column, and numeric or boolean runs collapse into
//! constant, arithmetic, or packed base64 forms. When none of that pays off
//! the plain compact serialization is returned instead.
//!
//! # Example
//!
//! ```rust
//! use tokpack::{decode, encode, measure};
//! use serde_json::json;
//!
//! let data = json!({"measurements": [3, 9, 4, 12, 7, 1, 8, 5, 11, 2]});
//! let text = encode(&data);
//! assert!(measure(&text) <= measure(&data.to_string()));
//! assert_eq!(decode(&text).unwrap(), data);
//! ```

mod codec;
mod compress;
mod decompress;
mod dictionary;
mod error;
mod json_bridge;
mod node;
mod pack;
mod types;

pub use codec::*;
pub use dictionary::{base62, KeyDictionary, KeyLookup};
pub use error::*;
pub use json_bridge::*;
pub use node::{Node, TAG};
pub use pack::{DeltaRun, NumWidth, PackedBools, PackedNums};
pub use types::*;
