//! Error types for the tokpack codec

use thiserror::Error;

/// Errors that can occur while decoding tokpack text.
///
/// Encoding never fails; every variant here signals corrupted or
/// foreign input reaching the decoder.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid UTF-8 in string payload: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    #[error("Length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Malformed node: {0}")]
    Malformed(String),

    #[error("Dictionary error: {0}")]
    Dictionary(String),
}

impl CodecError {
    pub(crate) fn type_mismatch(expected: impl Into<String>, got: &serde_json::Value) -> Self {
        CodecError::TypeMismatch {
            expected: expected.into(),
            got: kind_name(got).to_string(),
        }
    }
}

/// Short name of a JSON value's kind, used in error messages.
pub(crate) fn kind_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
